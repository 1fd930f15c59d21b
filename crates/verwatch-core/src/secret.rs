//! Secret placeholders and the references used to resolve them
//!
//! When a lookup is shown to a user, secret values are replaced by
//! [`SECRET_VALUE`]. When the edited config comes back, each placeholder is
//! resolved against the previous lookup using a [`SecretRef`].

use serde::{Deserialize, Serialize};

/// Placeholder standing in for a secret value
pub const SECRET_VALUE: &str = "<secret>";

/// Where a header's secret came from in the previous config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeaderSecretRef {
    /// Index of the header in the previous lookup
    #[serde(default)]
    pub old_index: Option<usize>,
}

impl HeaderSecretRef {
    pub fn new(old_index: Option<usize>) -> Self {
        Self { old_index }
    }
}

/// Secret references for a deployed-version lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretRef {
    /// One entry per header of the new lookup
    #[serde(default)]
    pub headers: Vec<HeaderSecretRef>,
}

impl SecretRef {
    /// Previous index for header `index`, if one was recorded
    pub fn header_old_index(&self, index: usize) -> Option<usize> {
        self.headers.get(index).and_then(|r| r.old_index)
    }
}

/// Whether `value` is the secret placeholder
pub fn is_secret_placeholder(value: &str) -> bool {
    value == SECRET_VALUE
}
