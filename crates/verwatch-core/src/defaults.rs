//! Default tiers for lookup settings

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Defaults for the optional settings of a deployed-version lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupDefaults {
    /// Accept invalid HTTPS certificates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_invalid_certs: Option<bool>,

    /// HTTP method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl LookupDefaults {
    /// The hard-coded tier every resolution ends at
    pub fn hard() -> Self {
        Self {
            allow_invalid_certs: Some(false),
            method: Some("GET".to_string()),
        }
    }

    /// Ensure every field is set (required of the hard tier)
    pub fn ensure_complete(&self) -> Result<()> {
        if self.allow_invalid_certs.is_none() {
            return Err(CoreError::IncompleteDefaults {
                field: "deployed_version.allow_invalid_certs".to_string(),
            });
        }
        if self.method.is_none() {
            return Err(CoreError::IncompleteDefaults {
                field: "deployed_version.method".to_string(),
            });
        }
        Ok(())
    }

    /// Resolve `allow_invalid_certs` across the tiers
    pub fn resolve_allow_invalid_certs(
        root: Option<bool>,
        defaults: &LookupDefaults,
        hard_defaults: &LookupDefaults,
    ) -> bool {
        root.or(defaults.allow_invalid_certs)
            .or(hard_defaults.allow_invalid_certs)
            .unwrap_or(false)
    }

    /// Resolve the HTTP method across the tiers (empty strings fall through)
    pub fn resolve_method<'a>(
        root: &'a str,
        defaults: &'a LookupDefaults,
        hard_defaults: &'a LookupDefaults,
    ) -> &'a str {
        Some(root)
            .filter(|m| !m.is_empty())
            .or(defaults.method.as_deref().filter(|m| !m.is_empty()))
            .or(hard_defaults.method.as_deref())
            .unwrap_or("GET")
    }
}
