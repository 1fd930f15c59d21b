//! Helpers for typed merge patches
//!
//! In an overrides document, an absent key keeps the current value and an
//! explicit `null` resets it. Fields that need both are `Option<Option<T>>`
//! deserialized with [`nullable`].

use serde::{Deserialize, Deserializer};

/// `absent -> None`, `null -> Some(None)`, `value -> Some(Some(value))`.
///
/// Use together with `#[serde(default)]`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Apply a patch to a string field (`null` clears it)
pub(crate) fn apply_string(target: &mut String, patch: Option<Option<String>>) {
    if let Some(value) = patch {
        *target = value.unwrap_or_default();
    }
}

/// Apply a patch to an optional field (`null` unsets it)
pub(crate) fn apply_option<T>(target: &mut Option<T>, patch: Option<Option<T>>) {
    if let Some(value) = patch {
        *target = value;
    }
}
