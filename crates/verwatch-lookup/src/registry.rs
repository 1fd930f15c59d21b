//! Creating lookups from config
//!
//! Lookup kinds are looked up by their `type` string:
//!
//! | `type`          | Lookup            |
//! |-----------------|-------------------|
//! | `url`, `web`    | [`WebLookup`]     |
//! | `manual`        | [`ManualLookup`]  |
//!
//! A config without a `type` is a `url` lookup.

use serde::de::DeserializeOwned;

use crate::binding::Binding;
use crate::error::{LookupError, Result};
use crate::lookup::{DeployedVersionLookup, LookupType};
use crate::manual::ManualLookup;
use crate::web::WebLookup;

/// Encoding of a config document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            ConfigFormat::Yaml => "yaml",
        }
    }
}

type Constructor = fn(ConfigFormat, &str) -> Result<Box<dyn DeployedVersionLookup>>;

const REGISTRY: &[(&str, Constructor)] = &[
    ("url", decode_web),
    ("web", decode_web),
    ("manual", decode_manual),
];

/// The `type` assumed when a config has none
pub const DEFAULT_TYPE: &str = "url";

fn decode_web(format: ConfigFormat, data: &str) -> Result<Box<dyn DeployedVersionLookup>> {
    Ok(Box::new(decode::<WebLookup>(LookupType::Url, format, data)?))
}

fn decode_manual(format: ConfigFormat, data: &str) -> Result<Box<dyn DeployedVersionLookup>> {
    Ok(Box::new(decode::<ManualLookup>(
        LookupType::Manual,
        format,
        data,
    )?))
}

fn decode<T: DeserializeOwned>(kind: LookupType, format: ConfigFormat, data: &str) -> Result<T> {
    let decoded = match format {
        ConfigFormat::Json => serde_json::from_str(data).map_err(|e| e.to_string()),
        ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| e.to_string()),
    };
    decoded.map_err(|message| LookupError::Decode {
        kind: kind.to_string(),
        message: message.replace('\n', "\n  "),
    })
}

/// Decode a lookup of kind `kind` without binding or validating it
pub fn decode_lookup(
    kind: &str,
    format: ConfigFormat,
    data: &str,
) -> Result<Box<dyn DeployedVersionLookup>> {
    let kind = if kind.is_empty() { DEFAULT_TYPE } else { kind };
    let (_, constructor) = REGISTRY
        .iter()
        .find(|(name, _)| *name == kind)
        .ok_or_else(|| LookupError::UnknownType {
            kind: kind.to_string(),
        })?;
    constructor(format, data)
}

/// Decode, bind and validate a lookup
pub fn new_lookup(
    kind: &str,
    format: ConfigFormat,
    data: &str,
    binding: Binding,
) -> Result<Box<dyn DeployedVersionLookup>> {
    let mut lookup = decode_lookup(kind, format, data)?;
    lookup.init(binding);
    lookup.check_values("")?;
    Ok(lookup)
}

/// Build a lookup from a config subtree carrying its own `type`
pub fn lookup_from_value(
    value: &serde_json::Value,
    binding: Binding,
) -> Result<Box<dyn DeployedVersionLookup>> {
    let kind = match value.get("type") {
        None | Some(serde_json::Value::Null) => DEFAULT_TYPE,
        Some(serde_json::Value::String(kind)) => kind.as_str(),
        Some(other) => {
            return Err(LookupError::UnknownType {
                kind: other.to_string(),
            });
        }
    };
    let data = serde_json::to_string(value)?;
    new_lookup(kind, ConfigFormat::Json, &data, binding)
}
