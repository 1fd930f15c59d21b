//! The deployed-version lookup abstraction

use std::any::Any;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use verwatch_core::{QueryResult, SecretRef};

use crate::binding::Binding;
use crate::error::{LookupError, Result};

/// Kind of a deployed-version lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupType {
    /// Query an HTTP endpoint (`url`, alias `web`)
    Url,
    /// Versions set by an operator
    Manual,
}

impl LookupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupType::Url => "url",
            LookupType::Manual => "manual",
        }
    }
}

impl fmt::Display for LookupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LookupType {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "url" | "web" => Ok(LookupType::Url),
            "manual" => Ok(LookupType::Manual),
            other => Err(LookupError::UnknownType {
                kind: other.to_string(),
            }),
        }
    }
}

/// A source of the version a service currently runs.
///
/// Implementations are config data plus a [`Binding`]. Queries only read
/// the config, so a lookup can be shared behind an `Arc` while it is tracked.
#[async_trait]
pub trait DeployedVersionLookup: Send + Sync + fmt::Debug {
    fn lookup_type(&self) -> LookupType;

    fn binding(&self) -> &Binding;

    /// Attach the runtime collaborators
    fn init(&mut self, binding: Binding);

    /// Validate (and normalise) the config.
    ///
    /// Problems are reported one per line, each prefixed with `prefix`.
    fn check_values(&mut self, _prefix: &str) -> Result<()> {
        Ok(())
    }

    /// Fetch the current version once and reconcile it into the status.
    ///
    /// With `metrics`, the result is counted and status changes are persisted.
    async fn query(&self, _metrics: bool) -> Result<()> {
        Err(LookupError::NotImplemented {
            kind: self.lookup_type().to_string(),
        })
    }

    /// Query every interval until the service is deleting
    async fn track(&self) {}

    /// Replace secret placeholders with the values held by `other`
    fn inherit_secrets(&mut self, _other: &dyn DeployedVersionLookup, _refs: &SecretRef) {}

    /// Merge a JSON overrides document into the config
    fn apply_overrides(&mut self, overrides: &str) -> Result<()>;

    /// Independent copy of the config, keeping the binding
    fn boxed_clone(&self) -> Box<dyn DeployedVersionLookup>;

    /// The config as a `type`-tagged JSON value
    fn to_value(&self) -> serde_json::Value;

    /// [`to_value`](Self::to_value) with secrets replaced by the placeholder
    fn redacted(&self) -> serde_json::Value {
        self.to_value()
    }

    fn as_any(&self) -> &dyn Any;

    fn service_id(&self) -> &str {
        self.binding().service_id()
    }
}

impl Clone for Box<dyn DeployedVersionLookup> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// Count a query result against the binding's metrics (if any)
pub(crate) fn record_query(binding: &Binding, lookup_type: LookupType, succeeded: bool) {
    let Some(metrics) = &binding.metrics else {
        return;
    };
    let result = if succeeded {
        QueryResult::Success
    } else {
        QueryResult::Fail
    };
    metrics.record(binding.service_id(), lookup_type.as_str(), result);
}

/// Tag a serialized config with its lookup type
pub(crate) fn tagged_value(value: serde_json::Value, lookup_type: LookupType) -> serde_json::Value {
    let mut map = match value {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    map.insert(
        "type".to_string(),
        serde_json::Value::String(lookup_type.as_str().to_string()),
    );
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_type_parse() {
        assert_eq!("url".parse::<LookupType>().unwrap(), LookupType::Url);
        assert_eq!("web".parse::<LookupType>().unwrap(), LookupType::Url);
        assert_eq!("manual".parse::<LookupType>().unwrap(), LookupType::Manual);

        let err = "github".parse::<LookupType>().unwrap_err();
        assert!(matches!(err, LookupError::UnknownType { ref kind } if kind == "github"));
    }

    #[test]
    fn test_tagged_value() {
        let value = tagged_value(serde_json::json!({"url": "https://example.com"}), LookupType::Url);
        assert_eq!(value["type"], "url");
        assert_eq!(value["url"], "https://example.com");

        let value = tagged_value(serde_json::Value::Null, LookupType::Manual);
        assert_eq!(value, serde_json::json!({"type": "manual"}));
    }
}
