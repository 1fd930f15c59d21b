//! `manual` lookups: versions set by an operator

use std::any::Any;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::binding::Binding;
use crate::error::{LookupError, Result};
use crate::lookup::{DeployedVersionLookup, LookupType, record_query, tagged_value};
use crate::patch::nullable;
use crate::reconcile::handle_new_version;

/// Minimum time between two applied versions
const MIN_SET_INTERVAL_MS: i64 = 1000;

/// A version waiting to be applied, consumed at most once
#[derive(Debug, Default)]
pub struct PendingVersion(Mutex<Option<String>>);

impl PendingVersion {
    pub fn new(version: Option<String>) -> Self {
        Self(Mutex::new(version.filter(|v| !v.is_empty())))
    }

    fn lock(&self) -> MutexGuard<'_, Option<String>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the pending version (empty clears it)
    pub fn set(&self, version: impl Into<String>) {
        let version = version.into();
        *self.lock() = Some(version).filter(|v| !v.is_empty());
    }

    pub fn get(&self) -> Option<String> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    pub fn clear(&self) {
        self.lock().take();
    }

    /// Take the pending version and run `f` on it with the lock held.
    ///
    /// The version is gone afterwards whatever `f` returns.
    pub fn consume<R>(&self, f: impl FnOnce(Option<&str>) -> R) -> R {
        let mut guard = self.lock();
        let pending = guard.take();
        f(pending.as_deref())
    }
}

impl Clone for PendingVersion {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl Serialize for PendingVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.get().serialize(serializer)
    }
}

/// Versions may be written as numbers in YAML (`version: 1`)
#[derive(Deserialize)]
#[serde(untagged)]
enum RawVersion {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl RawVersion {
    fn into_string(self) -> String {
        match self {
            RawVersion::Text(s) => s,
            RawVersion::Integer(i) => i.to_string(),
            RawVersion::Float(f) => f.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for PendingVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Option::<RawVersion>::deserialize(deserializer)?;
        Ok(Self::new(raw.map(RawVersion::into_string)))
    }
}

/// Deployed version set by hand
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManualLookup {
    /// Version to apply on the next query
    #[serde(default, skip_serializing_if = "PendingVersion::is_empty")]
    pub version: PendingVersion,

    #[serde(skip)]
    binding: Binding,
}

/// Partial update of a [`ManualLookup`]
#[derive(Debug, Default, Deserialize)]
pub struct ManualLookupOverrides {
    #[serde(default, deserialize_with = "nullable_version")]
    pub version: Option<Option<String>>,
}

fn nullable_version<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Option<String>>, D::Error> {
    let raw: Option<Option<RawVersion>> = nullable(deserializer)?;
    Ok(raw.map(|version| version.map(RawVersion::into_string)))
}

impl ManualLookup {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: PendingVersion::new(Some(version.into())),
            binding: Binding::default(),
        }
    }

    /// Queue a version for the next query
    pub fn set_version(&self, version: impl Into<String>) {
        self.version.set(version);
    }

    pub fn apply(&mut self, overrides: ManualLookupOverrides) {
        match overrides.version {
            Some(Some(version)) => self.version.set(version),
            Some(None) => self.version.clear(),
            None => {}
        }
    }

    /// Apply the pending version, if any. `None` when nothing was pending.
    fn apply_pending(&self, write_to_db: bool) -> Option<Result<()>> {
        self.version.consume(|pending| {
            let version = pending?;
            Some(self.apply_version(version, write_to_db))
        })
    }

    fn apply_version(&self, version: &str, write_to_db: bool) -> Result<()> {
        let status = &self.binding.status;

        if let Some(last_set) = status.deployed_version_timestamp() {
            let elapsed_ms = Utc::now()
                .signed_duration_since(last_set)
                .num_milliseconds();
            if elapsed_ms < MIN_SET_INTERVAL_MS {
                return Err(LookupError::RateLimited { elapsed_ms });
            }
        }

        let options = &self.binding.options;
        if options.semantic_versioning() {
            options.verify_semantic_versioning(version)?;
        }

        handle_new_version(&self.binding, version, None, write_to_db);
        Ok(())
    }
}

#[async_trait]
impl DeployedVersionLookup for ManualLookup {
    fn lookup_type(&self) -> LookupType {
        LookupType::Manual
    }

    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn init(&mut self, binding: Binding) {
        self.binding = binding;
    }

    fn check_values(&mut self, prefix: &str) -> Result<()> {
        let Some(version) = self.version.get() else {
            return Ok(());
        };

        let options = &self.binding.options;
        if options.semantic_versioning() {
            if let Err(e) = options.verify_semantic_versioning(&version) {
                return Err(LookupError::invalid_config(format!(
                    "{}version: {:?} <invalid> ({})",
                    prefix, version, e
                )));
            }
        }

        self.binding.status.set_deployed_version(&version, None, false);
        self.version.clear();
        Ok(())
    }

    async fn query(&self, metrics: bool) -> Result<()> {
        let span = &self.binding.span;
        let Some(result) = span.in_scope(|| self.apply_pending(metrics)) else {
            return Ok(());
        };
        if let Err(e) = &result {
            span.in_scope(|| e.log());
        }

        if metrics {
            record_query(&self.binding, LookupType::Manual, result.is_ok());
        }
        result
    }

    fn apply_overrides(&mut self, overrides: &str) -> Result<()> {
        let overrides: ManualLookupOverrides = serde_json::from_str(overrides).map_err(|e| {
            LookupError::invalid_config(format!("failed to parse manual overrides: {}", e))
        })?;
        self.apply(overrides);
        Ok(())
    }

    fn boxed_clone(&self) -> Box<dyn DeployedVersionLookup> {
        Box::new(self.clone())
    }

    fn to_value(&self) -> serde_json::Value {
        tagged_value(
            serde_json::to_value(self).unwrap_or_default(),
            LookupType::Manual,
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use verwatch_core::{Options, QueryMetrics, QueryResult, Status};

    fn bound(lookup: &mut ManualLookup, semantic_versioning: Option<bool>) {
        lookup.init(Binding {
            options: Arc::new(Options::default().copy_with_semantic_versioning(semantic_versioning)),
            status: Arc::new(Status::detached("svc")),
            ..Default::default()
        });
    }

    #[test]
    fn test_decode_numeric_version() {
        let lookup: ManualLookup = serde_yaml::from_str("version: 1\n").unwrap();
        assert_eq!(lookup.version.get().as_deref(), Some("1"));

        let lookup: ManualLookup = serde_yaml::from_str("version: 1.2\n").unwrap();
        assert_eq!(lookup.version.get().as_deref(), Some("1.2"));

        let lookup: ManualLookup = serde_yaml::from_str("version: ''\n").unwrap();
        assert!(lookup.version.is_empty());
    }

    #[test]
    fn test_consume_clears() {
        let pending = PendingVersion::new(Some("1.0.0".to_string()));

        let seen = pending.consume(|v| v.map(str::to_string));
        assert_eq!(seen.as_deref(), Some("1.0.0"));
        assert!(pending.is_empty());

        let seen = pending.consume(|v| v.map(str::to_string));
        assert_eq!(seen, None);
    }

    #[test]
    fn test_check_values_seeds_status() {
        let mut lookup = ManualLookup::new("1.2.3");
        bound(&mut lookup, None);

        lookup.check_values("").unwrap();

        assert_eq!(lookup.binding.status.deployed_version(), "1.2.3");
        assert!(lookup.version.is_empty());
    }

    #[test]
    fn test_check_values_invalid_semver() {
        let mut lookup = ManualLookup::new("abc");
        bound(&mut lookup, Some(true));

        let err = lookup.check_values("  ").unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("  version: \"abc\" <invalid>"), "{}", message);
        assert!(message.contains("failed to convert \"abc\" to a semantic version"));
        assert_eq!(lookup.binding.status.deployed_version(), "");
    }

    #[test]
    fn test_check_values_non_semver_allowed() {
        let mut lookup = ManualLookup::new("abc");
        bound(&mut lookup, Some(false));

        lookup.check_values("").unwrap();
        assert_eq!(lookup.binding.status.deployed_version(), "abc");
    }

    #[tokio::test]
    async fn test_query_nothing_pending() {
        let mut lookup = ManualLookup::default();
        bound(&mut lookup, None);

        lookup.query(true).await.unwrap();
        assert_eq!(lookup.binding.status.deployed_version(), "");
    }

    #[tokio::test]
    async fn test_query_applies_version() {
        let mut lookup = ManualLookup::default();
        bound(&mut lookup, None);

        lookup.set_version("1.0.0");
        lookup.query(false).await.unwrap();

        assert_eq!(lookup.binding.status.deployed_version(), "1.0.0");
        assert_eq!(lookup.binding.status.latest_version(), "1.0.0");
        assert!(lookup.version.is_empty());
    }

    #[tokio::test]
    async fn test_query_rate_limited() {
        let mut lookup = ManualLookup::default();
        bound(&mut lookup, None);

        lookup.set_version("1.0.0");
        lookup.query(false).await.unwrap();

        lookup.set_version("1.0.1");
        let err = lookup.query(false).await.unwrap_err();

        assert!(matches!(err, LookupError::RateLimited { .. }));
        assert!(lookup.version.is_empty(), "rejected version is discarded");
        assert_eq!(lookup.binding.status.deployed_version(), "1.0.0");
    }

    #[tokio::test]
    async fn test_query_after_rate_limit_window() {
        let mut lookup = ManualLookup::default();
        bound(&mut lookup, None);
        let earlier = Utc::now() - chrono::Duration::seconds(2);
        lookup
            .binding
            .status
            .set_deployed_version("1.0.0", Some(earlier), false);

        lookup.set_version("1.0.1");
        lookup.query(false).await.unwrap();

        assert_eq!(lookup.binding.status.deployed_version(), "1.0.1");
    }

    #[tokio::test]
    async fn test_query_invalid_semver_discards() {
        let mut lookup = ManualLookup::default();
        bound(&mut lookup, Some(true));

        lookup.set_version("not-semver");
        let err = lookup.query(false).await.unwrap_err();

        assert!(matches!(err, LookupError::Core(_)));
        assert!(lookup.version.is_empty());
        assert_eq!(lookup.binding.status.deployed_version(), "");
    }

    #[tokio::test]
    async fn test_query_metrics_only_when_consumed() {
        let metrics = QueryMetrics::new(&prometheus::Registry::new()).unwrap();
        let mut lookup = ManualLookup::default();
        lookup.init(Binding {
            status: Arc::new(Status::detached("svc")),
            ..Default::default()
        }
        .with_metrics(metrics.clone()));

        lookup.query(true).await.unwrap();
        assert_eq!(metrics.query_count("svc", "manual", QueryResult::Success), 0);

        lookup.set_version("1.0.0");
        lookup.query(true).await.unwrap();
        assert_eq!(metrics.query_count("svc", "manual", QueryResult::Success), 1);
        assert_eq!(metrics.liveness_value("svc", "manual"), 1);

        lookup.set_version("1.0.1");
        lookup.query(true).await.unwrap_err();
        assert_eq!(metrics.query_count("svc", "manual", QueryResult::Fail), 1);
        assert_eq!(metrics.liveness_value("svc", "manual"), 0);
    }

    #[test]
    fn test_apply_overrides() {
        let mut lookup = ManualLookup::new("1.0.0");

        lookup.apply_overrides(r#"{"version": "2.0.0"}"#).unwrap();
        assert_eq!(lookup.version.get().as_deref(), Some("2.0.0"));

        lookup.apply_overrides("{}").unwrap();
        assert_eq!(lookup.version.get().as_deref(), Some("2.0.0"));

        lookup.apply_overrides(r#"{"version": 3}"#).unwrap();
        assert_eq!(lookup.version.get().as_deref(), Some("3"));

        lookup.apply_overrides(r#"{"version": null}"#).unwrap();
        assert!(lookup.version.is_empty());
    }

    #[test]
    fn test_to_value() {
        let lookup = ManualLookup::new("1.0.0");
        assert_eq!(
            lookup.to_value(),
            serde_json::json!({"type": "manual", "version": "1.0.0"})
        );
        assert_eq!(lookup.redacted(), lookup.to_value());
    }
}
