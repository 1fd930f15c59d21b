//! Refreshing a lookup, optionally with overrides
//!
//! Without overrides a refresh is a normal query of the live lookup. With
//! overrides, the query runs on a detached copy: the live status is never
//! touched, nothing is persisted and nothing is announced.

use crate::error::{LookupError, Result};
use crate::lookup::DeployedVersionLookup;

/// A semantic-versioning override sent with a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SemanticVersioningOverride {
    /// Keep the lookup's own setting
    #[default]
    Unset,
    Set(bool),
    /// Drop the lookup's setting and use the defaults
    Reset,
}

impl SemanticVersioningOverride {
    /// Parse the raw JSON value: absent/blank, `true`, `false` or `null`
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            return Ok(Self::Unset);
        };
        match serde_json::from_str::<Option<bool>>(raw) {
            Ok(Some(value)) => Ok(Self::Set(value)),
            Ok(None) => Ok(Self::Reset),
            Err(_) => Err(LookupError::invalid_config(format!(
                "semantic_versioning: {:?} <invalid> (expected true, false or null)",
                raw
            ))),
        }
    }

    /// The setting after applying the override to `current`
    pub fn apply(&self, current: Option<bool>) -> Option<bool> {
        match self {
            Self::Unset => current,
            Self::Set(value) => Some(*value),
            Self::Reset => None,
        }
    }
}

/// Query `lookup` (or a copy of it with `overrides` applied) and return the
/// deployed version found.
pub async fn refresh(
    lookup: Option<&dyn DeployedVersionLookup>,
    service_id: &str,
    overrides: Option<&str>,
    semantic_versioning: Option<&str>,
) -> Result<String> {
    let lookup = lookup.ok_or(LookupError::MissingLookup)?;
    let semantic_versioning = SemanticVersioningOverride::parse(semantic_versioning)?;

    let options = &lookup.binding().options;
    let current = options.base.semantic_versioning;
    let resolved = semantic_versioning.apply(current);
    let overrides = overrides.map(str::trim).filter(|o| !o.is_empty());

    if overrides.is_none() && resolved == current {
        lookup.query(true).await?;
        return Ok(lookup.binding().status.deployed_version());
    }

    let mut copy = lookup.boxed_clone();
    copy.init(
        lookup
            .binding()
            .detached(options.copy_with_semantic_versioning(resolved), service_id),
    );
    if let Some(overrides) = overrides {
        copy.apply_overrides(overrides)?;
    }
    copy.check_values("").map_err(|e| {
        LookupError::invalid_config(format!("values failed validity check:\n{}", e))
    })?;

    tracing::debug!(
        service = %service_id,
        lookup = %copy.redacted(),
        "refreshing with overrides"
    );

    copy.query(false).await?;
    Ok(copy.binding().status.deployed_version())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::manual::ManualLookup;
    use std::sync::Arc;
    use verwatch_core::{Options, Status};

    #[test]
    fn test_parse_semantic_versioning() {
        assert_eq!(
            SemanticVersioningOverride::parse(None).unwrap(),
            SemanticVersioningOverride::Unset
        );
        assert_eq!(
            SemanticVersioningOverride::parse(Some("  ")).unwrap(),
            SemanticVersioningOverride::Unset
        );
        assert_eq!(
            SemanticVersioningOverride::parse(Some("true")).unwrap(),
            SemanticVersioningOverride::Set(true)
        );
        assert_eq!(
            SemanticVersioningOverride::parse(Some("false")).unwrap(),
            SemanticVersioningOverride::Set(false)
        );
        assert_eq!(
            SemanticVersioningOverride::parse(Some("null")).unwrap(),
            SemanticVersioningOverride::Reset
        );
        assert!(SemanticVersioningOverride::parse(Some("maybe")).is_err());
    }

    #[test]
    fn test_apply_semantic_versioning() {
        assert_eq!(SemanticVersioningOverride::Unset.apply(Some(false)), Some(false));
        assert_eq!(SemanticVersioningOverride::Set(true).apply(Some(false)), Some(true));
        assert_eq!(SemanticVersioningOverride::Reset.apply(Some(false)), None);
    }

    fn manual(version: &str) -> ManualLookup {
        let mut lookup = ManualLookup::default();
        lookup.init(Binding {
            options: Arc::new(Options::default()),
            status: Arc::new(Status::detached("svc")),
            ..Default::default()
        });
        lookup.set_version(version);
        lookup
    }

    #[tokio::test]
    async fn test_refresh_missing_lookup() {
        let err = refresh(None, "svc", None, None).await.unwrap_err();
        assert!(matches!(err, LookupError::MissingLookup));
    }

    #[tokio::test]
    async fn test_refresh_without_overrides_updates_live_status() {
        let lookup = manual("1.0.0");

        let version = refresh(Some(&lookup), "svc", None, None).await.unwrap();

        assert_eq!(version, "1.0.0");
        assert_eq!(lookup.binding().status.deployed_version(), "1.0.0");
    }

    #[tokio::test]
    async fn test_refresh_with_overrides_is_detached() {
        let lookup = manual("1.0.0");

        let version = refresh(Some(&lookup), "svc", Some(r#"{"version": "2.0.0"}"#), None)
            .await
            .unwrap();

        assert_eq!(version, "2.0.0");
        assert_eq!(lookup.binding().status.deployed_version(), "");
        assert_eq!(lookup.version.get().as_deref(), Some("1.0.0"));
    }

    #[tokio::test]
    async fn test_refresh_semantic_versioning_override() {
        let lookup = manual("1.0.0");

        let err = refresh(
            Some(&lookup),
            "svc",
            Some(r#"{"version": "release-7"}"#),
            None,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().starts_with("values failed validity check:\n"));

        let version = refresh(
            Some(&lookup),
            "svc",
            Some(r#"{"version": "release-7"}"#),
            Some("false"),
        )
        .await
        .unwrap();
        assert_eq!(version, "release-7");
        assert_eq!(lookup.binding().status.deployed_version(), "");
    }

    #[tokio::test]
    async fn test_refresh_invalid_semantic_versioning() {
        let lookup = manual("1.0.0");
        let err = refresh(Some(&lookup), "svc", None, Some("yes")).await.unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(lookup.version.get().as_deref(), Some("1.0.0"));
    }
}
