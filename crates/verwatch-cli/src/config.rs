//! Service config files
//!
//! ```yaml
//! id: my-service
//! defaults:
//!   options:
//!     interval: 10m
//!   deployed_version:
//!     allow_invalid_certs: false
//! options:
//!   semantic_versioning: true
//! status:
//!   deployed_version: 1.2.0
//!   deployed_version_timestamp: 2024-03-01T12:00:00Z
//!   latest_version: 1.3.0
//! deployed_version:
//!   type: url
//!   url: https://example.com/api/version
//!   json: version
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use verwatch_core::{
    LookupDefaults, Options, OptionsDefaults, QueryMetrics, Status, StatusReceivers,
    VersionRecord,
};
use verwatch_lookup::{Binding, DeployedVersionLookup, lookup_from_value};

use crate::error::{CliError, Result};

/// Service-level defaults
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub options: OptionsDefaults,
    #[serde(default)]
    pub deployed_version: LookupDefaults,
}

/// A service and its deployed-version lookup
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub id: String,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub options: Options,
    /// Versions known from a previous run
    #[serde(default)]
    pub status: VersionRecord,
    #[serde(default)]
    pub deployed_version: Option<serde_json::Value>,
}

/// A lookup bound to its service
#[derive(Debug)]
pub struct LoadedService {
    pub id: String,
    pub lookup: Box<dyn DeployedVersionLookup>,
    pub receivers: StatusReceivers,
}

impl ServiceConfig {
    /// Read and validate a service file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CliError::Io {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut config: ServiceConfig = serde_yaml::from_str(content)
            .map_err(|e| CliError::config(format!("failed to parse service file: {}", e)))?;

        if config.id.trim().is_empty() {
            return Err(CliError::config("id: <required>"));
        }
        config.defaults.options.base.check_values("defaults.options.")?;
        config.options.check_values("options.")?;
        Ok(config)
    }

    /// Bind the lookup to a new status (seeded from `status`)
    pub fn build(&self, metrics: Option<QueryMetrics>) -> Result<LoadedService> {
        let Some(lookup_config) = &self.deployed_version else {
            return Err(CliError::config_with_help(
                "deployed_version: <required>",
                "add a deployed_version section with a url or manual lookup",
            ));
        };

        let options = self.options.clone().with_defaults(
            Arc::new(self.defaults.options.clone()),
            Arc::new(OptionsDefaults::hard()),
        );

        let (status, receivers) = Status::new(self.id.as_str());
        status.seed(self.status.clone());

        let mut binding = Binding::new(
            Arc::new(options),
            Arc::new(status),
            Arc::new(self.defaults.deployed_version.clone()),
            Arc::new(LookupDefaults::hard()),
        )?;
        if let Some(metrics) = metrics {
            binding = binding.with_metrics(metrics);
        }

        let lookup = lookup_from_value(lookup_config, binding)?;
        Ok(LoadedService {
            id: self.id.clone(),
            lookup,
            receivers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verwatch_lookup::{LookupType, ManualLookup};

    #[test]
    fn test_from_yaml() {
        let config = ServiceConfig::from_yaml(
            r#"
id: svc
defaults:
  options:
    interval: 5m
  deployed_version:
    method: POST
options:
  semantic_versioning: false
status:
  deployed_version: 1.0.0
deployed_version:
  url: https://example.com
  body: "{}"
"#,
        )
        .unwrap();

        let service = config.build(None).unwrap();
        let binding = service.lookup.binding();

        assert_eq!(service.lookup.lookup_type(), LookupType::Url);
        assert_eq!(binding.options.interval(), "5m");
        assert!(!binding.options.semantic_versioning());
        assert_eq!(binding.status.deployed_version(), "1.0.0");
        assert_eq!(binding.status.service_id(), "svc");
        assert!(binding.status.deployed_version_timestamp().is_none());
        assert!(service.lookup.to_value().get("method").is_none());
    }

    #[tokio::test]
    async fn test_seeded_status_accepts_manual_version() {
        let config = ServiceConfig::from_yaml(
            r#"
id: svc
status:
  deployed_version: 1.0.0
  latest_version: 1.0.0
deployed_version:
  type: manual
"#,
        )
        .unwrap();
        let service = config.build(None).unwrap();
        let manual = service
            .lookup
            .as_any()
            .downcast_ref::<ManualLookup>()
            .unwrap();

        manual.set_version("1.5.0");
        service.lookup.query(true).await.unwrap();

        let versions = service.lookup.binding().status.versions();
        assert_eq!(versions.deployed_version, "1.5.0");
        assert_eq!(versions.latest_version, "1.5.0");
    }

    #[test]
    fn test_seeded_timestamps() {
        let config = ServiceConfig::from_yaml(
            r#"
id: svc
status:
  deployed_version: 1.0.0
  deployed_version_timestamp: 2024-03-01T12:00:00Z
deployed_version:
  type: manual
"#,
        )
        .unwrap();
        let service = config.build(None).unwrap();

        let timestamp = service.lookup.binding().status.deployed_version_timestamp();
        assert_eq!(
            timestamp.map(|t| t.to_rfc3339()).as_deref(),
            Some("2024-03-01T12:00:00+00:00")
        );
    }

    #[test]
    fn test_bare_interval_gets_seconds() {
        let config = ServiceConfig::from_yaml("id: svc\noptions:\n  interval: '30'\n").unwrap();
        assert_eq!(config.options.interval(), "30s");
    }

    #[test]
    fn test_invalid_interval() {
        let err = ServiceConfig::from_yaml("id: svc\noptions:\n  interval: soon\n").unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn test_missing_id() {
        let err = ServiceConfig::from_yaml("id: ''\n").unwrap_err();
        assert!(err.to_string().contains("id: <required>"));
    }

    #[test]
    fn test_missing_deployed_version() {
        let config = ServiceConfig::from_yaml("id: svc\n").unwrap();
        let err = config.build(None).unwrap_err();
        assert!(err.to_string().contains("deployed_version: <required>"));
    }

    #[test]
    fn test_invalid_lookup() {
        let config =
            ServiceConfig::from_yaml("id: svc\ndeployed_version:\n  type: github\n").unwrap();
        let err = config.build(None).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }
}
