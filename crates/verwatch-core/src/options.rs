//! Service options with default-tier resolution
//!
//! Every option resolves through three tiers:
//! the service's own value, then the service defaults, then the hard defaults.
//! The hard defaults are always fully populated (see [`OptionsDefaults::hard`]).

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CoreError, Result};

/// Fallback polling interval
pub const DEFAULT_INTERVAL: &str = "10m";

/// Settings shared by service options and their defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsBase {
    /// Sleep between queries, e.g. `1h2m3s`. A bare integer means seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// Require versions to be MAJOR.MINOR.PATCH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_versioning: Option<bool>,
}

impl OptionsBase {
    /// Normalise and validate the values
    pub fn check_values(&mut self, prefix: &str) -> Result<()> {
        if let Some(interval) = self.interval.as_mut() {
            // Treat integers as seconds
            if interval.parse::<u64>().is_ok() {
                interval.push('s');
            }
            if parse_interval(interval).is_none() {
                return Err(CoreError::InvalidInterval {
                    prefix: prefix.to_string(),
                    value: interval.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Service-level or hard-coded default options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsDefaults {
    #[serde(flatten)]
    pub base: OptionsBase,
}

impl OptionsDefaults {
    pub fn new(interval: Option<String>, semantic_versioning: Option<bool>) -> Self {
        Self {
            base: OptionsBase {
                interval,
                semantic_versioning,
            },
        }
    }

    /// The last tier of the resolution chain
    pub fn hard() -> Self {
        Self::new(Some(DEFAULT_INTERVAL.to_string()), Some(true))
    }

    /// Ensure every field is set (required of the hard tier)
    pub fn ensure_complete(&self) -> Result<()> {
        if self.base.interval.is_none() {
            return Err(CoreError::IncompleteDefaults {
                field: "interval".to_string(),
            });
        }
        if self.base.semantic_versioning.is_none() {
            return Err(CoreError::IncompleteDefaults {
                field: "semantic_versioning".to_string(),
            });
        }
        Ok(())
    }
}

/// Options of a single service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    #[serde(flatten)]
    pub base: OptionsBase,

    /// Whether the service is tracked at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,

    #[serde(skip, default = "default_tier")]
    pub defaults: Arc<OptionsDefaults>,

    #[serde(skip, default = "hard_tier")]
    pub hard_defaults: Arc<OptionsDefaults>,
}

fn default_tier() -> Arc<OptionsDefaults> {
    Arc::new(OptionsDefaults::default())
}

fn hard_tier() -> Arc<OptionsDefaults> {
    Arc::new(OptionsDefaults::hard())
}

impl Default for Options {
    fn default() -> Self {
        Self {
            base: OptionsBase::default(),
            active: None,
            defaults: default_tier(),
            hard_defaults: hard_tier(),
        }
    }
}

impl Options {
    pub fn new(
        active: Option<bool>,
        interval: Option<String>,
        semantic_versioning: Option<bool>,
        defaults: Arc<OptionsDefaults>,
        hard_defaults: Arc<OptionsDefaults>,
    ) -> Self {
        Self {
            base: OptionsBase {
                interval,
                semantic_versioning,
            },
            active,
            defaults,
            hard_defaults,
        }
    }

    /// Attach the default tiers (after deserializing)
    pub fn with_defaults(
        mut self,
        defaults: Arc<OptionsDefaults>,
        hard_defaults: Arc<OptionsDefaults>,
    ) -> Self {
        self.defaults = defaults;
        self.hard_defaults = hard_defaults;
        self
    }

    /// Independent copy sharing the same default tiers
    pub fn copy_with_semantic_versioning(&self, semantic_versioning: Option<bool>) -> Self {
        let mut copy = self.clone();
        copy.base.semantic_versioning = semantic_versioning;
        copy
    }

    pub fn active(&self) -> bool {
        self.active.unwrap_or(true)
    }

    /// Resolved interval string
    pub fn interval(&self) -> &str {
        self.base
            .interval
            .as_deref()
            .or(self.defaults.base.interval.as_deref())
            .or(self.hard_defaults.base.interval.as_deref())
            .unwrap_or(DEFAULT_INTERVAL)
    }

    /// Resolved interval as a duration (unparseable values fall back to the default)
    pub fn interval_duration(&self) -> Duration {
        parse_interval(self.interval())
            .or_else(|| parse_interval(DEFAULT_INTERVAL))
            .unwrap_or(Duration::from_secs(600))
    }

    /// Resolved semantic-versioning policy
    pub fn semantic_versioning(&self) -> bool {
        self.base
            .semantic_versioning
            .or(self.defaults.base.semantic_versioning)
            .or(self.hard_defaults.base.semantic_versioning)
            .unwrap_or(true)
    }

    /// Parse `version` as a semantic version
    pub fn verify_semantic_versioning(&self, version: &str) -> Result<semver::Version> {
        semver::Version::parse(version).map_err(|source| CoreError::SemanticVersion {
            version: version.to_string(),
            source,
        })
    }

    pub fn check_values(&mut self, prefix: &str) -> Result<()> {
        self.base.check_values(prefix)
    }
}

fn parse_interval(value: &str) -> Option<Duration> {
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    humantime_serde::re::humantime::parse_duration(value).ok()
}
