//! verwatch Core - shared types for deployed-version tracking
//!
//! This crate provides the collaborators every lookup is bound to:
//! - `Options`: per-service polling interval and semantic-versioning policy
//! - `LookupDefaults`: the default tiers for lookup settings
//! - `Status`: the shared, lock-guarded version record and its channels
//! - `QueryMetrics`: Prometheus counters/gauges for lookup queries
//! - `SecretRef`: secret placeholder resolution across config reloads

pub mod defaults;
pub mod env;
pub mod error;
pub mod metrics;
pub mod options;
pub mod secret;
pub mod status;

pub use defaults::LookupDefaults;
pub use env::expand_env_vars;
pub use error::{CoreError, Result};
pub use metrics::{QueryMetrics, QueryResult};
pub use options::{Options, OptionsBase, OptionsDefaults};
pub use secret::{HeaderSecretRef, SECRET_VALUE, SecretRef};
pub use status::{
    Announcement, AnnouncementKind, DatabaseCell, DatabaseMessage, Status, StatusReceivers, VersionRecord,
    VersionUpdate,
};
