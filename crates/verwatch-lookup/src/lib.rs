//! verwatch Deployed-Version Lookups
//!
//! This crate finds the version a service is currently running and keeps
//! the service's [`Status`](verwatch_core::Status) in step with it:
//!
//! - **`url` lookups**: poll an HTTP endpoint and extract the version from the
//!   body (JSON path and/or regex) or from a response header
//! - **`manual` lookups**: apply a version set by an operator, at most once
//!   per second
//! - **Reconciliation**: update the deployed version, promote the latest
//!   version (never downwards) and announce each real change exactly once
//! - **Refresh**: evaluate a lookup with overrides on a detached copy, leaving
//!   the live state untouched
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use verwatch_core::{LookupDefaults, Options, Status};
//! use verwatch_lookup::{Binding, ConfigFormat, new_lookup};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (status, _receivers) = Status::new("my-service");
//! let binding = Binding::new(
//!     Arc::new(Options::default()),
//!     Arc::new(status),
//!     Arc::new(LookupDefaults::default()),
//!     Arc::new(LookupDefaults::hard()),
//! )?;
//!
//! let lookup = new_lookup(
//!     "url",
//!     ConfigFormat::Yaml,
//!     "url: https://example.com/version\njson: version\n",
//!     binding,
//! )?;
//! lookup.query(true).await?;
//! println!("{}", lookup.binding().status.deployed_version());
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod error;
pub mod extract;
mod http;
pub mod lookup;
pub mod manual;
mod patch;
pub mod reconcile;
pub mod refresh;
pub mod registry;
pub mod tracker;
pub mod web;

// Re-exports for convenience
pub use binding::Binding;
pub use error::{LookupError, Result};
pub use lookup::{DeployedVersionLookup, LookupType};
pub use manual::{ManualLookup, PendingVersion};
pub use reconcile::handle_new_version;
pub use refresh::{SemanticVersioningOverride, refresh};
pub use registry::{ConfigFormat, lookup_from_value, new_lookup};
pub use tracker::ServiceTracker;
pub use web::{BasicAuth, Header, WebLookup};
