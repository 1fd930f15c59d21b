//! Reconciling a found version into the service status

use chrono::{DateTime, Utc};
use verwatch_core::{VersionRecord, VersionUpdate};

use crate::binding::Binding;

/// Decide what a found `version` changes in `record`.
///
/// Returns `None` when the version is empty or already deployed. The latest
/// version is promoted when it is unset, or (with semantic versioning) when
/// the new version is strictly greater. Versions that don't parse never
/// promote.
pub fn plan_update(
    record: &VersionRecord,
    version: &str,
    release_date: Option<DateTime<Utc>>,
    semantic_versioning: bool,
) -> Option<VersionUpdate> {
    if version.is_empty() || version == record.deployed_version {
        return None;
    }

    let promote_latest = if record.latest_version.is_empty() {
        true
    } else if semantic_versioning && version != record.latest_version {
        match (
            semver::Version::parse(version),
            semver::Version::parse(&record.latest_version),
        ) {
            (Ok(new), Ok(latest)) => new > latest,
            _ => false,
        }
    } else {
        false
    };

    Some(VersionUpdate {
        deployed_version: version.to_string(),
        date: release_date.unwrap_or_else(Utc::now),
        promote_latest,
    })
}

/// Record a newly found deployed version.
///
/// The status is updated atomically, persisted once (with `write_to_db`)
/// and announced once. Nothing happens if the version is already deployed.
pub fn handle_new_version(
    binding: &Binding,
    version: &str,
    release_date: Option<DateTime<Utc>>,
    write_to_db: bool,
) -> Option<VersionUpdate> {
    let semantic_versioning = binding.options.semantic_versioning();
    let update = binding.status.update_versions(write_to_db, |record| {
        plan_update(record, version, release_date, semantic_versioning)
    })?;

    tracing::info!("Updated to {:?}", update.deployed_version);

    if update.promote_latest {
        binding.status.announce_query_new_version();
    } else {
        binding.status.announce_update();
    }

    Some(update)
}
