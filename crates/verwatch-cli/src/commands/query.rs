//! Query command - look up the deployed version once

use std::path::Path;

use verwatch_lookup::ManualLookup;

use crate::commands::print_announcements;
use crate::config::ServiceConfig;
use crate::error::{CliError, Result};

pub async fn run(path: &Path, set_version: Option<&str>, json_output: bool) -> Result<()> {
    let config = ServiceConfig::load(path)?;
    let mut service = config.build(None)?;

    if let Some(version) = set_version {
        let manual = service
            .lookup
            .as_any()
            .downcast_ref::<ManualLookup>()
            .ok_or_else(|| {
                CliError::config_with_help(
                    "--set-version only applies to manual lookups",
                    "set deployed_version.type to manual",
                )
            })?;
        manual.set_version(version);
    }

    service.lookup.query(true).await?;

    let versions = service.lookup.binding().status.versions();
    if json_output {
        let json = serde_json::json!({
            "id": service.id,
            "deployed_version": versions.deployed_version,
            "deployed_version_timestamp": versions.deployed_version_timestamp,
            "latest_version": versions.latest_version,
            "latest_version_timestamp": versions.latest_version_timestamp,
        });
        println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        return Ok(());
    }

    print_announcements(&mut service.receivers);
    println!("{}", versions.deployed_version);
    Ok(())
}
