//! Refresh command - query with overrides without touching the service

use std::path::Path;

use crate::config::ServiceConfig;
use crate::error::Result;

pub async fn run(
    path: &Path,
    overrides: Option<&str>,
    semantic_versioning: Option<&str>,
) -> Result<()> {
    let config = ServiceConfig::load(path)?;
    let service = config.build(None)?;

    let version = verwatch_lookup::refresh(
        Some(service.lookup.as_ref()),
        &service.id,
        overrides,
        semantic_versioning,
    )
    .await?;

    println!("{}", version);
    Ok(())
}
