//! Show command - display the lookup config with secrets hidden

use std::path::Path;

use crate::config::ServiceConfig;
use crate::error::{CliError, Result};

pub fn run(path: &Path, json_output: bool) -> Result<()> {
    let config = ServiceConfig::load(path)?;
    let service = config.build(None)?;
    let redacted = service.lookup.redacted();

    let output = if json_output {
        serde_json::to_string_pretty(&redacted).map_err(|e| CliError::internal(e.to_string()))?
    } else {
        serde_yaml::to_string(&redacted).map_err(|e| CliError::internal(e.to_string()))?
    };
    print!("{}", output);
    if json_output {
        println!();
    }
    Ok(())
}
