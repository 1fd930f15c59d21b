//! Check command - validate a service file

use console::style;
use std::path::Path;

use crate::config::ServiceConfig;
use crate::error::Result;

pub fn run(path: &Path) -> Result<()> {
    let config = ServiceConfig::load(path)?;
    let service = config.build(None)?;
    let binding = service.lookup.binding();

    println!(
        "{} {} is valid",
        style("✓").green().bold(),
        style(&service.id).cyan()
    );
    println!(
        "  {}: {}",
        style("Lookup").bold(),
        service.lookup.lookup_type()
    );
    println!("  {}: {}", style("Interval").bold(), binding.options.interval());
    println!(
        "  {}: {}",
        style("Semantic versioning").bold(),
        binding.options.semantic_versioning()
    );

    Ok(())
}
