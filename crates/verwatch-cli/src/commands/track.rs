//! Track command - poll the deployed version until interrupted

use std::path::Path;
use std::sync::Arc;

use console::style;
use prometheus::{Encoder, Registry, TextEncoder};
use verwatch_core::QueryMetrics;
use verwatch_lookup::ServiceTracker;

use crate::commands::print_announcement;
use crate::config::ServiceConfig;
use crate::error::{CliError, Result};

pub async fn run(path: &Path, print_metrics: bool) -> Result<()> {
    let config = ServiceConfig::load(path)?;
    let registry = Registry::new();
    let metrics = QueryMetrics::new(&registry).map_err(|e| CliError::internal(e.to_string()))?;
    let service = config.build(Some(metrics))?;
    let mut receivers = service.receivers;
    let interval = service.lookup.binding().options.interval().to_string();

    let mut tracker = ServiceTracker::new(Arc::from(service.lookup));
    if !tracker.start() {
        println!(
            "{} {} is inactive, nothing to track",
            style("!").yellow().bold(),
            style(&service.id).cyan().bold()
        );
        return Ok(());
    }

    println!(
        "Tracking {} every {} (Ctrl-C to stop)",
        style(&service.id).cyan().bold(),
        interval
    );

    loop {
        tokio::select! {
            Some(announcement) = receivers.announce.recv() => {
                print_announcement(&announcement);
            }
            Some(message) = receivers.database.recv() => {
                tracing::debug!(service = %message.service_id, cells = message.cells.len(), "database update");
            }
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|e| CliError::internal(format!("failed to wait for Ctrl-C: {}", e)))?;
                break;
            }
        }
    }

    if print_metrics {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(|e| CliError::internal(e.to_string()))?;
        print!("{}", String::from_utf8_lossy(&buffer));
    }

    println!("Stopping...");
    tracker.stop().await;
    Ok(())
}
