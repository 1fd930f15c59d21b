//! Background tracking of a service's deployed version

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::error::Result;
use crate::lookup::DeployedVersionLookup;
use crate::refresh::refresh;

/// Runs a lookup's track loop on the tokio runtime
#[derive(Debug)]
pub struct ServiceTracker {
    lookup: Arc<dyn DeployedVersionLookup>,
    task: Option<JoinHandle<()>>,
}

impl ServiceTracker {
    pub fn new(lookup: Arc<dyn DeployedVersionLookup>) -> Self {
        Self { lookup, task: None }
    }

    pub fn lookup(&self) -> &Arc<dyn DeployedVersionLookup> {
        &self.lookup
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Create the metric series and spawn the track loop.
    ///
    /// Returns whether the service is being tracked: `false` for an inactive
    /// service, `true` if it was already started.
    pub fn start(&mut self) -> bool {
        if self.task.is_some() {
            return true;
        }

        let binding = self.lookup.binding();
        if !binding.options.active() {
            tracing::info!(service = %binding.service_id(), "service is inactive, not tracking");
            return false;
        }

        if let Some(metrics) = &binding.metrics {
            metrics.init_service(binding.service_id(), self.lookup.lookup_type().as_str());
        }

        tracing::debug!(service = %binding.service_id(), "tracking deployed version");
        let lookup = Arc::clone(&self.lookup);
        self.task = Some(tokio::spawn(async move { lookup.track().await }));
        true
    }

    /// Stop tracking and remove the metric series.
    ///
    /// The loop notices the deleting flag at its next iteration, so this can
    /// wait up to one interval.
    pub async fn stop(&mut self) {
        let binding = self.lookup.binding();
        binding.status.set_deleting();

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(service = %binding.service_id(), "track task failed: {}", e);
            }
        }

        if let Some(metrics) = &binding.metrics {
            metrics.delete_service(binding.service_id(), self.lookup.lookup_type().as_str());
        }
    }

    /// Refresh the tracked lookup (see [`refresh`])
    pub async fn refresh(
        &self,
        overrides: Option<&str>,
        semantic_versioning: Option<&str>,
    ) -> Result<String> {
        refresh(
            Some(self.lookup.as_ref()),
            self.lookup.service_id(),
            overrides,
            semantic_versioning,
        )
        .await
    }
}
