//! Runtime bindings of a lookup
//!
//! A lookup's config is plain data. Everything it works against at runtime,
//! the service's options and status, the default tiers, metrics and the
//! logging span, is shared through a [`Binding`].

use std::sync::Arc;

use verwatch_core::{LookupDefaults, Options, QueryMetrics, Status};

use crate::error::Result;

/// Shared collaborators of one lookup
#[derive(Debug, Clone)]
pub struct Binding {
    pub options: Arc<Options>,
    pub status: Arc<Status>,
    pub defaults: Arc<LookupDefaults>,
    pub hard_defaults: Arc<LookupDefaults>,
    pub metrics: Option<QueryMetrics>,
    /// Logging context of every query
    pub span: tracing::Span,
}

impl Default for Binding {
    fn default() -> Self {
        Self {
            options: Arc::new(Options::default()),
            status: Arc::new(Status::default()),
            defaults: Arc::new(LookupDefaults::default()),
            hard_defaults: Arc::new(LookupDefaults::hard()),
            metrics: None,
            span: tracing::Span::none(),
        }
    }
}

impl Binding {
    /// Bind to a service, checking the hard-default tiers are complete
    pub fn new(
        options: Arc<Options>,
        status: Arc<Status>,
        defaults: Arc<LookupDefaults>,
        hard_defaults: Arc<LookupDefaults>,
    ) -> Result<Self> {
        hard_defaults.ensure_complete()?;
        options.hard_defaults.ensure_complete()?;

        let span = tracing::info_span!("deployed_version", service = %status.service_id());
        Ok(Self {
            options,
            status,
            defaults,
            hard_defaults,
            metrics: None,
            span,
        })
    }

    /// Record query metrics
    pub fn with_metrics(mut self, metrics: QueryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn service_id(&self) -> &str {
        self.status.service_id()
    }

    /// A binding to `options` and an empty status nobody listens to.
    ///
    /// The default tiers and metrics are shared with `self`.
    pub fn detached(&self, options: Options, service_id: &str) -> Self {
        Self {
            options: Arc::new(options),
            status: Arc::new(Status::detached(service_id)),
            defaults: Arc::clone(&self.defaults),
            hard_defaults: Arc::clone(&self.hard_defaults),
            metrics: self.metrics.clone(),
            span: tracing::info_span!("deployed_version_refresh", service = %service_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_incomplete_hard_defaults() {
        let result = Binding::new(
            Arc::new(Options::default()),
            Arc::new(Status::detached("svc")),
            Arc::new(LookupDefaults::default()),
            Arc::new(LookupDefaults::default()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_detached_shares_defaults_not_status() {
        let binding = Binding::new(
            Arc::new(Options::default()),
            Arc::new(Status::detached("svc")),
            Arc::new(LookupDefaults::default()),
            Arc::new(LookupDefaults::hard()),
        )
        .unwrap();
        binding.status.set_deployed_version("1.0.0", None, false);

        let copy = binding.detached(Options::default(), "svc");

        assert!(Arc::ptr_eq(&binding.defaults, &copy.defaults));
        assert!(Arc::ptr_eq(&binding.hard_defaults, &copy.hard_defaults));
        assert!(!Arc::ptr_eq(&binding.status, &copy.status));
        assert_eq!(copy.status.deployed_version(), "");
        assert_eq!(copy.service_id(), "svc");
    }
}
