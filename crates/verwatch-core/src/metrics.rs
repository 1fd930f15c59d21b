//! Prometheus metrics for deployed-version queries

use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};

/// Outcome label of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResult {
    Success,
    Fail,
}

impl QueryResult {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryResult::Success => "SUCCESS",
            QueryResult::Fail => "FAIL",
        }
    }
}

/// Query counters and liveness gauge, labelled by service id and lookup type
#[derive(Debug, Clone)]
pub struct QueryMetrics {
    /// Query results
    pub queries_total: IntCounterVec,

    /// 1 when the last query succeeded, 0 otherwise
    pub liveness: IntGaugeVec,
}

impl QueryMetrics {
    /// Create and register the metrics
    pub fn new(registry: &Registry) -> crate::Result<Self> {
        let queries_total = IntCounterVec::new(
            Opts::new(
                "deployed_version_query_result_total",
                "Number of deployed version queries by result",
            ),
            &["id", "type", "result"],
        )?;
        registry.register(Box::new(queries_total.clone()))?;

        let liveness = IntGaugeVec::new(
            Opts::new(
                "deployed_version_query_liveness",
                "Whether the last deployed version query succeeded (0=no, 1=yes)",
            ),
            &["id", "type"],
        )?;
        registry.register(Box::new(liveness.clone()))?;

        Ok(Self {
            queries_total,
            liveness,
        })
    }

    /// Create the series of a service so they export before the first query
    pub fn init_service(&self, service_id: &str, lookup_type: &str) {
        for result in [QueryResult::Success, QueryResult::Fail] {
            self.queries_total
                .with_label_values(&[service_id, lookup_type, result.as_str()]);
        }
        self.liveness.with_label_values(&[service_id, lookup_type]);
    }

    /// Remove every series of a service
    pub fn delete_service(&self, service_id: &str, lookup_type: &str) {
        for result in [QueryResult::Success, QueryResult::Fail] {
            // Missing series are fine here.
            let _ = self
                .queries_total
                .remove_label_values(&[service_id, lookup_type, result.as_str()]);
        }
        let _ = self.liveness.remove_label_values(&[service_id, lookup_type]);
    }

    /// Count a query and update liveness
    pub fn record(&self, service_id: &str, lookup_type: &str, result: QueryResult) {
        self.queries_total
            .with_label_values(&[service_id, lookup_type, result.as_str()])
            .inc();
        let live = match result {
            QueryResult::Success => 1,
            QueryResult::Fail => 0,
        };
        self.liveness
            .with_label_values(&[service_id, lookup_type])
            .set(live);
    }

    /// Current counter value (0 when the series does not exist)
    pub fn query_count(&self, service_id: &str, lookup_type: &str, result: QueryResult) -> u64 {
        self.queries_total
            .get_metric_with_label_values(&[service_id, lookup_type, result.as_str()])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    /// Current liveness value
    pub fn liveness_value(&self, service_id: &str, lookup_type: &str) -> i64 {
        self.liveness
            .get_metric_with_label_values(&[service_id, lookup_type])
            .map(|g| g.get())
            .unwrap_or(0)
    }
}
