//! Authorization request observations.
//!
//! Every call to the dispatcher produces exactly one observation, whether it
//! was granted, denied or failed to resolve. The dispatcher only records;
//! exposing the samples (e.g. over a `/metrics` endpoint) is left to the
//! embedding application through [`MetricsSink::registry`].

use std::fmt;
use std::time::Duration;

use prometheus::{core::Collector, HistogramOpts, HistogramVec, Registry};

use crate::Result;

pub const REQUEST_DURATION: &str = "authorization_request_duration_seconds";

/// Write-only destination for authorization observations.
pub trait MetricsSink: Send + Sync {
    fn record_observation(&self, policy: &str, rule: &str, elapsed: Duration);

    /// Registry holding the sink's collectors, if it has one.
    fn registry(&self) -> Option<&Registry> {
        None
    }
}

/// Records observations into a `{policy, rule}` labeled histogram on a
/// private registry.
pub struct PrometheusMetrics {
    registry: Registry,
    requests: HistogramVec,
}

impl PrometheusMetrics {
    pub fn new(namespace: &str) -> Result<Self> {
        let registry = Registry::new();

        let requests = HistogramVec::new(
            HistogramOpts::new(REQUEST_DURATION, "All authorization request observations")
                .namespace(namespace),
            &["policy", "rule"],
        )?;
        registry.register(Box::new(requests.clone()))?;

        Ok(Self { registry, requests })
    }

    /// Number of observations recorded for a policy/rule pair. Reading a
    /// pair that was never observed does not create its series.
    pub fn sample_count(&self, policy: &str, rule: &str) -> u64 {
        self.requests
            .collect()
            .iter()
            .flat_map(|family| family.get_metric())
            .find(|metric| {
                metric.get_label().iter().all(|pair| match pair.get_name() {
                    "policy" => pair.get_value() == policy,
                    "rule" => pair.get_value() == rule,
                    _ => true,
                })
            })
            .map_or(0, |metric| metric.get_histogram().get_sample_count())
    }
}

impl MetricsSink for PrometheusMetrics {
    fn record_observation(&self, policy: &str, rule: &str, elapsed: Duration) {
        self.requests
            .with_label_values(&[policy, rule])
            .observe(elapsed.as_secs_f64());
    }

    fn registry(&self) -> Option<&Registry> {
        Some(&self.registry)
    }
}

impl fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

/// Discards every observation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_observation(&self, _policy: &str, _rule: &str, _elapsed: Duration) {}
}
