//! # Prometheus Metrics
//!
//! Client-side counters for transaction outcomes and request latency.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] owned by the
//! connector, so embedding applications can expose or ignore them without
//! touching the default global registry.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

/// Holds all Prometheus metric handles for one connector.
///
/// Cheap to clone: prometheus handles are reference-counted internally.
#[derive(Clone)]
pub struct SdkMetrics {
    registry: Registry,
    /// Transactions the server acknowledged with `200 OK`.
    pub commits_total: IntCounter,
    /// Commit attempts that ended in any failure.
    pub commit_failures_total: IntCounter,
    /// Transactions explicitly aborted by the caller.
    pub aborts_total: IntCounter,
    /// Queries sent to a replica, successful or not.
    pub queries_total: IntCounter,
    /// Round-trip latency of submissions and queries in seconds.
    pub request_latency_seconds: Histogram,
}

impl SdkMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("bcdb_sdk".into()), None)?;

        let commits_total = IntCounter::new(
            "commits_total",
            "Total number of transactions committed by the server",
        )?;
        registry.register(Box::new(commits_total.clone()))?;

        let commit_failures_total = IntCounter::new(
            "commit_failures_total",
            "Total number of failed commit attempts",
        )?;
        registry.register(Box::new(commit_failures_total.clone()))?;

        let aborts_total = IntCounter::new("aborts_total", "Total number of aborted transactions")?;
        registry.register(Box::new(aborts_total.clone()))?;

        let queries_total = IntCounter::new("queries_total", "Total number of queries sent")?;
        registry.register(Box::new(queries_total.clone()))?;

        let request_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "request_latency_seconds",
                "Round-trip latency of requests to replicas in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
        )?;
        registry.register(Box::new(request_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            commits_total,
            commit_failures_total,
            aborts_total,
            queries_total,
            request_latency_seconds,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for SdkMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkMetrics")
            .field("commits_total", &self.commits_total.get())
            .field("commit_failures_total", &self.commit_failures_total.get())
            .field("aborts_total", &self.aborts_total.get())
            .field("queries_total", &self.queries_total.get())
            .finish()
    }
}
