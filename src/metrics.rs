//! Metrics collection and export module

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub submissions_total: IntCounter,
    pub submissions_success: IntCounter,
    pub submissions_failed: IntCounter,
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
    pub sign_requests_total: IntCounter,
    pub sign_failures_total: IntCounter,

    // Gauges
    pub healthy_endpoints: IntGauge,
    pub signing_inflight: IntGauge,

    // Histograms
    pub submission_latency: Histogram,
    pub sign_latency: Histogram,
    pub transport_latency: Histogram,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let submissions_total = IntCounter::with_opts(Opts::new(
            "submissions_total",
            "Total number of submissions attempted",
        ))?;

        let submissions_success = IntCounter::with_opts(Opts::new(
            "submissions_success",
            "Number of acknowledged submissions",
        ))?;

        let submissions_failed = IntCounter::with_opts(Opts::new(
            "submissions_failed",
            "Number of submissions that surfaced an error",
        ))?;

        let cache_hits =
            IntCounter::with_opts(Opts::new("cache_hits", "Result cache lookups that hit"))?;

        let cache_misses =
            IntCounter::with_opts(Opts::new("cache_misses", "Result cache lookups that missed"))?;

        let sign_requests_total = IntCounter::with_opts(Opts::new(
            "sign_requests_total",
            "Jobs dispatched to the signing pool",
        ))?;

        let sign_failures_total = IntCounter::with_opts(Opts::new(
            "sign_failures_total",
            "Sign requests that ended in an error",
        ))?;

        let healthy_endpoints = IntGauge::with_opts(Opts::new(
            "healthy_endpoints",
            "Endpoints currently in the Connected state",
        ))?;

        let signing_inflight = IntGauge::with_opts(Opts::new(
            "signing_inflight",
            "Sign jobs queued or being processed",
        ))?;

        let submission_latency = Histogram::with_opts(
            HistogramOpts::new(
                "submission_latency_seconds",
                "End-to-end submission latency",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        )?;

        let sign_latency = Histogram::with_opts(
            HistogramOpts::new("sign_latency_seconds", "Signing pool round-trip latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;

        let transport_latency = Histogram::with_opts(
            HistogramOpts::new(
                "transport_latency_seconds",
                "Per-attempt endpoint submission latency",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;

        registry.register(Box::new(submissions_total.clone()))?;
        registry.register(Box::new(submissions_success.clone()))?;
        registry.register(Box::new(submissions_failed.clone()))?;
        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(sign_requests_total.clone()))?;
        registry.register(Box::new(sign_failures_total.clone()))?;
        registry.register(Box::new(healthy_endpoints.clone()))?;
        registry.register(Box::new(signing_inflight.clone()))?;
        registry.register(Box::new(submission_latency.clone()))?;
        registry.register(Box::new(sign_latency.clone()))?;
        registry.register(Box::new(transport_latency.clone()))?;

        Ok(Self {
            registry,
            submissions_total,
            submissions_success,
            submissions_failed,
            cache_hits,
            cache_misses,
            sign_requests_total,
            sign_failures_total,
            healthy_endpoints,
            signing_inflight,
            submission_latency,
            sign_latency,
            transport_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.start.elapsed().as_secs_f64());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
