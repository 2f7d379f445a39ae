//! Metrics collection and export module

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Classification counters
    pub transactions_classified: IntCounter,
    pub transactions_blocked: IntCounter,
    pub threats_detected: IntCounter,
    pub deep3_analyses: IntCounter,
    pub deep3_escalations: IntCounter,
    pub supplier_failures: IntCounter,

    // Tier counters
    pub tier_resolutions: IntCounter,
    pub tier_changes: IntCounter,

    // Bot lifecycle counters
    pub bots_created: IntCounter,
    pub lifecycle_sweeps: IntCounter,
    pub lifecycle_sweeps_skipped: IntCounter,
    pub bots_paused: IntCounter,
    pub bots_deleted: IntCounter,
    pub sweep_item_failures: IntCounter,

    // Gauges
    pub bots_seen_last_sweep: IntGauge,
    pub event_subscribers: IntGauge,

    // Histograms
    pub classification_latency: Histogram,
    pub deep3_latency: Histogram,
    pub sweep_duration: Histogram,
}

fn counter(name: &str, help: &str) -> prometheus::Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let transactions_classified =
            counter("transactions_classified_total", "Transactions run through the classifier")?;
        let transactions_blocked =
            counter("transactions_blocked_total", "Transactions with a final BLOCK verdict")?;
        let threats_detected =
            counter("threats_detected_total", "Transactions with a final threat level above SAFE")?;
        let deep3_analyses = counter("deep3_analyses_total", "Successful Deep3 analyses")?;
        let deep3_escalations = counter(
            "deep3_escalations_total",
            "Verdicts raised by the Deep3 risk score",
        )?;
        let supplier_failures = counter(
            "supplier_failures_total",
            "Supplier errors or timeouts that fell back to local data",
        )?;

        let tier_resolutions = counter("tier_resolutions_total", "Tier resolutions performed")?;
        let tier_changes = counter("tier_changes_total", "Resolutions that changed the cached tier")?;

        let bots_created = counter("bots_created_total", "Arbitrage bots created")?;
        let lifecycle_sweeps = counter("lifecycle_sweeps_total", "Completed bot lifecycle sweeps")?;
        let lifecycle_sweeps_skipped = counter(
            "lifecycle_sweeps_skipped_total",
            "Sweeps skipped because one was already running",
        )?;
        let bots_paused = counter("bots_auto_paused_total", "Bots auto-paused for failed payment")?;
        let bots_deleted = counter("bots_deleted_total", "Inactive bots deleted by the sweep")?;
        let sweep_item_failures =
            counter("sweep_item_failures_total", "Per-bot failures during a sweep")?;

        let bots_seen_last_sweep = IntGauge::with_opts(Opts::new(
            "bots_seen_last_sweep",
            "Bots enumerated by the most recent sweep",
        ))?;

        let event_subscribers = IntGauge::with_opts(Opts::new(
            "event_subscribers",
            "Receivers attached to the event bus",
        ))?;

        let classification_latency = Histogram::with_opts(
            HistogramOpts::new(
                "classification_latency_seconds",
                "End-to-end transaction classification latency",
            )
            .buckets(vec![0.0001, 0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0]),
        )?;

        let deep3_latency = Histogram::with_opts(
            HistogramOpts::new("deep3_latency_seconds", "Deep3 supplier call latency")
                .buckets(vec![0.01, 0.1, 0.5, 0.8, 1.0, 1.2, 2.0, 5.0]),
        )?;

        let sweep_duration = Histogram::with_opts(
            HistogramOpts::new("lifecycle_sweep_seconds", "Bot lifecycle sweep duration")
                .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(transactions_classified.clone()))?;
        registry.register(Box::new(transactions_blocked.clone()))?;
        registry.register(Box::new(threats_detected.clone()))?;
        registry.register(Box::new(deep3_analyses.clone()))?;
        registry.register(Box::new(deep3_escalations.clone()))?;
        registry.register(Box::new(supplier_failures.clone()))?;
        registry.register(Box::new(tier_resolutions.clone()))?;
        registry.register(Box::new(tier_changes.clone()))?;
        registry.register(Box::new(bots_created.clone()))?;
        registry.register(Box::new(lifecycle_sweeps.clone()))?;
        registry.register(Box::new(lifecycle_sweeps_skipped.clone()))?;
        registry.register(Box::new(bots_paused.clone()))?;
        registry.register(Box::new(bots_deleted.clone()))?;
        registry.register(Box::new(sweep_item_failures.clone()))?;
        registry.register(Box::new(bots_seen_last_sweep.clone()))?;
        registry.register(Box::new(event_subscribers.clone()))?;
        registry.register(Box::new(classification_latency.clone()))?;
        registry.register(Box::new(deep3_latency.clone()))?;
        registry.register(Box::new(sweep_duration.clone()))?;

        Ok(Self {
            registry,
            transactions_classified,
            transactions_blocked,
            threats_detected,
            deep3_analyses,
            deep3_escalations,
            supplier_failures,
            tier_resolutions,
            tier_changes,
            bots_created,
            lifecycle_sweeps,
            lifecycle_sweeps_skipped,
            bots_paused,
            bots_deleted,
            sweep_item_failures,
            bots_seen_last_sweep,
            event_subscribers,
            classification_latency,
            deep3_latency,
            sweep_duration,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text format
    pub fn gather_text(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
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

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}
