//! Build metrics (SPEC_FULL.md §4.8). Not named as a component in
//! `spec.md` — it's ambient, not functional — but every layer below emits
//! countable events an operator will want exported. The Non-goal
//! excluding "telemetry exporters" excludes shipping an OTLP/push
//! integration, not instrumenting hit/miss/built/failed counts.
//!
//! Grounded on `dashflow-registry::metrics::RegistryMetrics`'s
//! feature-gated `prometheus` pattern: the trait and a no-op default
//! always compile; the Prometheus-backed implementation is behind the
//! `prometheus-metrics` feature so most consumers don't pull the crate in.

pub trait MetricsSink: Send + Sync {
    fn record_cache_hit(&self);
    fn record_cache_miss(&self);
    fn record_built(&self);
    fn record_failed(&self);
    fn record_skipped(&self);
}

pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_cache_hit(&self) {}
    fn record_cache_miss(&self) {}
    fn record_built(&self) {}
    fn record_failed(&self) {}
    fn record_skipped(&self) {}
}

#[cfg(feature = "prometheus-metrics")]
pub use prometheus_impl::PrometheusMetrics;

#[cfg(feature = "prometheus-metrics")]
mod prometheus_impl {
    use super::MetricsSink;
    use prometheus::{IntCounter, Registry};

    pub struct PrometheusMetrics {
        pub registry: Registry,
        cache_hits_total: IntCounter,
        cache_misses_total: IntCounter,
        targets_built_total: IntCounter,
        targets_failed_total: IntCounter,
        targets_skipped_total: IntCounter,
    }

    impl PrometheusMetrics {
        pub fn new() -> Result<Self, prometheus::Error> {
            let registry = Registry::new();
            let cache_hits_total = IntCounter::new("crucible_cache_hits_total", "action cache hits")?;
            let cache_misses_total = IntCounter::new("crucible_cache_misses_total", "action cache misses")?;
            let targets_built_total = IntCounter::new("crucible_targets_built_total", "targets executed")?;
            let targets_failed_total = IntCounter::new("crucible_targets_failed_total", "targets failed")?;
            let targets_skipped_total = IntCounter::new("crucible_targets_skipped_total", "targets skipped")?;

            registry.register(Box::new(cache_hits_total.clone()))?;
            registry.register(Box::new(cache_misses_total.clone()))?;
            registry.register(Box::new(targets_built_total.clone()))?;
            registry.register(Box::new(targets_failed_total.clone()))?;
            registry.register(Box::new(targets_skipped_total.clone()))?;

            Ok(Self {
                registry,
                cache_hits_total,
                cache_misses_total,
                targets_built_total,
                targets_failed_total,
                targets_skipped_total,
            })
        }
    }

    impl MetricsSink for PrometheusMetrics {
        fn record_cache_hit(&self) {
            self.cache_hits_total.inc();
        }

        fn record_cache_miss(&self) {
            self.cache_misses_total.inc();
        }

        fn record_built(&self) {
            self.targets_built_total.inc();
        }

        fn record_failed(&self) {
            self.targets_failed_total.inc();
        }

        fn record_skipped(&self) {
            self.targets_skipped_total.inc();
        }
    }
}
