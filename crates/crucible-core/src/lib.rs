//! Orchestrator crate (spec.md §4.7): sequences graph construction,
//! action-expansion, scheduling, and cache persistence into one build, and
//! exposes the configuration, event, metrics, and report types every other
//! crate in this workspace was built to be driven by.

mod config;
mod error;
mod event;
mod metrics;
mod orchestrator;
mod report;
mod tracing_init;

pub use config::{EngineConfig, EngineConfigOverrides};
pub use error::{BuilderError, Result};
pub use event::{BuildEvent, EventSink, NullEventSink};
pub use metrics::{MetricsSink, NoopMetrics};
pub use orchestrator::Orchestrator;
pub use report::{exit_code_for, BuildReport, FailureRecord};

#[cfg(feature = "prometheus-metrics")]
pub use metrics::PrometheusMetrics;

#[cfg(feature = "tracing-init")]
pub use tracing_init::init_tracing;
