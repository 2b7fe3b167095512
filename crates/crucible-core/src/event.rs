//! The concrete event shape behind "an event sink (external)" (spec.md
//! §4.7; SPEC_FULL.md §3.1). The sink trait stays pluggable — no terminal
//! UI or exporter ships here — but the event enum is part of the core's
//! contract, since `spec.md` only named the event kinds, not their shape.

use crate::metrics::MetricsSink;
use crate::report::BuildReport;
use crucible_types::Label;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum BuildEvent {
    Started,
    TargetStarted(Label),
    TargetCompleted { label: Label, duration: Duration },
    TargetCached { label: Label },
    TargetFailed { label: Label, reason: String },
    TargetSkipped { label: Label },
    Completed(BuildReport),
    Failed(BuildReport),
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: BuildEvent);
}

pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: BuildEvent) {}
}

/// Bridges `crucible_scheduler::EventSink` (the scheduler's narrower,
/// per-target event shape) to this crate's `BuildEvent` contract, so the
/// orchestrator's caller only ever sees one event type regardless of which
/// layer raised it.
pub(crate) struct SchedulerEventBridge {
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) metrics: Arc<dyn MetricsSink>,
}

impl crucible_scheduler::EventSink for SchedulerEventBridge {
    fn emit(&self, event: crucible_scheduler::SchedulerEvent) {
        use crucible_scheduler::SchedulerEvent as SE;
        let translated = match event {
            SE::TargetStarted(label) => BuildEvent::TargetStarted(label),
            SE::TargetCompleted(label, duration) => {
                self.metrics.record_cache_miss();
                self.metrics.record_built();
                BuildEvent::TargetCompleted { label, duration }
            }
            SE::TargetCached(label) => {
                self.metrics.record_cache_hit();
                BuildEvent::TargetCached { label }
            }
            SE::TargetFailed(label, reason) => {
                self.metrics.record_failed();
                BuildEvent::TargetFailed { label, reason }
            }
            SE::TargetSkipped(label) => {
                self.metrics.record_skipped();
                BuildEvent::TargetSkipped { label }
            }
        };
        self.sink.emit(translated);
    }
}
