use crucible_types::Label;
use std::time::Duration;

/// Build progress events the scheduler publishes through an [`EventSink`]
/// (spec.md §4.7: "Publish build events ... through an event sink").
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    TargetStarted(Label),
    TargetCompleted(Label, Duration),
    TargetCached(Label),
    TargetFailed(Label, String),
    TargetSkipped(Label),
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: SchedulerEvent);
}

/// An [`EventSink`] that drops every event, for callers that only want the
/// final [`crate::SchedulerReport`].
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: SchedulerEvent) {}
}
