//! Parallel worker-pool scheduler driving a [`crucible_graph::BuildGraph`] to
//! completion (spec.md §4.6).
//!
//! The scheduler walks the graph leaves-first, dispatching ready nodes to a
//! fixed-size rayon worker pool ordered by critical-path length, honoring the
//! action cache before invoking a language handler, and materializing cached
//! or freshly-produced outputs from content-addressed storage into the
//! workspace.

mod config;
mod critical_path;
mod error;
mod event;
mod materialize;
mod ready_queue;
mod report;
mod scheduler;
mod semaphore;
mod state;

pub use config::SchedulerConfig;
pub use error::{Result, SchedulerError};
pub use event::{EventSink, NullSink, SchedulerEvent};
pub use materialize::materialize;
pub use report::SchedulerReport;
pub use scheduler::Scheduler;
pub use state::NodeState;
