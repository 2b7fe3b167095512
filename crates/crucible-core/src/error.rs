use crucible_types::{Classify, ErrorKind, Label};
use std::path::PathBuf;

/// Aggregates every crate-local error enum so callers of the orchestrator
/// only need to match one type (spec.md §7, teacher's per-crate
/// `RegistryError` + workspace-level aggregation pattern).
#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    #[error("requested target {0} does not exist in the workspace")]
    UnknownTarget(Label),

    #[error(transparent)]
    Graph(#[from] crucible_graph::GraphError),

    #[error(transparent)]
    Hash(#[from] crucible_hash::HashError),

    #[error(transparent)]
    IncrDeps(#[from] crucible_incrdeps::IncrDepsError),

    #[error(transparent)]
    Cache(#[from] crucible_cache::CacheError),

    #[error(transparent)]
    Cas(#[from] crucible_cas::CasError),

    #[error(transparent)]
    Scheduler(#[from] crucible_scheduler::SchedulerError),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("import analysis failed for {path}: {reason}")]
    Analysis { path: PathBuf, reason: String },
}

impl Classify for BuilderError {
    fn kind(&self) -> ErrorKind {
        match self {
            BuilderError::UnknownTarget(_) => ErrorKind::Graph,
            BuilderError::Graph(e) => e.kind(),
            BuilderError::Hash(e) => e.kind(),
            BuilderError::IncrDeps(e) => e.kind(),
            BuilderError::Cache(e) => e.kind(),
            BuilderError::Cas(e) => e.kind(),
            BuilderError::Scheduler(e) => e.kind(),
            BuilderError::Io { .. } => ErrorKind::Io,
            BuilderError::Analysis { .. } => ErrorKind::Analysis,
        }
    }
}

pub type Result<T> = std::result::Result<T, BuilderError>;
