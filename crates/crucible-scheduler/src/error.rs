use crucible_types::{Classify, ErrorKind, Label};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("action for target {0} timed out")]
    Timeout(Label),

    #[error("target {0} failed: {1}")]
    HandlerFailed(Label, String),

    #[error("target {0} declared output {1} was not produced")]
    MissingOutput(Label, String),

    #[error("io error materializing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Hash(#[from] crucible_hash::HashError),

    #[error(transparent)]
    Cas(#[from] crucible_cas::CasError),

    #[error("build cancelled before target {0} started")]
    Cancelled(Label),
}

impl Classify for SchedulerError {
    fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::Timeout(_) | SchedulerError::HandlerFailed(_, _) | SchedulerError::MissingOutput(_, _) => {
                ErrorKind::Build
            }
            SchedulerError::Io { .. } => ErrorKind::Io,
            SchedulerError::Hash(_) => ErrorKind::Io,
            SchedulerError::Cas(_) => ErrorKind::Cache,
            SchedulerError::Cancelled(_) => ErrorKind::Build,
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
