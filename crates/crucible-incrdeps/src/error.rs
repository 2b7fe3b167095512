use crucible_types::{Classify, ErrorKind};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IncrDepsError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dependency store at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl Classify for IncrDepsError {
    fn kind(&self) -> ErrorKind {
        match self {
            IncrDepsError::Io { .. } => ErrorKind::Io,
            IncrDepsError::Corrupt { .. } => ErrorKind::Cache,
        }
    }
}

pub type Result<T> = std::result::Result<T, IncrDepsError>;
