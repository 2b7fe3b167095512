use crucible_types::{Classify, ErrorKind};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("action cache at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl Classify for CacheError {
    fn kind(&self) -> ErrorKind {
        match self {
            CacheError::Io { .. } => ErrorKind::Io,
            CacheError::Corrupt { .. } => ErrorKind::Cache,
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
