use crucible_types::{Classify, ErrorKind};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HashError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("symlink loop detected at {0}")]
    SymlinkLoop(PathBuf),
}

impl Classify for HashError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Io
    }
}

pub type Result<T> = std::result::Result<T, HashError>;
