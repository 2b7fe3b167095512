use crucible_types::{ArtifactDigest, Classify, ErrorKind};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CasError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {0} not found")]
    ArtifactNotFound(ArtifactDigest),

    #[error("written content for {digest} hashes to {actual}, not the claimed digest")]
    DigestMismatch {
        digest: ArtifactDigest,
        actual: ArtifactDigest,
    },

    #[error("remote CAS error: {0}")]
    Remote(String),

    #[error("remote CAS request timed out after {0:?}")]
    RemoteTimeout(std::time::Duration),
}

impl Classify for CasError {
    fn kind(&self) -> ErrorKind {
        match self {
            CasError::Io { .. } => ErrorKind::Io,
            CasError::ArtifactNotFound(_) | CasError::DigestMismatch { .. } => ErrorKind::Cache,
            CasError::Remote(_) | CasError::RemoteTimeout(_) => ErrorKind::Cache,
        }
    }
}

pub type Result<T> = std::result::Result<T, CasError>;
