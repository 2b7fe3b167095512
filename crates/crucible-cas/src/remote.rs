//! Pluggable remote CAS backend (spec.md §4.5).
//!
//! The scheduler is thread-based, not async, so [`RemoteCasHandle`] bridges
//! the async [`RemoteCas`] trait onto a small dedicated Tokio runtime and
//! exposes a blocking API. A remote timeout is never fatal: callers fall
//! back to local execution (spec.md §4.5, "a timeout is not fatal").

use crate::error::{CasError, Result};
use async_trait::async_trait;
use crucible_types::{retry_with_backoff, ArtifactDigest, BackoffPolicy, RetryOutcome};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::warn;

#[async_trait]
pub trait RemoteCas: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn exists(&self, digest: ArtifactDigest) -> Result<bool>;
    async fn get(&self, digest: ArtifactDigest) -> Result<Vec<u8>>;
    async fn put(&self, digest: ArtifactDigest, data: Vec<u8>) -> Result<()>;
}

/// A remote CAS backed by plain HTTP GET/PUT against `{base_url}/{digest}`.
pub struct HttpRemoteCas {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpRemoteCas {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    fn url_for(&self, digest: ArtifactDigest) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), digest.to_hex())
    }
}

#[async_trait]
impl RemoteCas for HttpRemoteCas {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn exists(&self, digest: ArtifactDigest) -> Result<bool> {
        let resp = self
            .client
            .head(self.url_for(digest))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| to_cas_error(e, self.timeout))?;
        Ok(resp.status().is_success())
    }

    async fn get(&self, digest: ArtifactDigest) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(self.url_for(digest))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| to_cas_error(e, self.timeout))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CasError::ArtifactNotFound(digest));
        }
        let bytes = resp
            .error_for_status()
            .map_err(|e| to_cas_error(e, self.timeout))?
            .bytes()
            .await
            .map_err(|e| to_cas_error(e, self.timeout))?;
        Ok(bytes.to_vec())
    }

    async fn put(&self, digest: ArtifactDigest, data: Vec<u8>) -> Result<()> {
        self.client
            .put(self.url_for(digest))
            .timeout(self.timeout)
            .body(data)
            .send()
            .await
            .map_err(|e| to_cas_error(e, self.timeout))?
            .error_for_status()
            .map_err(|e| to_cas_error(e, self.timeout))?;
        Ok(())
    }
}

fn to_cas_error(err: reqwest::Error, timeout: Duration) -> CasError {
    if err.is_timeout() {
        CasError::RemoteTimeout(timeout)
    } else {
        CasError::Remote(err.to_string())
    }
}

/// Bridges an async [`RemoteCas`] onto the scheduler's synchronous worker
/// threads, retrying only transient failures with exponential backoff
/// (spec.md §4.6, "Retry").
pub struct RemoteCasHandle {
    runtime: Runtime,
    backend: Box<dyn RemoteCas>,
    retry_policy: BackoffPolicy,
}

impl RemoteCasHandle {
    pub fn new(backend: Box<dyn RemoteCas>) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            backend,
            retry_policy: BackoffPolicy::default(),
        })
    }

    /// Fetches `digest` from the remote backend. Returns `Ok(None)` on a
    /// non-fatal miss or exhausted-timeout condition so the caller can fall
    /// back to local execution rather than failing the build.
    pub fn try_get(&self, digest: ArtifactDigest) -> Option<Vec<u8>> {
        let result = retry_with_backoff(self.retry_policy, |_attempt| {
            match self.runtime.block_on(self.backend.get(digest)) {
                Ok(data) => Ok(data),
                Err(e @ CasError::RemoteTimeout(_)) | Err(e @ CasError::Remote(_)) => {
                    Err(RetryOutcome::Retryable(e))
                }
                Err(e) => Err(RetryOutcome::Fatal(e)),
            }
        });
        match result {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(%digest, error = %e, "remote CAS fetch failed, falling back to local");
                None
            }
        }
    }

    pub fn put(&self, digest: ArtifactDigest, data: Vec<u8>) -> Result<()> {
        self.runtime.block_on(self.backend.put(digest, data))
    }

    pub fn exists(&self, digest: ArtifactDigest) -> bool {
        self.runtime
            .block_on(self.backend.exists(digest))
            .unwrap_or(false)
    }
}
