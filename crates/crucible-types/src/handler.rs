//! The language-handler interface (spec.md §6.2) — the core's view of an
//! external, per-language build driver. Implementations live outside this
//! workspace; the core only depends on this trait.

use crate::{Action, ArtifactDigest, Target};
use std::path::{Path, PathBuf};

/// The result of asking a handler to build one action.
#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    pub success: bool,
    /// Output paths, relative to the working directory the handler was
    /// given.
    pub outputs: Vec<PathBuf>,
    /// Digest over all outputs, used for the optional determinism
    /// cross-check (spec.md §6.2).
    pub output_hash: Option<ArtifactDigest>,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

impl HandlerOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            outputs: Vec::new(),
            output_hash: None,
            error: Some(error.into()),
            warnings: Vec::new(),
        }
    }
}

/// A single resolved (or unresolved) import edge discovered by
/// `analyze_imports`, consumed by `crucible-incrdeps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// The raw import string as it appeared in source, e.g. `foo.bar` or
    /// `"foo.h"`.
    pub raw: String,
    /// The resolved workspace-relative path, or `None` if the import
    /// resolves outside the workspace (system / third-party) and is
    /// therefore excluded from fine-grained tracking (spec.md §4.3).
    pub resolved: Option<PathBuf>,
}

/// Errors a handler may report back to the core. The core does not
/// interpret these beyond propagating them as Build-kind errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    #[error("handler process failed: {0}")]
    ProcessFailed(String),
    #[error("handler timed out")]
    Timeout,
    #[error("import analysis failed: {0}")]
    AnalysisFailed(String),
}

/// The opaque, external per-language build driver (spec.md §6.2).
///
/// Handlers must be deterministic given identical inputs; the core trusts
/// this contract and may verify it by re-running with perturbed
/// timestamps/PRNG seed and comparing `output_hash`.
pub trait LanguageHandler: Send + Sync {
    fn build(
        &self,
        target: &Target,
        action: &Action,
        workspace_root: &Path,
        working_dir: &Path,
    ) -> Result<HandlerOutcome, HandlerError>;

    /// Predicted outputs without building, used for cache-hit materialization
    /// planning.
    fn outputs(&self, target: &Target, action: &Action) -> Vec<PathBuf>;

    fn analyze_imports(&self, sources: &[PathBuf]) -> Result<Vec<Import>, HandlerError>;
}
