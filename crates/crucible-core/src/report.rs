//! The build-wide summary the orchestrator returns (spec.md §4.7 step 6).

use crucible_types::Label;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub label: Label,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub built: usize,
    pub cached: usize,
    pub failed: Vec<FailureRecord>,
    pub skipped: usize,
    pub duration: Duration,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Translates a `BuildReport` into the process exit code convention from
/// spec.md §6.4: 0 = success (or nothing to do), 1 = at least one
/// failure, 2 = configuration error (invalid graph, missing dependency),
/// 130 = cancelled by user.
///
/// The `2` and `130` cases correspond to conditions a caller observes
/// before ever getting a `BuildReport` (a `BuilderError` or an
/// externally-delivered cancellation signal); they're listed here so one
/// place documents the whole convention a CLI would implement, even
/// though no CLI ships in this crate (spec.md Non-goals).
pub fn exit_code_for(result: &std::result::Result<BuildReport, crate::BuilderError>) -> i32 {
    match result {
        Ok(report) if report.is_success() => 0,
        Ok(_) => 1,
        Err(crate::BuilderError::Graph(_)) | Err(crate::BuilderError::UnknownTarget(_)) => 2,
        Err(_) => 1,
    }
}
