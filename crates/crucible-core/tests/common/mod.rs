//! Shared fixtures for the orchestrator's scenario tests (spec.md §8,
//! "S1-S6"). `StubHandler` stands in for a real language driver: it
//! "compiles" by hashing its declared inputs, so two builds over
//! unchanged sources are bit-for-bit identical without needing a real
//! toolchain in the test sandbox.

use crucible_core::{BuildEvent, EventSink};
use crucible_types::{Action, HandlerError, HandlerOutcome, Import, LanguageHandler, Target};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct StubHandler;

impl LanguageHandler for StubHandler {
    fn build(
        &self,
        target: &Target,
        action: &Action,
        workspace_root: &Path,
        working_dir: &Path,
    ) -> Result<HandlerOutcome, HandlerError> {
        let mut hasher = blake3::Hasher::new();
        for input in &action.inputs {
            let data = std::fs::read(workspace_root.join(input))
                .map_err(|e| HandlerError::ProcessFailed(e.to_string()))?;
            hasher.update(&data);
        }
        let digest = hasher.finalize();
        let output_rel = PathBuf::from(format!("{}.out", target.label.name()));
        std::fs::write(working_dir.join(&output_rel), digest.as_bytes())
            .map_err(|e| HandlerError::ProcessFailed(e.to_string()))?;

        Ok(HandlerOutcome {
            success: true,
            outputs: vec![output_rel],
            output_hash: Some(crucible_types::ArtifactDigest::from_digest(
                crucible_types::Digest::from_bytes(*digest.as_bytes()),
            )),
            error: None,
            warnings: Vec::new(),
        })
    }

    fn outputs(&self, target: &Target, _action: &Action) -> Vec<PathBuf> {
        vec![PathBuf::from(format!("{}.out", target.label.name()))]
    }

    fn analyze_imports(&self, _sources: &[PathBuf]) -> Result<Vec<Import>, HandlerError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<BuildEvent>>,
}

impl EventSink for RecordingSink {
    fn emit(&self, event: BuildEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn write_source(root: &Path, name: &str, content: &[u8]) {
    std::fs::write(root.join(name), content).unwrap();
}
