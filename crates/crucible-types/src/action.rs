//! Actions — the unit of execution the scheduler sees.

use crate::{ActionFingerprint, Label};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Compile,
    Link,
    Test,
    Custom(String),
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Compile => "compile",
            ActionKind::Link => "link",
            ActionKind::Test => "test",
            ActionKind::Custom(s) => s.as_str(),
        }
    }
}

/// A pure function of its declared inputs and parameters. Any dependency
/// that is not declared here is a hermeticity bug (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// The target this action was expanded from.
    pub label: Label,
    pub kind: ActionKind,
    /// Tool identity string, e.g. `"rustc-1.78.0"` — fed into the fingerprint
    /// as the first field (spec.md §4.2).
    pub tool: String,
    /// Declared input file paths, relative to the workspace root, in the
    /// order they must be hashed.
    pub inputs: Vec<PathBuf>,
    /// Fingerprints of upstream actions this action depends on, in declared
    /// dependency order.
    pub upstream_outputs: Vec<ActionFingerprint>,
    pub flags: Vec<String>,
    /// The declared environment-variable allowlist for this action (spec.md
    /// §9, Open Questions: a declared subset, not the full environment).
    pub env: BTreeMap<String, String>,
    /// Output paths this action promises to produce, relative to its
    /// working directory.
    pub outputs: Vec<PathBuf>,
    pub timeout: Option<Duration>,
}

impl Action {
    pub fn new(label: Label, kind: ActionKind, tool: impl Into<String>) -> Self {
        Self {
            label,
            kind,
            tool: tool.into(),
            inputs: Vec::new(),
            upstream_outputs: Vec::new(),
            flags: Vec::new(),
            env: BTreeMap::new(),
            outputs: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<PathBuf>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<PathBuf>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_flags(mut self, flags: Vec<String>) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_upstream(mut self, upstream: Vec<ActionFingerprint>) -> Self {
        self.upstream_outputs = upstream;
        self
    }

    /// A target with zero sources and no dependencies still expands to one
    /// no-op action (spec.md §4.1).
    pub fn no_op(label: Label) -> Self {
        Self::new(label, ActionKind::Custom("noop".to_string()), "noop")
    }
}
