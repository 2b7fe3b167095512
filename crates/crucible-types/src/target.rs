//! Target declarations — immutable inputs to graph construction.

use crate::Label;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The closed set of target kinds the core understands directly.
///
/// `Custom` targets produce actions defined entirely by their language
/// handler (spec.md §4.1, edge-case policy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    Executable,
    Library,
    Test,
    Custom(String),
}

/// An immutable target declaration, as loaded from a validated workspace
/// object. The core never parses the declaration format itself (spec.md §1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub label: Label,
    pub kind: TargetKind,
    /// Handler identifier, e.g. `"rust"`, `"cpp"`, `"typescript"`.
    pub language: String,
    /// Source file paths, relative to the workspace root, in declared order.
    pub sources: Vec<PathBuf>,
    /// Dependency labels, in declared order. Must all resolve within the
    /// workspace (spec.md §3, Target invariant).
    pub deps: Vec<Label>,
    /// Free-form, string-keyed language-specific options.
    pub options: BTreeMap<String, String>,
    /// Optional explicit output path, relative to the workspace root.
    pub output: Option<PathBuf>,
}

impl Target {
    pub fn new(label: Label, kind: TargetKind, language: impl Into<String>) -> Self {
        Self {
            label,
            kind,
            language: language.into(),
            sources: Vec::new(),
            deps: Vec::new(),
            options: BTreeMap::new(),
            output: None,
        }
    }

    pub fn with_sources(mut self, sources: Vec<PathBuf>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_deps(mut self, deps: Vec<Label>) -> Self {
        self.deps = deps;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// A target with no sources and no dependencies is still buildable — it
    /// expands to a single no-op action (spec.md §4.1, edge-case policy).
    pub fn is_trivial(&self) -> bool {
        self.sources.is_empty() && self.deps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_target_has_no_sources_or_deps() {
        let t = Target::new(Label::parse("//a:a").unwrap(), TargetKind::Executable, "cpp");
        assert!(t.is_trivial());
    }

    #[test]
    fn builder_methods_compose() {
        let t = Target::new(Label::parse("//a:a").unwrap(), TargetKind::Library, "rust")
            .with_sources(vec![PathBuf::from("a.rs")])
            .with_deps(vec![Label::parse("//b:b").unwrap()])
            .with_option("edition", "2021");
        assert!(!t.is_trivial());
        assert_eq!(t.options.get("edition").map(String::as_str), Some("2021"));
    }
}
