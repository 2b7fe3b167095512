use crucible_types::{Classify, ErrorKind, Label};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum GraphError {
    #[error("target {0} depends on unknown target {1}")]
    MissingDependency(Label, Label),

    #[error("label {0} is declared by more than one target")]
    DuplicateLabel(Label),

    #[error("circular dependency: {}", cycle_path(.0))]
    CircularDependency(Vec<Label>),

    #[error("no target with label {0} exists in this graph")]
    UnknownLabel(Label),
}

fn cycle_path(cycle: &[Label]) -> String {
    cycle
        .iter()
        .map(Label::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl Classify for GraphError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Graph
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
