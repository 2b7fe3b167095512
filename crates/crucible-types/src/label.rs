//! Target labels of the form `//path/to/pkg:name`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The canonical, globally-unique name of a target within a workspace.
///
/// Labels sort lexically so that two runs over the same workspace can break
/// topological-order ties the same way every time (spec.md §4.1).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label(String);

#[derive(Debug, Clone, thiserror::Error)]
pub enum LabelError {
    #[error("label {0:?} must start with //")]
    MissingRootSlashes(String),
    #[error("label {0:?} must contain exactly one ':' separating package path and name")]
    MissingColon(String),
    #[error("label {0:?} has an empty package path or name")]
    EmptyComponent(String),
}

impl Label {
    pub fn parse(raw: &str) -> Result<Self, LabelError> {
        let rest = raw
            .strip_prefix("//")
            .ok_or_else(|| LabelError::MissingRootSlashes(raw.to_string()))?;

        let mut parts = rest.splitn(2, ':');
        let pkg = parts.next().unwrap_or_default();
        let name = match parts.next() {
            Some(n) => n,
            None => return Err(LabelError::MissingColon(raw.to_string())),
        };
        if name.is_empty() {
            return Err(LabelError::EmptyComponent(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The package-path portion, e.g. `path/to/pkg` for `//path/to/pkg:name`.
    pub fn package(&self) -> &str {
        let rest = &self.0[2..];
        rest.split(':').next().unwrap_or_default()
    }

    /// The target-name portion, e.g. `name` for `//path/to/pkg:name`.
    pub fn name(&self) -> &str {
        let rest = &self.0[2..];
        rest.splitn(2, ':').nth(1).unwrap_or_default()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label({})", self.0)
    }
}

impl FromStr for Label {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
