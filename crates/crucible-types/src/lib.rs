//! Shared data-model primitives for the Crucible build engine.
//!
//! Every other `crucible-*` crate depends on this one; it has no internal
//! dependencies beyond `serde`, `thiserror`, and `hex`, so it can be pulled
//! in by the graph, cache, CAS, and scheduler crates without creating a
//! dependency cycle between them.

mod action;
mod digest;
mod error;
mod handler;
mod label;
pub mod retry;
mod target;

pub use action::{Action, ActionKind};
pub use digest::{ActionFingerprint, ArtifactDigest, Digest, InvalidDigest};
pub use error::{Classify, ErrorKind};
pub use handler::{HandlerError, HandlerOutcome, Import, LanguageHandler};
pub use label::{Label, LabelError};
pub use retry::{retry_with_backoff, BackoffPolicy, RetryOutcome};
pub use target::{Target, TargetKind};
