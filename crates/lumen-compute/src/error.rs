//! Error types for the lumen-compute crate.

use thiserror::Error;

/// Errors surfaced by [`crate::Graph::request`].
///
/// `Clone` because failed computations are cached: every later request for
/// the same name re-surfaces the same error without recomputing.
#[derive(Debug, Clone, Error)]
pub enum ComputeError {
    /// The name is neither a raw artifact nor a registered derivation, or
    /// the raw artifact degraded to an unavailable marker during gathering.
    #[error("artifact '{name}' is not available")]
    MissingArtifact {
        name: String,
        /// Debug text from the unavailable marker, when there is one.
        debug: Option<String>,
    },

    /// The dependency chain reached a name already being computed on it.
    #[error("cyclic artifact dependency: {}", chain.join(" -> "))]
    CyclicDependency { chain: Vec<String> },

    /// The derivation function failed (e.g. malformed raw data).
    #[error("derivation of '{name}' failed: {detail}")]
    Derivation { name: String, detail: String },
}

/// Failure returned by a derivation function.
#[derive(Debug, Clone, Error)]
#[error("{detail}")]
pub struct DerivationError {
    pub detail: String,
}

impl DerivationError {
    pub fn new(detail: impl Into<String>) -> Self {
        DerivationError {
            detail: detail.into(),
        }
    }
}
