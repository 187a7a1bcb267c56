//! Error types for the lumen-gather crate.

use thiserror::Error;

use lumen_protocol::ProtocolError;
use lumen_types::{ArtifactStore, DuplicateArtifact};

use crate::collector::CollectorError;

/// Fatal gather errors. `after_pass` failures are not here: they degrade to
/// unavailable-artifact markers instead of aborting.
#[derive(Debug, Error)]
pub enum GatherError {
    /// Applying the pass's network/cache environment failed; subsequent
    /// measurements would be invalid.
    #[error("environment setup for pass '{pass}' failed: {source}")]
    EnvironmentSetup {
        pass: String,
        #[source]
        source: ProtocolError,
    },

    /// A `before_pass` or `pass` hook failed. Later collectors assume the
    /// hooks of earlier ones are in place, so this aborts the pass.
    #[error("collector '{collector}' failed in {hook} of pass '{pass}': {source}")]
    CollectorHook {
        pass: String,
        collector: String,
        hook: &'static str,
        #[source]
        source: CollectorError,
    },

    /// The navigation command itself failed.
    #[error("navigation failed in pass '{pass}': {detail}")]
    Navigation { pass: String, detail: String },

    /// Two collectors (or a collector and a capture artifact) claimed the
    /// same artifact name. A configuration error, caught as the write
    /// happens.
    #[error(transparent)]
    DuplicateArtifact(#[from] DuplicateArtifact),

    /// The connection dropped mid-run.
    #[error(transparent)]
    Driver(#[from] ProtocolError),
}

/// A failed run, carrying whatever raw artifacts materialized before the
/// failure so the caller can still inspect them.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct GatherFailure {
    pub error: GatherError,
    pub partial: ArtifactStore,
}
