//! Error types for the lumen-score crate.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ScoreError {
    /// The curve's shape solve has no positive real solution. Happens when
    /// `falloff` is not meaningfully below `median`; the boundary is
    /// rejected explicitly rather than clamped.
    #[error("degenerate score curve: median={median}, falloff={falloff} ({detail})")]
    DegenerateCurve {
        median: f64,
        falloff: f64,
        detail: String,
    },
}
