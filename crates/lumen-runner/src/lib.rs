//! Run orchestration: drives a configured run through gather, the computed
//! graph, check execution, and category aggregation, producing one
//! [`RunResult`].
//!
//! The browser process itself stays behind the [`Launcher`] boundary; the
//! runner only needs a connected session.

pub mod launch;
pub mod runner;

pub use launch::{Launched, Launcher, LaunchOptions};
pub use runner::{run, ArtifactsReport, Catalog, RunError, RunResult};
