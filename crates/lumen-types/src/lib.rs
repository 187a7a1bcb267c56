//! Core types shared across all lumen crates.
//!
//! Defines the artifact store, network and trace capture models, run
//! configuration, and run identifiers used by the protocol driver, gather
//! scheduler, computed-artifact graph, and scoring engine.

pub mod artifacts;
pub mod config;
pub mod config_loader;
pub mod ids;
pub mod network;
pub mod trace;

pub use artifacts::{ArtifactEntry, ArtifactStore, DuplicateArtifact};
pub use config::{
    CategoryConfig, CategoryMemberConfig, CheckConfig, ConfigError, NetworkCondition, PassConfig,
    RunConfig, DEFAULT_PASS,
};
pub use config_loader::ConfigLoader;
pub use ids::RunId;
pub use network::{NetworkRecord, ResourcePriority, ResourceType};
pub use trace::{TraceCapture, TraceEvent};
