//! The collector lifecycle contract.
//!
//! A collector captures one raw signal during a pass and owns one artifact
//! name. Hooks run sequentially in declared order -- a slow collector delays
//! the next one on purpose, since later collectors may rely on page-level
//! hooks established by earlier ones.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use lumen_protocol::{ProtocolError, Session};
use lumen_types::{ArtifactStore, PassConfig, TraceCapture};

/// Why a collector hook failed.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// A driver command issued by the collector failed.
    #[error(transparent)]
    Driver(#[from] ProtocolError),

    /// The collector could not produce its artifact.
    #[error("{detail}")]
    Failed { detail: String },
}

impl CollectorError {
    pub fn failed(detail: impl Into<String>) -> Self {
        CollectorError::Failed {
            detail: detail.into(),
        }
    }
}

/// What a collector sees during a pass.
pub struct PassContext<'a> {
    pub session: &'a Session,
    /// The run's target URL.
    pub url: &'a str,
    pub pass: &'a PassConfig,
}

/// The accumulated raw capture handed to `after_pass`: the pass's network
/// log and trace buffer, plus every raw artifact written by earlier passes
/// and collectors.
pub struct PassCapture<'a> {
    pub network: &'a [lumen_types::NetworkRecord],
    pub trace: &'a TraceCapture,
    pub prior: &'a ArtifactStore,
}

/// A unit that captures one raw signal during a pass.
///
/// `before_pass` and `pass` default to no-ops; most collectors only need
/// `after_pass`.
#[async_trait]
pub trait Collector: Send {
    /// The artifact name this collector writes. Must be unique across all
    /// collectors in a run.
    fn name(&self) -> &str;

    /// Runs before navigation, in declared order. Establish page-level
    /// hooks here.
    async fn before_pass(&mut self, _ctx: &PassContext<'_>) -> Result<(), CollectorError> {
        Ok(())
    }

    /// Runs after navigation while the page settles, in declared order.
    async fn pass(&mut self, _ctx: &PassContext<'_>) -> Result<(), CollectorError> {
        Ok(())
    }

    /// Produces the artifact value from the accumulated capture. A failure
    /// here is non-fatal: the run records an unavailable-artifact marker
    /// and continues.
    async fn after_pass(
        &mut self,
        ctx: &PassContext<'_>,
        capture: &PassCapture<'_>,
    ) -> Result<Value, CollectorError>;
}
