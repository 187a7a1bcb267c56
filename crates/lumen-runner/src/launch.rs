//! The process-management boundary.
//!
//! Browser discovery and spawning belong to the embedding tool; the runner
//! consumes only this seam: launch yields an endpoint to connect to, and
//! terminate tears the process down. Errors are opaque at this boundary.

use std::path::PathBuf;

use async_trait::async_trait;

/// Options passed through to the launching collaborator.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Explicit browser binary; `None` lets the launcher discover one.
    pub binary: Option<PathBuf>,
    /// Requested debugging port; 0 asks for an ephemeral one.
    pub port: u16,
    pub headless: bool,
    pub extra_args: Vec<String>,
}

/// A launched browser: where to connect, and the handle to terminate it.
pub struct Launched<H> {
    pub endpoint: String,
    pub handle: H,
}

/// The launch boundary contract.
#[async_trait]
pub trait Launcher {
    type Handle: Send;

    async fn launch(&self, options: &LaunchOptions) -> anyhow::Result<Launched<Self::Handle>>;

    async fn terminate(&self, handle: Self::Handle) -> anyhow::Result<()>;
}
