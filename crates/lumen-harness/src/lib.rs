//! Test doubles for the lumen pipeline.
//!
//! Provides lightweight, thread-safe stand-ins for the pieces that
//! otherwise need a live browser:
//!
//! - [`MockBrowser`] / the scripted transport: records sent commands,
//!   answers them from configurable responses, and injects events, so
//!   session and scheduler behavior can be exercised end to end.
//! - [`StubCollector`]: records lifecycle hook order and returns a canned
//!   artifact.
//! - `fixtures`: ready-made network records, traces, and event scripts.
//!
//! All mocks use `Arc<Mutex<_>>` for interior mutability so they can be
//! shared across async tasks.

pub mod collectors;
pub mod fixtures;
pub mod mocks;

pub use collectors::StubCollector;
pub use mocks::{MockBrowser, MockBrowserBuilder, MockTransport};
