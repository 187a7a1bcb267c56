//! Wire-protocol driver for a remote browser session.
//!
//! Connects to a running browser's DevTools WebSocket endpoint and provides
//! JSON-RPC-style command/response correlation with asynchronous event
//! fan-out over a single ordered channel.
//!
//! The crate is split into two layers:
//!
//! - **`transport`**: the raw frame channel -- a [`Transport`] trait with the
//!   production WebSocket implementation. Tests substitute a scripted
//!   transport without touching the session logic.
//! - **`session`**: [`Session`], which owns the I/O task, allocates command
//!   ids, matches responses to in-flight commands purely by id, enforces
//!   per-command timeouts, and dispatches events to named subscribers.
//!
//! Commands may be issued concurrently; the session never serializes them.
//! Delivery to the transport follows issuance order, while responses may
//! arrive out of order and are matched by id alone.

pub mod error;
pub mod session;
pub mod transport;

pub use error::ProtocolError;
pub use session::{EventHandler, Session};
pub use transport::{Transport, WsTransport};
