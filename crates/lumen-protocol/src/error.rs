//! Error types for the lumen-protocol crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while driving a remote session.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The endpoint was unreachable or the handshake failed.
    #[error("failed to connect to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// No response bearing the command's id arrived in time. The pending
    /// entry is discarded; a late response is dropped silently.
    #[error("command '{method}' timed out after {duration:?}")]
    CommandTimeout { method: String, duration: Duration },

    /// The channel closed while the command was in flight, or the session
    /// was disconnected.
    #[error("connection closed with commands in flight")]
    ConnectionClosed,

    /// The remote session answered the command with an error payload.
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },

    /// An awaited event did not arrive in time.
    #[error("event '{event}' did not arrive within {duration:?}")]
    EventTimeout { event: String, duration: Duration },

    /// Local serialization or framing failure.
    #[error("protocol error: {detail}")]
    Malformed { detail: String },
}
