//! Domain-specific error types for the raylink protocol.
//!
//! All fallible operations return `Result<T, RelayError>`.
//! Nothing in the core is fatal: callers log the error and drop the
//! offending message or connection.

use thiserror::Error;

use crate::network::ConnectionId;

/// The canonical error type for the raylink protocol.
#[derive(Debug, Error)]
pub enum RelayError {
    // ── Framing Errors ───────────────────────────────────────────
    /// Received bytes that do not start with the `RLK0` magic sequence.
    #[error("invalid magic bytes: expected RLK0")]
    InvalidMagic,

    /// Frame size exceeded the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    // ── Message Errors ───────────────────────────────────────────
    /// A frame was intact but its contents did not match what the
    /// receiver expected (type tag, length, checksum or payload shape).
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// A payload could not be serialized.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    // ── Connection Errors ────────────────────────────────────────
    /// The peer behind a connection is gone.
    #[error("connection {0} lost")]
    ConnectionLost(ConnectionId),

    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    // ── Session Errors ───────────────────────────────────────────
    /// An operation was attempted by a session whose role forbids it.
    #[error("role violation: {0}")]
    RoleViolation(&'static str),

    /// Configuration could not be turned into a working session.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl RelayError {
    /// Shorthand for building a [`RelayError::MalformedMessage`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        RelayError::MalformedMessage(reason.into())
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for RelayError {
    fn from(s: String) -> Self {
        RelayError::Other(s)
    }
}

impl From<&str> for RelayError {
    fn from(s: &str) -> Self {
        RelayError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for RelayError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        RelayError::ChannelClosed
    }
}

impl From<bincode::Error> for RelayError {
    fn from(e: bincode::Error) -> Self {
        RelayError::Encoding(e.to_string())
    }
}
