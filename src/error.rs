//! Error taxonomy for the node subsystem.
//!
//! One variant per failure kind named in the node's error-handling design:
//! wire/transport failures terminate the affected operation and are never
//! allowed to take the node down; configuration and state misuse are
//! programmer errors and are raised immediately to the caller.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced either to an `execute()` caller or to an in-flight
/// `Operation` via `set_exception`.
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    /// TCP connect timed out, was refused, or was interrupted.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The transport reported a non-success write.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// The connection closed while an operation was in flight. Carries the
    /// transport's close cause if one was reported, or the generic message
    /// below if it gave none.
    #[error("connection closed unexpectedly: {0}")]
    UnexpectedClose(String),

    /// The server sent an error reply at the protocol level.
    #[error("protocol error ({code}): {message}")]
    ProtocolError { code: u32, message: String },

    /// The I/O layer reported a generic transport exception.
    #[error("transport exception: {0}")]
    TransportException(String),

    /// An operation was attempted while the node was in a state that
    /// disallows it (e.g. `execute` before `start`, double `shutdown`).
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Invalid configuration, e.g. `min_connections > max_connections`.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),
}

impl NodeError {
    pub fn unexpected_close_generic() -> Self {
        NodeError::UnexpectedClose("connection closed unexpectedly".to_string())
    }

    /// Wrap an I/O error as the connection-failed kind, preserving its
    /// `Display` text without requiring `io::Error: Clone`.
    pub fn connection_failed(err: impl fmt::Display) -> Self {
        NodeError::ConnectionFailed(err.to_string())
    }

    pub fn write_failed(err: impl fmt::Display) -> Self {
        NodeError::WriteFailed(err.to_string())
    }

    pub fn transport_exception(err: impl fmt::Display) -> Self {
        NodeError::TransportException(err.to_string())
    }
}

/// Shared, cheaply-cloned handle to a `NodeError`, used where the same
/// cause must be attached to both a recent-close log entry and the
/// terminated operation.
pub type SharedNodeError = Arc<NodeError>;

pub type NodeResult<T> = std::result::Result<T, NodeError>;
