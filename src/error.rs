//! Error types for ioservice
//!
//! Provides a unified error type for all operations.

use std::io;

use thiserror::Error;

/// Result type alias using ServiceError
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Unified error type for ioservice operations
#[derive(Debug, Error)]
pub enum ServiceError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // -------------------------------------------------------------------------
    // Wire Errors
    // -------------------------------------------------------------------------
    /// The bytes on hand cannot be turned into a complete frame.
    /// Fatal to the connection: the codec has no resynchronization marker.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// A well-formed reply that does not answer the command that was sent.
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Connection error: {0}")]
    Connection(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    /// True when the error means the peer is gone or stopped answering
    pub fn is_disconnect(&self) -> bool {
        match self {
            ServiceError::Io(e) => is_disconnect_kind(e.kind()),
            ServiceError::Connection(_) => true,
            _ => false,
        }
    }
}

/// I/O error kinds that mean the other side closed, reset, or timed out.
///
/// Read timeouts surface as `WouldBlock` on Unix and `TimedOut` on Windows.
pub fn is_disconnect_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

/// I/O error kinds a read timeout surfaces as
pub fn is_timeout_kind(kind: io::ErrorKind) -> bool {
    matches!(kind, io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
