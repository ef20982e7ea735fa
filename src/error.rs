//! # Error Types
//!
//! Error handling for the reactor, the wire protocol and the login flow.
//!
//! This module defines all error variants that can occur during protocol operations,
//! from low-level I/O errors to malformed frames and credential store failures.
//!
//! ## Error Categories
//! - **I/O Errors**: Socket, terminal and file system failures
//! - **Framing Errors**: Malformed frames, oversized payloads
//! - **Store Errors**: Credential/whitelist file failures
//! - **Security Errors**: Hashing failures
//! - **Configuration Errors**: Invalid or unreadable configuration
//!
//! Transient conditions (`WouldBlock`, `Interrupted`) are absorbed by the reactor
//! and never surface as a `ProtocolError`.
//!
//! ## Example Usage
//! ```rust
//! use authwire::error::{ProtocolError, Result};
//! use tracing::error;
//!
//! fn parse_port(raw: &str) -> Result<u16> {
//!     raw.parse::<u16>()
//!         .map_err(|e| ProtocolError::ConfigError(format!("invalid port '{raw}': {e}")))
//! }
//!
//! if let Err(e) = parse_port("http") {
//!     error!(error = %e, "Startup failed");
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Framing errors
    pub const ERR_SHORT_LENGTH: &str = "Declared frame length is shorter than the header";
    pub const ERR_BOOL_PAYLOAD: &str = "Boolean payload must be exactly one byte of 0 or 1";
    pub const ERR_UNEXPECTED_PAYLOAD: &str = "Message kind carries no payload";
    pub const ERR_INVALID_UTF8: &str = "String payload is not valid UTF-8";

    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_LISTENER_WRITE: &str = "Listening sockets do not write";

    /// Session errors
    pub const ERR_NOT_LOGGED_IN: &str = "You are not logged in.";
    pub const ERR_UNKNOWN_MESSAGE: &str = "Unknown message!";

    /// Store errors
    pub const ERR_STORE_RENAME: &str = "Failed to move temporary store file into place";
}

/// ProtocolError is the primary error type for all operations in this crate
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed frame (opcode {opcode}): {reason}")]
    MalformedFrame { opcode: u8, reason: &'static str },

    #[error("Payload too large: {0} bytes (maximum {max})", max = crate::protocol::message::MAX_STRING_PAYLOAD)]
    OversizedPayload(usize),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Security error: {0}")]
    SecurityError(String),

    #[error("Terminal error: {0}")]
    TerminalError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unexpected message type")]
    UnexpectedMessage,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Connection timed out (no activity)")]
    ConnectionTimeout,
}

impl ProtocolError {
    /// Whether the error means the peer's byte stream can no longer be trusted
    pub fn is_desync(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedFrame { .. } | ProtocolError::OversizedPayload(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
