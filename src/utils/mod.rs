//! # Utility Modules
//!
//! Collaborators the login flow and the binaries lean on.
//!
//! ## Components
//! - **Security**: Argon2i password hashing, salt generation, base64 encoding
//! - **Terminal**: Local echo control for password prompts
//! - **Logging**: Structured logging configuration
//!
//! ## Security
//! - Cryptographically secure RNG for salts
//! - Memory zeroing for raw hash and salt bytes (zeroize crate)

pub mod logging;
pub mod security;
pub mod terminal;

pub use security::{HashParams, Security};
