//! # authwire
//!
//! Authenticated TCP message service: a single-threaded readiness reactor,
//! a length-prefixed binary protocol and a per-connection login state machine.
//!
//! ## Layers
//! - [`core`]: Segments, stream buffers and the async codec
//! - [`protocol`]: Messages, framing, server sessions and client prompts
//! - [`reactor`]: Connections, strategies and the `ppoll` loop
//! - [`store`]: Flat-file credential and whitelist tables
//! - [`service`]: Server, interactive client and async remote client
//! - [`utils`]: Password hashing, terminal echo, logging setup
//!
//! ## Example
//! ```rust,no_run
//! use authwire::config::AppConfig;
//! use authwire::service::server;
//!
//! let config = AppConfig::from_env()?;
//! let termination = server::serve(&config)?;
//! println!("server stopped: {termination:?}");
//! # Ok::<(), authwire::error::ProtocolError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod reactor;
pub mod service;
pub mod store;
pub mod utils;

pub use error::{ProtocolError, Result};
pub use protocol::message::Message;
