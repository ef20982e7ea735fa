//! # Services
//!
//! Ready-to-run endpoints built on the reactor and the protocol layer.
//!
//! ## Components
//! - **Server**: Login server handler, listener setup and the serve loop
//! - **Client**: Interactive terminal client on the same reactor
//! - **Remote**: Async scripted client over `tokio_util` framing

pub mod client;
pub mod remote;
pub mod server;

pub use client::InteractiveClient;
pub use remote::RemoteClient;
pub use server::LoginServer;
