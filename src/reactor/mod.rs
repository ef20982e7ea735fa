//! # Reactor
//!
//! Single-threaded, non-blocking I/O multiplexing.
//!
//! ## Components
//! - **Connection**: Descriptor, buffers, strategy and application record
//! - **Selector**: The readiness loop, registry and callback plumbing
//! - **Signals**: Termination-signal masking around the wait primitive
//!
//! ## Concurrency
//! There is no parallel execution: the only suspension point is `ppoll`, and every
//! registered descriptor is non-blocking, so no callback can stall the loop except
//! through work it performs itself (e.g. credential file access).

pub mod connection;
pub mod selector;
pub mod signals;

pub use connection::{Connection, ReadEvent, Strategy};
pub use selector::{Command, Control, Handler, Reactor, StopHandle, Termination};
