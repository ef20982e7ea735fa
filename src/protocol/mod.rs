//! # Protocol Layer
//!
//! Wire messages and the state machines that give them meaning.
//!
//! ## Components
//! - **Message**: Closed set of message kinds keyed by opcode
//! - **Framer**: Length-prefixed peek/get/encode over a [`StreamBuffer`](crate::core::stream_buffer::StreamBuffer)
//! - **Session**: Server-side login state and request handling
//! - **Prompt**: Client-side login and password-change prompts
//!
//! ## Wire Format
//! ```text
//! [Length(2, BE, header-inclusive)] [Opcode(1)] [Payload(Length - 3)]
//! ```
//!
//! ## Security
//! - Three failed password attempts end the connection
//! - Every request other than login requires an authenticated session
//! - Frames that cannot be decoded end the connection

pub mod framer;
pub mod message;
pub mod prompt;
pub mod session;


pub use message::{Message, Opcode};
pub use prompt::{ClientAction, Prompt, PromptState};
pub use session::{AuthState, Authenticator, Reply, Session};
