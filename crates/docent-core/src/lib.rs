//! Docent core crate - shared types for the streaming assistant.
//!
//! Defines configuration, the error taxonomy, session identity, the wire
//! protocol frames, and the conversation/message data model. This crate is
//! a leaf: no I/O, no async runtime.

pub mod config;
pub mod conversation;
pub mod error;
pub mod protocol;
pub mod session;

pub use config::DocentConfig;
pub use conversation::{ConnectionState, Conversation, Message, Sender};
pub use error::{DocentError, Result};
pub use protocol::{ProtocolFrame, QueryFrame};
pub use session::SessionId;
