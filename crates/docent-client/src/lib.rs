//! Docent client crate - frame consumption and connection lifecycle.
//!
//! Reconstructs streamed responses on the client side: the connection
//! manager keeps one WebSocket per session alive with bounded reconnects,
//! the response assembler turns protocol frames into exactly-once speakable
//! units via the sentence chunker, the speak queue serializes unit
//! consumption, and the fallback transport covers the no-connection path.

pub mod assembler;
pub mod chunker;
pub mod connection;
pub mod error;
pub mod fallback;
pub mod speak;

pub use assembler::ResponseAssembler;
pub use chunker::{split_completed, ChunkOutcome};
pub use connection::{ConnectionEvent, ConnectionManager};
pub use error::ClientError;
pub use fallback::{FallbackAnswer, FallbackTransport};
pub use speak::{SpeakQueue, UnitSink};
