//! Docent storage crate - SQLite chat-history persistence.
//!
//! Provides a WAL-mode SQLite database with migrations and the
//! chat-history repository. History writes are fire-and-forget from the
//! protocol's perspective: a failed append is logged by the caller and
//! never surfaced to the client.

pub mod db;
pub mod history;
pub mod migrations;

pub use db::Database;
pub use history::{ExchangeRecord, HistoryRepository, SqliteHistory};
