//! Chat-history repository.
//!
//! One row per finished exchange. The orchestrator appends after the
//! terminal frame is constructed; append failures are logged by the caller
//! and never block frame delivery.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;

use docent_core::error::DocentError;
use docent_core::session::SessionId;

use crate::db::Database;

/// One finished query/answer exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRecord {
    pub session_id: SessionId,
    pub query: String,
    pub response: String,
    pub sources: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Persistence interface for finished exchanges.
pub trait HistoryRepository: Send + Sync {
    /// Append a finished exchange.
    fn append(&self, record: &ExchangeRecord) -> Result<(), DocentError>;

    /// All exchanges for a session, oldest first.
    fn for_session(&self, session_id: &SessionId) -> Result<Vec<ExchangeRecord>, DocentError>;

    /// Delete all exchanges for a session. Returns the number of rows removed.
    fn delete_session(&self, session_id: &SessionId) -> Result<usize, DocentError>;
}

/// SQLite-backed history repository.
pub struct SqliteHistory {
    db: Arc<Database>,
}

impl SqliteHistory {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl HistoryRepository for SqliteHistory {
    fn append(&self, record: &ExchangeRecord) -> Result<(), DocentError> {
        let sources = serde_json::to_string(&record.sources)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_history (session_id, query, response, sources, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    record.session_id.as_str(),
                    record.query,
                    record.response,
                    sources,
                    record.timestamp.timestamp(),
                ],
            )
            .map_err(|e| DocentError::Storage(format!("Failed to append exchange: {}", e)))?;
            Ok(())
        })
    }

    fn for_session(&self, session_id: &SessionId) -> Result<Vec<ExchangeRecord>, DocentError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT session_id, query, response, sources, timestamp
                     FROM chat_history
                     WHERE session_id = ?1
                     ORDER BY timestamp ASC, id ASC",
                )
                .map_err(|e| DocentError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![session_id.as_str()], |row| {
                    let session: String = row.get(0)?;
                    let query: String = row.get(1)?;
                    let response: String = row.get(2)?;
                    let sources: String = row.get(3)?;
                    let timestamp: i64 = row.get(4)?;
                    Ok((session, query, response, sources, timestamp))
                })
                .map_err(|e| DocentError::Storage(e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                let (session, query, response, sources, timestamp) =
                    row.map_err(|e| DocentError::Storage(e.to_string()))?;
                records.push(ExchangeRecord {
                    session_id: SessionId::new(session),
                    query,
                    response,
                    sources: serde_json::from_str(&sources).unwrap_or_default(),
                    timestamp: Utc
                        .timestamp_opt(timestamp, 0)
                        .single()
                        .unwrap_or_else(Utc::now),
                });
            }
            Ok(records)
        })
    }

    fn delete_session(&self, session_id: &SessionId) -> Result<usize, DocentError> {
        self.db.with_conn(|conn| {
            let removed = conn
                .execute(
                    "DELETE FROM chat_history WHERE session_id = ?1",
                    rusqlite::params![session_id.as_str()],
                )
                .map_err(|e| DocentError::Storage(format!("Failed to delete session: {}", e)))?;
            Ok(removed)
        })
    }
}

impl SqliteHistory {
    /// Most recent exchange for a session, if any.
    pub fn latest(&self, session_id: &SessionId) -> Result<Option<ExchangeRecord>, DocentError> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT session_id, query, response, sources, timestamp
                     FROM chat_history
                     WHERE session_id = ?1
                     ORDER BY timestamp DESC, id DESC
                     LIMIT 1",
                    rusqlite::params![session_id.as_str()],
                    |row| {
                        let session: String = row.get(0)?;
                        let query: String = row.get(1)?;
                        let response: String = row.get(2)?;
                        let sources: String = row.get(3)?;
                        let timestamp: i64 = row.get(4)?;
                        Ok((session, query, response, sources, timestamp))
                    },
                )
                .optional()
                .map_err(|e| DocentError::Storage(e.to_string()))?;

            Ok(row.map(|(session, query, response, sources, timestamp)| ExchangeRecord {
                session_id: SessionId::new(session),
                query,
                response,
                sources: serde_json::from_str(&sources).unwrap_or_default(),
                timestamp: Utc
                    .timestamp_opt(timestamp, 0)
                    .single()
                    .unwrap_or_else(Utc::now),
            }))
        })
    }
}
