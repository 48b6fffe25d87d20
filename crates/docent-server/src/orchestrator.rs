//! Streaming orchestrator: session registry and frame emission.
//!
//! One orchestrator serves every session. Per session it guarantees
//! at-most-one in-flight generation (reject-busy policy), runs the
//! retrieval + generation pipeline, and emits the protocol frame sequence:
//! zero or more cumulative `Partial` frames followed by exactly one
//! terminal frame. The finished exchange is appended to persistent history
//! only after the terminal frame is constructed, and a persistence failure
//! never blocks frame delivery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use docent_core::config::{ChatConfig, LlmConfig};
use docent_core::protocol::ProtocolFrame;
use docent_core::session::SessionId;
use docent_retrieval::DynRetriever;
use docent_storage::{ExchangeRecord, HistoryRepository};

use crate::llm::DynLanguageModel;
use crate::prompt::{build_prompt, Turn};

/// Human-readable message carried by the `Error` frame when retrieval or
/// generation fails. The underlying error goes to the log, not the client.
pub const GENERATION_FAILURE_MESSAGE: &str =
    "I ran into a problem while answering. Please try again in a moment.";

/// One complete answer with its sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatAnswer {
    pub content: String,
    pub sources: Vec<String>,
}

/// Errors from the chat pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("query cannot be empty")]
    EmptyQuery,
    #[error("query exceeds maximum length of {0} characters")]
    QueryTooLong(usize),
    #[error("a response is already being generated for this session")]
    Busy,
    #[error("retrieval failed: {0}")]
    Retrieval(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("session error: {0}")]
    Session(String),
}

#[derive(Default)]
struct SessionEntry {
    turns: Vec<Turn>,
    /// Cancellation flag of the running generation, if one is in flight.
    in_flight: Option<Arc<AtomicBool>>,
}

/// Server-side coordinator for all sessions.
///
/// Cloning is cheap: all state lives behind one shared inner. The session
/// registry is the single owner of per-session state, looked up by
/// identity.
#[derive(Clone)]
pub struct StreamingOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    retriever: Arc<dyn DynRetriever>,
    model: Arc<dyn DynLanguageModel>,
    history: Arc<dyn HistoryRepository>,
    chat: ChatConfig,
    llm: LlmConfig,
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl StreamingOrchestrator {
    pub fn new(
        retriever: Arc<dyn DynRetriever>,
        model: Arc<dyn DynLanguageModel>,
        history: Arc<dyn HistoryRepository>,
        chat: ChatConfig,
        llm: LlmConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                retriever,
                model,
                history,
                chat,
                llm,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Start a streaming exchange.
    ///
    /// Validation and the busy check happen before any frame exists, so a
    /// rejected query produces no frames at all. On success the returned
    /// receiver yields the exchange's frame sequence in order, terminal
    /// frame last.
    pub fn stream_query(
        &self,
        session: &SessionId,
        query: &str,
    ) -> Result<mpsc::Receiver<ProtocolFrame>, ChatError> {
        self.inner.validate(query)?;
        let (cancelled, recent) = self.inner.begin(session)?;

        let (tx, rx) = mpsc::channel(64);
        let inner = Arc::clone(&self.inner);
        let session = session.clone();
        let query = query.to_string();
        tokio::spawn(async move {
            inner
                .emit_frames(&session, &query, &recent, &cancelled, &tx)
                .await;
            inner.finish(&session, &cancelled);
        });
        Ok(rx)
    }

    /// Run one exchange without partial frames (the fallback path).
    pub async fn respond(
        &self,
        session: &SessionId,
        query: &str,
    ) -> Result<ChatAnswer, ChatError> {
        self.inner.validate(query)?;
        let (cancelled, recent) = self.inner.begin(session)?;

        let result = self.inner.run_pipeline(&recent, query).await;
        if let Ok(answer) = &result {
            if !cancelled.load(Ordering::SeqCst) {
                self.inner.record_exchange(session, query, answer);
            }
        }
        self.inner.finish(session, &cancelled);
        result
    }

    /// Tear a session down: drop its conversation context and request
    /// cancellation of any in-flight generation. Late frames for the old
    /// session stop at the next emission point.
    pub fn end_session(&self, session: &SessionId) -> bool {
        self.inner.end_session(session)
    }

    /// Number of sessions with server-side state.
    pub fn session_count(&self) -> usize {
        self.inner.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl Inner {
    fn validate(&self, query: &str) -> Result<(), ChatError> {
        if query.is_empty() {
            return Err(ChatError::EmptyQuery);
        }
        if query.len() > self.chat.max_query_length {
            return Err(ChatError::QueryTooLong(self.chat.max_query_length));
        }
        Ok(())
    }

    /// Mark the session in flight and snapshot its recent turns.
    fn begin(&self, session: &SessionId) -> Result<(Arc<AtomicBool>, Vec<Turn>), ChatError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| ChatError::Session(format!("session lock poisoned: {}", e)))?;
        let entry = sessions.entry(session.clone()).or_default();
        if entry.in_flight.is_some() {
            return Err(ChatError::Busy);
        }
        let cancelled = Arc::new(AtomicBool::new(false));
        entry.in_flight = Some(Arc::clone(&cancelled));

        let skip = entry.turns.len().saturating_sub(self.chat.prompt_turns);
        let recent = entry.turns[skip..].to_vec();
        Ok((cancelled, recent))
    }

    /// Clear the in-flight marker, but only for our own generation: a
    /// teardown plus a fresh query may have installed a newer flag.
    fn finish(&self, session: &SessionId, flag: &Arc<AtomicBool>) {
        if let Ok(mut sessions) = self.sessions.lock() {
            if let Some(entry) = sessions.get_mut(session) {
                let ours = entry
                    .in_flight
                    .as_ref()
                    .is_some_and(|current| Arc::ptr_eq(current, flag));
                if ours {
                    entry.in_flight = None;
                }
            }
        }
    }

    fn end_session(&self, session: &SessionId) -> bool {
        match self.sessions.lock() {
            Ok(mut sessions) => match sessions.remove(session) {
                Some(entry) => {
                    if let Some(flag) = entry.in_flight {
                        flag.store(true, Ordering::SeqCst);
                        info!(session = %session, "Cancelled in-flight generation");
                    }
                    true
                }
                None => false,
            },
            Err(e) => {
                error!("Session lock poisoned: {}", e);
                false
            }
        }
    }

    async fn run_pipeline(&self, recent: &[Turn], query: &str) -> Result<ChatAnswer, ChatError> {
        let chunks = self
            .retriever
            .search_boxed(query)
            .await
            .map_err(|e| ChatError::Retrieval(e.to_string()))?;
        let sources: Vec<String> = chunks.iter().map(|c| c.source.clone()).collect();

        let prompt = build_prompt(recent, &chunks, query);
        let content = self
            .model
            .complete_boxed(&prompt)
            .await
            .map_err(|e| ChatError::Generation(e.to_string()))?;

        Ok(ChatAnswer { content, sources })
    }

    /// Emit the frame sequence for one exchange.
    async fn emit_frames(
        &self,
        session: &SessionId,
        query: &str,
        recent: &[Turn],
        cancelled: &Arc<AtomicBool>,
        tx: &mpsc::Sender<ProtocolFrame>,
    ) {
        let answer = match self.run_pipeline(recent, query).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(error = %e, session = %session, "Exchange failed");
                if !cancelled.load(Ordering::SeqCst) {
                    let _ = tx
                        .send(ProtocolFrame::Error {
                            content: GENERATION_FAILURE_MESSAGE.to_string(),
                        })
                        .await;
                }
                return;
            }
        };

        let delay = Duration::from_millis(self.llm.partial_delay_ms);
        for offset in partial_offsets(&answer.content, self.llm.partial_words) {
            if cancelled.load(Ordering::SeqCst) {
                debug!(session = %session, "Exchange cancelled mid-stream");
                return;
            }
            let frame = ProtocolFrame::Partial {
                full_response: answer.content[..offset].to_string(),
            };
            if tx.send(frame).await.is_err() {
                debug!(session = %session, "Client went away mid-stream");
                return;
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        if cancelled.load(Ordering::SeqCst) {
            debug!(session = %session, "Exchange cancelled before terminal frame");
            return;
        }

        let terminal = ProtocolFrame::Complete {
            content: answer.content.clone(),
            sources: answer.sources.clone(),
        };
        if tx.send(terminal).await.is_err() {
            debug!(session = %session, "Client went away before the terminal frame");
        }

        // The terminal frame exists; history is best-effort from here on.
        self.record_exchange(session, query, &answer);
    }

    fn record_exchange(&self, session: &SessionId, query: &str, answer: &ChatAnswer) {
        let record = ExchangeRecord {
            session_id: session.clone(),
            query: query.to_string(),
            response: answer.content.clone(),
            sources: answer.sources.clone(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.history.append(&record) {
            warn!(error = %e, session = %session, "Failed to persist exchange");
        }

        if let Ok(mut sessions) = self.sessions.lock() {
            if let Some(entry) = sessions.get_mut(session) {
                entry.turns.push(Turn {
                    query: query.to_string(),
                    answer: answer.content.clone(),
                });
                if entry.turns.len() > self.chat.history_turns {
                    let excess = entry.turns.len() - self.chat.history_turns;
                    entry.turns.drain(..excess);
                }
            }
        }
    }
}

/// Byte offsets where cumulative partial frames end: the start of every
/// `words_per`-th word. Every offset is strictly inside the text, so each
/// partial is a proper prefix of the final content.
fn partial_offsets(text: &str, words_per: usize) -> Vec<usize> {
    let step = words_per.max(1);
    let mut offsets = Vec::new();
    let mut words_seen = 0usize;
    let mut prev_was_ws = true;
    for (index, ch) in text.char_indices() {
        let is_ws = ch.is_whitespace();
        if !is_ws && prev_was_ws && index > 0 {
            words_seen += 1;
            if words_seen % step == 0 {
                offsets.push(index);
            }
        }
        prev_was_ws = is_ws;
    }
    offsets
}
