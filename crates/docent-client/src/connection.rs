//! Persistent connection lifecycle.
//!
//! One WebSocket per session, owned by a supervisor task:
//! `Connecting -> Open` on handshake, `Open -> Disconnected` on close or
//! error, `Disconnected -> Connecting` after a fixed delay. A generation
//! counter guards every transition so that a stale supervisor stops the
//! moment a newer connection (or an explicit shutdown) supersedes it.
//!
//! Inbound traffic is surfaced as typed [`ConnectionEvent`]s on an mpsc
//! channel and processed single-threaded by the consumer, which preserves
//! frame ordering without locks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use docent_core::conversation::ConnectionState;
use docent_core::protocol::{ProtocolFrame, QueryFrame};
use docent_core::session::SessionId;

use crate::error::ClientError;

/// Typed events surfaced by the connection supervisor.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The handshake succeeded; the connection is open.
    Opened,
    /// An inbound protocol frame arrived.
    FrameReceived(ProtocolFrame),
    /// An open connection closed (either side).
    Closed,
    /// The handshake failed; a retry is scheduled.
    HandshakeFailed,
}

struct Active {
    session: SessionId,
    outbound_tx: mpsc::Sender<QueryFrame>,
    task: JoinHandle<()>,
}

/// Owns the lifecycle of one persistent connection per session.
///
/// Cloning is cheap: all state lives behind one shared inner.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    server_url: String,
    reconnect_delay: Duration,
    state_tx: watch::Sender<ConnectionState>,
    event_tx: mpsc::Sender<ConnectionEvent>,
    active: Mutex<Option<Active>>,
    generation: AtomicU64,
}

impl ConnectionManager {
    /// Create a manager for the given server base URL (e.g.
    /// `ws://127.0.0.1:8000`). Returns the manager and the event stream.
    pub fn new(
        server_url: impl Into<String>,
        reconnect_delay: Duration,
    ) -> (Self, mpsc::Receiver<ConnectionEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let manager = Self {
            inner: Arc::new(Inner {
                server_url: server_url.into(),
                reconnect_delay,
                state_tx,
                event_tx,
                active: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        };
        (manager, event_rx)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Subscribe to state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Identity of the current connection, if any.
    pub fn session(&self) -> Option<SessionId> {
        self.inner
            .active
            .lock()
            .ok()
            .and_then(|a| a.as_ref().map(|active| active.session.clone()))
    }

    /// Open (or keep) the connection for the given identity.
    ///
    /// Idempotent: a second call with the same identity is a no-op. A call
    /// with a different identity closes the old connection first and
    /// cancels its pending reconnect.
    pub fn connect(&self, session: SessionId) -> Result<(), ClientError> {
        let mut active = self
            .inner
            .active
            .lock()
            .map_err(|e| ClientError::Connection(format!("connection lock poisoned: {}", e)))?;

        if let Some(current) = active.as_ref() {
            if current.session == session {
                return Ok(());
            }
            debug!(old = %current.session, new = %session, "Replacing connection");
            current.task.abort();
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (outbound_tx, outbound_rx) = mpsc::channel(16);
        let task = tokio::spawn(Inner::supervise(
            Arc::clone(&self.inner),
            session.clone(),
            generation,
            outbound_rx,
        ));
        *active = Some(Active {
            session,
            outbound_tx,
            task,
        });
        Ok(())
    }

    /// Send a query frame on the open connection.
    pub fn send(&self, frame: QueryFrame) -> Result<(), ClientError> {
        let active = self
            .inner
            .active
            .lock()
            .map_err(|e| ClientError::Connection(format!("connection lock poisoned: {}", e)))?;
        match active.as_ref() {
            Some(current) if self.state() == ConnectionState::Open => current
                .outbound_tx
                .try_send(frame)
                .map_err(|_| ClientError::NotConnected),
            _ => Err(ClientError::NotConnected),
        }
    }

    /// Tear the session down: close the connection and stop all reconnect
    /// attempts permanently.
    pub fn shutdown(&self) {
        // Invalidate every outstanding supervisor before aborting, so a
        // supervisor mid-await can never schedule another attempt.
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut active) = self.inner.active.lock() {
            if let Some(current) = active.take() {
                current.task.abort();
            }
        }
        self.inner.state_tx.send_replace(ConnectionState::Disconnected);
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn set_state(&self, state: ConnectionState) {
        // send_replace stores the value even with no subscribers.
        self.state_tx.send_replace(state);
    }

    async fn supervise(
        inner: Arc<Self>,
        session: SessionId,
        generation: u64,
        mut outbound_rx: mpsc::Receiver<QueryFrame>,
    ) {
        loop {
            if !inner.is_current(generation) {
                return;
            }
            inner.set_state(ConnectionState::Connecting);

            let url = format!(
                "{}/ws/{}",
                inner.server_url.trim_end_matches('/'),
                session
            );
            match connect_async(url.as_str()).await {
                Ok((stream, _response)) => {
                    if !inner.is_current(generation) {
                        return;
                    }
                    inner.set_state(ConnectionState::Open);
                    if inner.event_tx.send(ConnectionEvent::Opened).await.is_err() {
                        return;
                    }
                    inner
                        .run_connection(stream, &mut outbound_rx, generation)
                        .await;
                    if !inner.is_current(generation) {
                        return;
                    }
                    inner.set_state(ConnectionState::Disconnected);
                    if inner.event_tx.send(ConnectionEvent::Closed).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!(error = %e, url = %url, "WebSocket handshake failed");
                    if !inner.is_current(generation) {
                        return;
                    }
                    inner.set_state(ConnectionState::Disconnected);
                    if inner
                        .event_tx
                        .send(ConnectionEvent::HandshakeFailed)
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }

            // Exactly one reconnect timer per close; a newer connection or
            // an explicit shutdown stops the retry at the loop head.
            tokio::time::sleep(inner.reconnect_delay).await;
        }
    }

    async fn run_connection(
        &self,
        stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
        outbound_rx: &mut mpsc::Receiver<QueryFrame>,
        generation: u64,
    ) {
        let (mut sink, mut source) = stream.split();

        loop {
            if !self.is_current(generation) {
                return;
            }
            tokio::select! {
                inbound = source.next() => match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<ProtocolFrame>(&text) {
                            Ok(frame) => {
                                if self
                                    .event_tx
                                    .send(ConnectionEvent::FrameReceived(frame))
                                    .await
                                    .is_err()
                                {
                                    return;
                                }
                            }
                            // Malformed frames are dropped; the connection
                            // is not closed for this alone.
                            Err(e) => warn!(error = %e, "Dropping malformed frame"),
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => return,
                    Some(Ok(_)) => {} // ping/pong/binary: nothing to do
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket read error");
                        return;
                    }
                },
                outbound = outbound_rx.recv() => match outbound {
                    Some(frame) => {
                        let text = match serde_json::to_string(&frame) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!(error = %e, "Failed to encode query frame");
                                continue;
                            }
                        };
                        if sink.send(WsMessage::Text(text)).await.is_err() {
                            return;
                        }
                    }
                    None => return,
                },
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            if let Some(current) = active.take() {
                current.task.abort();
            }
        }
    }
}
