//! End-to-end tests: the full client stack against a real server.
//!
//! Exercises the streaming path (connection manager -> assembler -> speak
//! queue) and the fallback path against the same server, asserting the
//! exactly-once delivery invariant and fallback equivalence.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::timeout;

use docent_client::{
    ConnectionEvent, ConnectionManager, FallbackTransport, ResponseAssembler, SpeakQueue,
};
use docent_core::config::DocentConfig;
use docent_core::conversation::ConnectionState;
use docent_core::protocol::QueryFrame;
use docent_core::session::SessionId;
use docent_retrieval::{ChunkIndex, DynRetriever, HashEmbedder, IndexRetriever};
use docent_server::{create_router, AppState, MockModel, StreamingOrchestrator};
use docent_storage::{Database, HistoryRepository, SqliteHistory};

const MOCK_REPLY: &str = "Hello world. Bye.";
const WAIT: Duration = Duration::from_secs(5);

async fn spawn_server() -> std::net::SocketAddr {
    let mut config = DocentConfig::default();
    config.llm.partial_delay_ms = 0;

    let index = Arc::new(ChunkIndex::new());
    let retriever = IndexRetriever::new(
        Arc::clone(&index),
        HashEmbedder::new(),
        config.retrieval.top_k,
    );
    retriever
        .ingest("refunds are issued within 14 days", "Page 3 - policy.pdf")
        .await
        .unwrap();

    let history: Arc<dyn HistoryRepository> =
        Arc::new(SqliteHistory::new(Arc::new(Database::in_memory().unwrap())));

    let orchestrator = StreamingOrchestrator::new(
        Arc::new(retriever) as Arc<dyn DynRetriever>,
        Arc::new(MockModel::with_reply(MOCK_REPLY)),
        history,
        config.chat.clone(),
        config.llm.clone(),
    );

    let app = create_router(AppState::new(config, orchestrator));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Drive one streaming exchange to completion, returning the forwarded
/// units.
async fn run_streaming_exchange(
    assembler: &mut ResponseAssembler,
    events: &mut tokio::sync::mpsc::Receiver<ConnectionEvent>,
    manager: &ConnectionManager,
    query: &str,
) -> Vec<String> {
    assembler.begin_exchange(query).unwrap();
    manager.send(QueryFrame::new(query)).unwrap();

    let mut units = Vec::new();
    while !assembler.input_enabled() {
        let event = timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        if let ConnectionEvent::FrameReceived(frame) = event {
            units.extend(assembler.apply_frame(frame));
        }
    }
    units
}

#[tokio::test]
async fn test_streaming_path_exactly_once() {
    let addr = spawn_server().await;
    let session = SessionId::generate();

    let (manager, mut events) =
        ConnectionManager::new(format!("ws://{}", addr), Duration::from_millis(50));
    manager.connect(session.clone()).unwrap();

    // Wait for the connection to open.
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap().unwrap(),
        ConnectionEvent::Opened
    );
    assert_eq!(manager.state(), ConnectionState::Open);

    let mut assembler = ResponseAssembler::new(session);
    let units =
        run_streaming_exchange(&mut assembler, &mut events, &manager, "refund time?").await;

    // Exactly-once: the forwarded units reconstruct the terminal content.
    assert_eq!(units.concat(), MOCK_REPLY);

    let message = assembler.conversation().last().unwrap();
    assert_eq!(message.text, MOCK_REPLY);
    assert!(!message.streaming);
    assert!(!message.error);
    assert!(message.sources.as_ref().is_some_and(|s| !s.is_empty()));

    manager.shutdown();
}

#[tokio::test]
async fn test_multiple_exchanges_on_one_connection() {
    let addr = spawn_server().await;
    let session = SessionId::generate();

    let (manager, mut events) =
        ConnectionManager::new(format!("ws://{}", addr), Duration::from_millis(50));
    manager.connect(session.clone()).unwrap();
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap().unwrap(),
        ConnectionEvent::Opened
    );

    let mut assembler = ResponseAssembler::new(session);
    for i in 0..3 {
        let query = format!("question {}", i);
        let units =
            run_streaming_exchange(&mut assembler, &mut events, &manager, &query).await;
        assert_eq!(units.concat(), MOCK_REPLY);
    }
    // Two messages per exchange.
    assert_eq!(assembler.conversation().messages.len(), 6);

    manager.shutdown();
}

#[tokio::test]
async fn test_speak_queue_consumes_units_in_order() {
    let addr = spawn_server().await;
    let session = SessionId::generate();

    let (manager, mut events) =
        ConnectionManager::new(format!("ws://{}", addr), Duration::from_millis(50));
    manager.connect(session.clone()).unwrap();
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap().unwrap(),
        ConnectionEvent::Opened
    );

    let spoken = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let spoken = Arc::clone(&spoken);
        move |unit: &str| spoken.lock().unwrap().push(unit.to_string())
    };
    let queue = SpeakQueue::spawn(sink);

    let mut assembler = ResponseAssembler::new(session);
    let units =
        run_streaming_exchange(&mut assembler, &mut events, &manager, "speak this").await;
    for unit in units {
        queue.enqueue(unit);
    }
    queue.close().await;

    assert_eq!(spoken.lock().unwrap().concat(), MOCK_REPLY);
    manager.shutdown();
}

#[tokio::test]
async fn test_fallback_equivalence_with_streaming() {
    let addr = spawn_server().await;

    // Streaming path.
    let streaming_session = SessionId::generate();
    let (manager, mut events) =
        ConnectionManager::new(format!("ws://{}", addr), Duration::from_millis(50));
    manager.connect(streaming_session.clone()).unwrap();
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap().unwrap(),
        ConnectionEvent::Opened
    );
    let mut streamed = ResponseAssembler::new(streaming_session);
    let streamed_units =
        run_streaming_exchange(&mut streamed, &mut events, &manager, "same query").await;
    manager.shutdown();

    // Fallback path: no connection, single HTTP attempt, synthetic Complete.
    let fallback_session = SessionId::generate();
    let transport = FallbackTransport::new(format!("http://{}", addr));
    let answer = transport
        .send(&fallback_session, "same query")
        .await
        .unwrap();
    let mut fell_back = ResponseAssembler::new(fallback_session);
    fell_back.begin_exchange("same query").unwrap();
    let fallback_units = fell_back.apply_fallback(answer.response, answer.sources);

    // Same reconstruction, same final conversation state (modulo the
    // absence of intermediate partial renders).
    assert_eq!(streamed_units.concat(), fallback_units.concat());

    let a = streamed.conversation().last().unwrap();
    let b = fell_back.conversation().last().unwrap();
    assert_eq!(a.text, b.text);
    assert_eq!(a.sources, b.sources);
    assert_eq!(a.streaming, b.streaming);
    assert_eq!(a.error, b.error);
}

#[tokio::test]
async fn test_fallback_used_when_disconnected() {
    let addr = spawn_server().await;
    let session = SessionId::generate();

    // No connect() call: state is Disconnected, so the client takes the
    // fallback path.
    let (manager, _events) =
        ConnectionManager::new(format!("ws://{}", addr), Duration::from_millis(50));
    assert_ne!(manager.state(), ConnectionState::Open);

    let transport = FallbackTransport::new(format!("http://{}", addr));
    let answer = transport.send(&session, "no socket today").await.unwrap();
    assert_eq!(answer.response, MOCK_REPLY);
}
