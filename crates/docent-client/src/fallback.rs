//! Non-streaming request path.
//!
//! Used only when no persistent connection is available. One attempt per
//! call; retry policy, if any, belongs to the caller. The result is
//! treated as a synthetic immediate `Complete` by the assembler.

use serde::{Deserialize, Serialize};

use docent_core::session::SessionId;

use crate::error::ClientError;

#[derive(Debug, Serialize)]
struct FallbackRequest<'a> {
    query: &'a str,
    session_id: &'a str,
    stream: bool,
}

/// One complete answer from the non-streaming endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FallbackAnswer {
    pub response: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Single-attempt HTTP transport to `POST /chat`.
pub struct FallbackTransport {
    client: reqwest::Client,
    base_url: String,
}

impl FallbackTransport {
    /// Create a transport for the given server base URL (e.g.
    /// `http://127.0.0.1:8000`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Send one query and return the complete answer, or fail after this
    /// single attempt.
    pub async fn send(
        &self,
        session: &SessionId,
        query: &str,
    ) -> Result<FallbackAnswer, ClientError> {
        let url = format!("{}/chat", self.base_url.trim_end_matches('/'));
        let body = FallbackRequest {
            query,
            session_id: session.as_str(),
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Transport(format!(
                "server returned {}",
                status
            )));
        }

        response
            .json::<FallbackAnswer>()
            .await
            .map_err(|e| ClientError::Transport(format!("malformed response: {}", e)))
    }
}
