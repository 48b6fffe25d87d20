//! Language-model backend interface.
//!
//! The backend is an opaque external collaborator: it takes a fully built
//! prompt and returns the generated answer. `HttpModel` talks to an
//! OpenAI-compatible chat-completions endpoint; `MockModel` returns a
//! deterministic canned answer and is the default wiring for local runs
//! and tests.

use serde::{Deserialize, Serialize};

/// Errors from the language-model backend.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("backend request failed: {0}")]
    Backend(String),
    #[error("backend returned malformed response: {0}")]
    Malformed(String),
}

/// Service producing a complete answer for a prompt.
pub trait LanguageModel: Send + Sync {
    fn complete(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, GenerationError>> + Send;
}

/// Object-safe version of [`LanguageModel`] for dynamic dispatch.
///
/// A blanket implementation is provided so that every `LanguageModel`
/// automatically implements it.
pub trait DynLanguageModel: Send + Sync {
    fn complete_boxed<'a>(
        &'a self,
        prompt: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<String, GenerationError>> + Send + 'a>,
    >;
}

impl<T: LanguageModel> DynLanguageModel for T {
    fn complete_boxed<'a>(
        &'a self,
        prompt: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<String, GenerationError>> + Send + 'a>,
    > {
        Box::pin(self.complete(prompt))
    }
}

/// Deterministic model used by the default wiring and by tests.
#[derive(Debug, Clone)]
pub struct MockModel {
    reply: String,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            reply: "I checked the indexed documents for you. The closest material \
                    is summarized in the context above. Ask a follow-up if you \
                    need more detail."
                .to_string(),
        }
    }

    /// A mock that always returns the given reply.
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageModel for MockModel {
    async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
        Ok(self.reply.clone())
    }
}

// ---------------------------------------------------------------------------
// HttpModel - OpenAI-compatible chat completions over HTTP
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f64,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client.
pub struct HttpModel {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f64,
}

impl HttpModel {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        temperature: f64,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            temperature,
        }
    }
}

impl LanguageModel for HttpModel {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let body = CompletionRequest {
            model: &self.model,
            messages: vec![WireMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            stream: false,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GenerationError::Backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Backend(format!(
                "backend returned {}",
                status
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::Malformed("no choices in response".to_string()))
    }
}
