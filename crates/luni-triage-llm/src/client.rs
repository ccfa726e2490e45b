//! Chat-completion client abstraction.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// LLM client errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Cannot reach LLM service at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM service error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    #[error("HTTP error (HTTP {status}): {body}")]
    Http { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Streaming error: {0}")]
    Stream(String),
}

pub type LlmResult<T> = Result<T, LlmError>;

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// Inline image sent alongside a user turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageAttachment {
    /// Base64 payload without the `data:` prefix
    pub base64: String,
    /// MIME type (e.g. "image/jpeg")
    pub mime_type: String,
}

impl ImageAttachment {
    /// Render as a data URL.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

/// One turn of a conversation sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    pub image: Option<ImageAttachment>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            image: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            image: None,
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    /// System prompt
    pub system: String,
    /// Conversation turns (oldest first)
    pub turns: Vec<ChatTurn>,
    /// Sampling temperature
    pub temperature: f32,
    /// Response token cap
    pub max_tokens: u32,
    /// Ask the provider for a JSON object response
    pub json_mode: bool,
    /// Route to the vision model
    pub vision: bool,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, turns: Vec<ChatTurn>) -> Self {
        Self {
            system: system.into(),
            turns,
            temperature: 0.7,
            max_tokens: 1024,
            json_mode: false,
            vision: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self.temperature = 0.0;
        self
    }

    pub fn vision(mut self) -> Self {
        self.vision = true;
        self
    }
}

/// Chat-completion backend.
///
/// Implementations must be shareable across threads: a triage turn issues
/// the criteria classification and the streamed reply at the same time.
pub trait LlmClient: Send + Sync {
    /// Run a completion and return the whole response.
    fn complete(&self, request: &CompletionRequest) -> LlmResult<String>;

    /// Run a completion, calling `on_delta` with each text fragment as it
    /// arrives. Returns the full response.
    fn complete_streaming(
        &self,
        request: &CompletionRequest,
        on_delta: &mut dyn FnMut(&str),
    ) -> LlmResult<String>;
}

type Responder = Box<dyn Fn(&CompletionRequest) -> LlmResult<String> + Send + Sync>;

/// Mock client for testing without a live provider.
///
/// Streams responses word by word so callers see several deltas.
pub struct MockLlmClient {
    responder: Responder,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmClient {
    /// Always answer with `response`.
    pub fn new(response: &str) -> Self {
        let response = response.to_string();
        Self::with_responder(move |_| Ok(response.clone()))
    }

    /// Always fail with `error`.
    pub fn failing(error: LlmError) -> Self {
        Self::with_responder(move |_| Err(error.clone()))
    }

    /// Answer each request with a closure.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> LlmResult<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn respond(&self, request: &CompletionRequest) -> LlmResult<String> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        (self.responder)(request)
    }
}

impl LlmClient for MockLlmClient {
    fn complete(&self, request: &CompletionRequest) -> LlmResult<String> {
        self.respond(request)
    }

    fn complete_streaming(
        &self,
        request: &CompletionRequest,
        on_delta: &mut dyn FnMut(&str),
    ) -> LlmResult<String> {
        let response = self.respond(request)?;
        for piece in response.split_inclusive(' ') {
            on_delta(piece);
        }
        Ok(response)
    }
}
