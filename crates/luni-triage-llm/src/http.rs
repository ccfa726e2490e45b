//! OpenAI-compatible chat-completions client.

use std::io::{BufRead, BufReader};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{ChatRole, ChatTurn, CompletionRequest, LlmClient, LlmError, LlmResult};

/// HTTP client for any `/v1/chat/completions` compatible provider.
pub struct HttpLlmClient {
    base_url: String,
    api_key: Option<String>,
    model: String,
    vision_model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpLlmClient {
    /// Create a client. `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: &str,
        vision_model: &str,
        timeout_secs: u64,
    ) -> LlmResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            vision_model: vision_model.to_string(),
            client,
            timeout_secs,
        })
    }

    /// The text model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn send(&self, request: &CompletionRequest, stream: bool) -> LlmResult<reqwest::blocking::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let model = if request.vision {
            &self.vision_model
        } else {
            &self.model
        };
        let body = ChatCompletionBody::from_request(model, request, stream);

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(model = %model, stream, turns = request.turns.len(), "Sending chat completion");

        let response = builder.send().map_err(|e| {
            if e.is_connect() {
                LlmError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                LlmError::Timeout(self.timeout_secs)
            } else {
                LlmError::Client(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_status(status.as_u16(), body));
        }
        Ok(response)
    }
}

/// Map a non-success HTTP status to an error class.
fn classify_status(status: u16, body: String) -> LlmError {
    match status {
        401 | 403 => LlmError::Auth(body),
        429 => LlmError::RateLimited,
        500..=599 => LlmError::Server { status, body },
        _ => LlmError::Http { status, body },
    }
}

impl LlmClient for HttpLlmClient {
    fn complete(&self, request: &CompletionRequest) -> LlmResult<String> {
        let response = self.send(request, false)?;
        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::ResponseParsing("Response has no choices".into()))
    }

    fn complete_streaming(
        &self,
        request: &CompletionRequest,
        on_delta: &mut dyn FnMut(&str),
    ) -> LlmResult<String> {
        let response = self.send(request, true)?;
        let reader = BufReader::new(response);
        let mut full = String::new();

        for line in reader.lines() {
            let line = line.map_err(|e| LlmError::Stream(e.to_string()))?;
            let Some(delta) = parse_sse_line(&line)? else {
                continue;
            };
            match delta {
                SseEvent::Done => break,
                SseEvent::Delta(text) => {
                    full.push_str(&text);
                    on_delta(&text);
                }
            }
        }

        Ok(full)
    }
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Delta(String),
    Done,
}

/// Parse one server-sent-events line of a streamed completion.
fn parse_sse_line(line: &str) -> LlmResult<Option<SseEvent>> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }
    if data.is_empty() {
        return Ok(None);
    }

    let chunk: StreamChunk =
        serde_json::from_str(data).map_err(|e| LlmError::Stream(e.to_string()))?;
    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default();

    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(SseEvent::Delta(text)))
    }
}

/// Request body for `/chat/completions`.
#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

impl<'a> ChatCompletionBody<'a> {
    fn from_request(model: &'a str, request: &CompletionRequest, stream: bool) -> Self {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        messages.push(WireMessage {
            role: ChatRole::System,
            content: WireContent::Text(request.system.clone()),
        });
        messages.extend(request.turns.iter().map(WireMessage::from_turn));

        Self {
            model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
            response_format: request.json_mode.then(|| ResponseFormat {
                kind: "json_object",
            }),
        }
    }
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct WireMessage {
    role: ChatRole,
    content: WireContent,
}

impl WireMessage {
    fn from_turn(turn: &ChatTurn) -> Self {
        let content = match &turn.image {
            None => WireContent::Text(turn.content.clone()),
            Some(image) => WireContent::Parts(vec![
                WirePart::Text {
                    text: turn.content.clone(),
                },
                WirePart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.data_url(),
                    },
                },
            ]),
        };
        Self {
            role: turn.role,
            content,
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

/// Response body of a non-streamed completion.
#[derive(Deserialize)]
struct ChatCompletionResponse {
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

/// One SSE chunk of a streamed completion.
#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}
