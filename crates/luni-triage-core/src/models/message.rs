//! Chat messages within a case.

use serde::{Deserialize, Serialize};

use super::report::Severity;

/// Message type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Written by the owner
    User,
    /// Written by the assistant
    Ai,
    /// Photo uploaded by the owner
    Image,
    /// Health Report (SOAP format)
    Soap,
    /// Status or error notice
    System,
}

/// A message in a case transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message ID
    pub id: String,
    /// Message type
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Text content (mutated in place while streaming)
    pub content: String,
    /// Creation timestamp
    pub timestamp: String,
    /// Base64 image payload for `Image` messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Original filename for `Image` messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Severity assessed with this reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Content is still arriving
    #[serde(default)]
    pub streaming: bool,
    /// This message reports a failure
    #[serde(default)]
    pub is_error: bool,
    /// Image payload was dropped to save storage
    #[serde(default)]
    pub image_omitted: bool,
}

impl Message {
    fn new(kind: MessageKind, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            content,
            timestamp: chrono::Utc::now().to_rfc3339(),
            image: None,
            filename: None,
            severity: None,
            streaming: false,
            is_error: false,
            image_omitted: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageKind::User, content.into())
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Ai, content.into())
    }

    /// Empty assistant message that a stream will fill.
    pub fn ai_placeholder() -> Self {
        let mut message = Self::new(MessageKind::Ai, String::new());
        message.streaming = true;
        message
    }

    /// Empty report message that a stream will fill.
    pub fn soap_placeholder() -> Self {
        let mut message = Self::new(MessageKind::Soap, String::new());
        message.streaming = true;
        message
    }

    pub fn image(base64: String, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let mut message = Self::new(MessageKind::Image, format!("Uploaded photo: {}", filename));
        message.image = Some(base64);
        message.filename = Some(filename);
        message
    }

    /// Turn this message into a finished error notice.
    pub fn fail(&mut self, kind: MessageKind, content: impl Into<String>) {
        self.kind = kind;
        self.content = content.into();
        self.streaming = false;
        self.is_error = true;
    }

    /// Stop streaming with final content.
    pub fn finish(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.streaming = false;
    }

    /// Counts as conversation for the model.
    pub fn is_conversational(&self) -> bool {
        !self.is_error
            && !self.streaming
            && matches!(
                self.kind,
                MessageKind::User | MessageKind::Ai | MessageKind::Image
            )
    }

    /// A finished, successful Health Report message.
    pub fn is_successful_report(&self) -> bool {
        self.kind == MessageKind::Soap && !self.is_error
    }
}
