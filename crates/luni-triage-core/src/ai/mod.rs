//! AI service boundary.
//!
//! The engine talks to the model only through [`TriageService`]. The
//! production implementation, [`LlmTriageService`], drives any
//! [`luni_triage_llm::LlmClient`].

mod service;

pub use service::*;

use luni_triage_llm::{ExtractionError, LlmError};
use thiserror::Error;

use crate::models::{AnalysisState, Message, Region, Severity};

/// AI call failures, classified for the owner.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AiError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(String),

    #[error("AI service error: {0}")]
    Server(String),

    #[error("Invalid AI response: {0}")]
    InvalidResponse(String),

    #[error("AI error: {0}")]
    Other(String),
}

pub type AiResult<T> = Result<T, AiError>;

impl AiError {
    /// Text shown in the chat when a call fails.
    pub fn user_message(&self) -> &'static str {
        match self {
            AiError::Auth(_) => {
                "Luni can't connect to the AI service right now because it couldn't sign in. \
                 Please contact support."
            }
            AiError::RateLimited => {
                "Luni is getting a lot of questions right now. Please wait a moment and try again."
            }
            AiError::Network(_) => {
                "Luni couldn't reach the AI service. Please check your connection and try again."
            }
            AiError::Server(_) => {
                "The AI service is having trouble right now. Please try again shortly."
            }
            AiError::InvalidResponse(_) => {
                "Luni received an unexpected response. Please try again."
            }
            AiError::Other(_) => "Something went wrong. Please try again.",
        }
    }

    /// Retrying cannot help; the case should stop accepting input.
    pub fn locks_case(&self) -> bool {
        matches!(self, AiError::Auth(_))
    }
}

impl From<LlmError> for AiError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Auth(msg) => AiError::Auth(msg),
            LlmError::RateLimited => AiError::RateLimited,
            LlmError::Connection(_) | LlmError::Timeout(_) | LlmError::Stream(_) => {
                AiError::Network(e.to_string())
            }
            LlmError::Server { .. } => AiError::Server(e.to_string()),
            LlmError::ResponseParsing(msg) => AiError::InvalidResponse(msg),
            LlmError::Http { .. } | LlmError::Client(_) => AiError::Other(e.to_string()),
        }
    }
}

impl From<ExtractionError> for AiError {
    fn from(e: ExtractionError) -> Self {
        AiError::InvalidResponse(e.to_string())
    }
}

/// A finished triage reply.
#[derive(Debug, Clone, PartialEq)]
pub struct TriageReply {
    /// Reply text with control markers removed
    pub content: String,
    /// Severity the model attached, if any
    pub severity: Option<Severity>,
    /// The model has enough information for a Health Report
    pub should_generate_report: bool,
}

/// Result of criteria classification over a transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaAssessment {
    pub analysis: AnalysisState,
    pub severity: Option<Severity>,
}

/// Streaming callback: `(delta, full_content_so_far)`.
pub type OnStream<'a> = &'a mut dyn FnMut(&str, &str);

/// Language-model operations used by the triage flow.
///
/// Shared between the reply thread and the analysis thread of a turn.
pub trait TriageService: Send + Sync {
    /// Stream the assistant's next reply.
    fn generate_triage_response(
        &self,
        messages: &[Message],
        region: Region,
        precomputed_analysis: Option<&AnalysisState>,
        on_stream: OnStream<'_>,
        medical_context: Option<&str>,
    ) -> AiResult<TriageReply>;

    /// Classify which intake criteria the transcript establishes.
    fn analyze_completion_criteria(
        &self,
        messages: &[Message],
        previous_analysis: Option<&AnalysisState>,
    ) -> AiResult<CriteriaAssessment>;

    /// Stream the SOAP Health Report.
    #[allow(clippy::too_many_arguments)]
    fn generate_health_report(
        &self,
        messages: &[Message],
        region: Region,
        summary_hint: Option<&str>,
        analysis: &AnalysisState,
        severity: Severity,
        on_stream: OnStream<'_>,
        medical_context: Option<&str>,
    ) -> AiResult<String>;

    /// Stream a description of an uploaded photo.
    fn analyze_image_with_vision(
        &self,
        base64: &str,
        filename: &str,
        region: Region,
        on_stream: OnStream<'_>,
    ) -> AiResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_classification() {
        assert_eq!(AiError::from(LlmError::RateLimited), AiError::RateLimited);
        assert!(matches!(
            AiError::from(LlmError::Timeout(30)),
            AiError::Network(_)
        ));
        assert!(matches!(
            AiError::from(LlmError::Server {
                status: 503,
                body: "busy".into()
            }),
            AiError::Server(_)
        ));
        assert!(matches!(
            AiError::from(LlmError::Http {
                status: 400,
                body: "bad".into()
            }),
            AiError::Other(_)
        ));
    }

    #[test]
    fn test_only_auth_locks() {
        assert!(AiError::Auth("401".into()).locks_case());
        assert!(!AiError::RateLimited.locks_case());
        assert!(!AiError::Network("down".into()).locks_case());
    }

    #[test]
    fn test_user_messages_hide_details() {
        let err = AiError::Server("HTTP 500: stack trace".into());
        assert!(!err.user_message().contains("stack trace"));
    }
}
