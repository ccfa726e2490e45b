//! `TriageService` over a chat-completion client.

use luni_triage_llm::{
    display_text, make_criteria_prompt, make_report_prompt, make_report_system_prompt,
    make_triage_system_prompt, make_vision_prompt, make_vision_system_prompt,
    parse_criteria_output, parse_reply_markers, ChatRole, ChatTurn, CompletionRequest,
    ImageAttachment, KeywordClassifier, LlmClient, CRITERIA_SYSTEM_PROMPT,
};
use tracing::{debug, instrument};

use super::{AiError, AiResult, CriteriaAssessment, OnStream, TriageReply, TriageService};
use crate::models::{
    conversation_turns, format_transcript, AnalysisState, Criteria, Message, MessageKind, Region,
    Severity,
};

/// Production triage service.
pub struct LlmTriageService<C: LlmClient> {
    client: C,
}

impl<C: LlmClient> LlmTriageService<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Stream a request, reporting `(delta, display_text_so_far)`.
    fn stream(&self, request: &CompletionRequest, on_stream: OnStream<'_>) -> AiResult<String> {
        let mut raw = String::new();
        let full = self.client.complete_streaming(request, &mut |delta| {
            raw.push_str(delta);
            on_stream(delta, &display_text(&raw));
        })?;
        Ok(full)
    }
}

impl<C: LlmClient> TriageService for LlmTriageService<C> {
    #[instrument(skip_all, fields(messages = messages.len(), region = %region))]
    fn generate_triage_response(
        &self,
        messages: &[Message],
        region: Region,
        precomputed_analysis: Option<&AnalysisState>,
        on_stream: OnStream<'_>,
        medical_context: Option<&str>,
    ) -> AiResult<TriageReply> {
        let summary = precomputed_analysis.map(AnalysisState::summary);
        let system = make_triage_system_prompt(
            region.prompt_region(),
            summary.as_deref(),
            medical_context,
        );
        let request = CompletionRequest::new(system, conversation_turns(messages));

        let full = self.stream(&request, on_stream)?;
        let markers = parse_reply_markers(&full);
        if markers.content.is_empty() {
            return Err(AiError::InvalidResponse("Empty reply".into()));
        }

        debug!(
            ready = markers.ready_for_report,
            severity = ?markers.severity,
            "Triage reply complete"
        );

        Ok(TriageReply {
            content: markers.content,
            severity: markers.severity.as_deref().and_then(Severity::parse_label),
            should_generate_report: markers.ready_for_report,
        })
    }

    #[instrument(skip_all, fields(messages = messages.len()))]
    fn analyze_completion_criteria(
        &self,
        messages: &[Message],
        previous_analysis: Option<&AnalysisState>,
    ) -> AiResult<CriteriaAssessment> {
        let previous_json = previous_analysis
            .map(|a| serde_json::to_string(&a.criteria))
            .transpose()
            .map_err(|e| AiError::Other(e.to_string()))?;

        let prompt = make_criteria_prompt(&format_transcript(messages), previous_json.as_deref());
        let request =
            CompletionRequest::new(CRITERIA_SYSTEM_PROMPT, vec![ChatTurn::user(prompt)]).json();

        let response = self.client.complete(&request)?;
        let output = parse_criteria_output(&response)?;

        // Keyword screen backs up the classifier on the newest owner message
        let emergency = output.emergency_detected
            || latest_owner_message(messages).is_some_and(KeywordClassifier::detect_emergency);

        let analysis = AnalysisState::from_criteria(Criteria::from(&output.criteria), emergency);
        let severity = if emergency {
            Some(Severity::Emergency)
        } else {
            output.severity.as_deref().and_then(Severity::parse_label)
        };

        debug!(
            completed = analysis.completed_criteria,
            emergency, "Criteria classified"
        );
        Ok(CriteriaAssessment { analysis, severity })
    }

    #[instrument(skip_all, fields(messages = messages.len(), region = %region, severity = %severity))]
    fn generate_health_report(
        &self,
        messages: &[Message],
        region: Region,
        summary_hint: Option<&str>,
        analysis: &AnalysisState,
        severity: Severity,
        on_stream: OnStream<'_>,
        medical_context: Option<&str>,
    ) -> AiResult<String> {
        let prompt = make_report_prompt(
            &format_transcript(messages),
            summary_hint,
            &analysis.summary(),
            severity.label(),
            medical_context,
        );
        let request = CompletionRequest::new(
            make_report_system_prompt(region.prompt_region()),
            vec![ChatTurn::user(prompt)],
        )
        .with_temperature(0.3)
        .with_max_tokens(2048);

        let full = self.stream(&request, on_stream)?;
        let content = full.trim();
        if content.is_empty() {
            return Err(AiError::InvalidResponse("Empty report".into()));
        }
        Ok(content.to_string())
    }

    #[instrument(skip_all, fields(filename = %filename, region = %region))]
    fn analyze_image_with_vision(
        &self,
        base64: &str,
        filename: &str,
        region: Region,
        on_stream: OnStream<'_>,
    ) -> AiResult<String> {
        let turn = ChatTurn {
            role: ChatRole::User,
            content: make_vision_prompt(filename),
            image: Some(ImageAttachment {
                base64: base64.to_string(),
                mime_type: mime_type_for(filename).to_string(),
            }),
        };
        let request =
            CompletionRequest::new(make_vision_system_prompt(region.prompt_region()), vec![turn])
                .vision();

        let full = self.stream(&request, on_stream)?;
        let content = parse_reply_markers(&full).content;
        if content.is_empty() {
            return Err(AiError::InvalidResponse("Empty photo analysis".into()));
        }
        Ok(content)
    }
}

fn latest_owner_message(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.kind == MessageKind::User)
        .map(|m| m.content.as_str())
}

/// Image MIME type from a filename extension.
pub fn mime_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "image/jpeg",
    }
}
