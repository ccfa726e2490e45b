//! Triage cases (one conversation thread each).

use luni_triage_llm::ChatTurn;
use serde::{Deserialize, Serialize};

use super::analysis::AnalysisState;
use super::message::{Message, MessageKind};
use super::region::Region;
use super::report::{Report, Severity};

/// One triage conversation with its optional Health Report.
///
/// `locked` is only ever set by [`Case::attach_report`], so a locked case
/// always has a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    /// Unique case ID
    pub id: String,
    /// Display title
    pub title: String,
    /// Transcript (append-only)
    pub messages: Vec<Message>,
    /// Generated report, at most one
    pub health_report: Option<Report>,
    /// Report attached; no further input
    pub locked: bool,
    /// Creation timestamp
    pub created_at: String,
    /// Region at creation
    pub region: Region,
    /// Latest assessment
    #[serde(default)]
    pub analysis: AnalysisState,
    /// Latest severity
    #[serde(default)]
    pub severity: Severity,
    /// Emergency popup has been raised for this case
    #[serde(default)]
    pub emergency_popup_shown: bool,
    /// Criteria analysis failed; no further input
    #[serde(default)]
    pub service_unavailable: bool,
}

impl Case {
    /// Create an empty case.
    pub fn new(title: String, region: Region) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            messages: Vec::new(),
            health_report: None,
            locked: false,
            created_at: chrono::Utc::now().to_rfc3339(),
            region,
            analysis: AnalysisState::default(),
            severity: Severity::Unassessed,
            emergency_popup_shown: false,
            service_unavailable: false,
        }
    }

    /// Whether the owner can still send messages.
    pub fn accepts_input(&self) -> bool {
        !self.locked && !self.service_unavailable
    }

    /// Append a message, returning its ID.
    pub fn push(&mut self, message: Message) -> String {
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Attach the Health Report and lock the case.
    ///
    /// Returns false, leaving the case untouched, if a report already exists.
    pub fn attach_report(&mut self, report: Report) -> bool {
        if self.health_report.is_some() {
            return false;
        }
        self.health_report = Some(report);
        self.locked = true;
        true
    }

    /// Count of successful report messages.
    pub fn successful_report_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.is_successful_report())
            .count()
    }

    /// Conversation turns for the model (errors, reports and placeholders excluded).
    pub fn chat_turns(&self) -> Vec<ChatTurn> {
        conversation_turns(&self.messages)
    }

    /// Plain-text transcript, e.g. for the classifier.
    pub fn transcript(&self) -> String {
        format_transcript(&self.messages)
    }
}

/// Conversation turns for a message slice.
pub fn conversation_turns(messages: &[Message]) -> Vec<ChatTurn> {
    messages
        .iter()
        .filter(|m| m.is_conversational())
        .map(|m| match m.kind {
            MessageKind::Ai => ChatTurn::assistant(m.content.clone()),
            MessageKind::Image => ChatTurn::user(format!(
                "[Photo uploaded: {}]",
                m.filename.as_deref().unwrap_or("photo")
            )),
            _ => ChatTurn::user(m.content.clone()),
        })
        .collect()
}

/// Render messages as "Owner:" / "Luni:" lines.
pub fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| m.is_conversational())
        .map(|m| match m.kind {
            MessageKind::Ai => format!("Luni: {}", m.content),
            MessageKind::Image => format!(
                "Owner: [Photo uploaded: {}]",
                m.filename.as_deref().unwrap_or("photo")
            ),
            _ => format!("Owner: {}", m.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use luni_triage_llm::ChatRole;

    #[test]
    fn test_new_case() {
        let case = Case::new("Case 1".into(), Region::NZ);
        assert_eq!(case.id.len(), 36);
        assert!(case.messages.is_empty());
        assert!(case.accepts_input());
        assert_eq!(case.severity, Severity::Unassessed);
    }

    #[test]
    fn test_attach_report_locks_once() {
        let mut case = Case::new("Case 1".into(), Region::AU);
        let first = Report::new(Region::AU, "first".into(), AnalysisState::default(), Severity::Mild);
        let second = Report::new(Region::AU, "second".into(), AnalysisState::default(), Severity::Mild);

        assert!(case.attach_report(first));
        assert!(case.locked);
        assert!(!case.accepts_input());

        assert!(!case.attach_report(second));
        assert_eq!(case.health_report.as_ref().unwrap().content, "first");
    }

    #[test]
    fn test_service_unavailable_closes_input_without_lock() {
        let mut case = Case::new("Case 1".into(), Region::AU);
        case.service_unavailable = true;
        assert!(!case.accepts_input());
        assert!(!case.locked);
    }

    #[test]
    fn test_transcript_and_turns() {
        let mut case = Case::new("Case 1".into(), Region::AU);
        case.push(Message::ai("Hi, I'm Luni!"));
        case.push(Message::user("My cat is sneezing"));
        case.push(Message::image("AAAA".into(), "nose.jpg"));
        case.push(Message::ai_placeholder());

        let transcript = case.transcript();
        assert_eq!(
            transcript,
            "Luni: Hi, I'm Luni!\nOwner: My cat is sneezing\nOwner: [Photo uploaded: nose.jpg]"
        );

        let turns = case.chat_turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, ChatRole::Assistant);
        assert_eq!(turns[1].role, ChatRole::User);
        assert!(turns[2].image.is_none());
    }

    #[test]
    fn test_round_trip_json() {
        let mut case = Case::new("Bella vomiting".into(), Region::AU);
        case.push(Message::user("Bella has been vomiting"));
        let json = serde_json::to_string(&case).unwrap();
        assert!(json.contains("\"healthReport\":null"));
        let parsed: Case = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, case);
    }
}
