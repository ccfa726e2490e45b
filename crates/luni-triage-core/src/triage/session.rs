//! In-memory triage session.

use tracing::debug;

use super::{TriageError, TriageResult};
use crate::models::{AnalysisState, Case, MessageKind, Region, Severity};
use crate::persistence::{PersistenceAdapter, SaveOutcome, SessionSnapshot};

/// All cases and the state of the active one.
///
/// `current_analysis` and `current_severity` mirror the active case so the
/// progress UI can read them without a lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriageSession {
    pub(super) cases: Vec<Case>,
    pub(super) current_case_id: Option<String>,
    pub(super) region: Region,
    pub(super) current_analysis: AnalysisState,
    pub(super) current_severity: Severity,
}

impl TriageSession {
    pub fn new(region: Region) -> Self {
        Self {
            region,
            ..Self::default()
        }
    }

    /// Cases, newest first.
    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub fn case(&self, case_id: &str) -> Option<&Case> {
        self.cases.iter().find(|c| c.id == case_id)
    }

    pub fn case_mut(&mut self, case_id: &str) -> TriageResult<&mut Case> {
        self.cases
            .iter_mut()
            .find(|c| c.id == case_id)
            .ok_or_else(|| TriageError::CaseNotFound(case_id.to_string()))
    }

    pub fn current_case_id(&self) -> Option<&str> {
        self.current_case_id.as_deref()
    }

    pub fn current_case(&self) -> Option<&Case> {
        self.current_case_id.as_deref().and_then(|id| self.case(id))
    }

    /// Region used for new cases.
    pub fn region(&self) -> Region {
        self.region
    }

    pub fn current_analysis(&self) -> &AnalysisState {
        &self.current_analysis
    }

    pub fn current_severity(&self) -> Severity {
        self.current_severity
    }

    /// Copy a case's analysis and severity to the session if it is active.
    pub fn sync_current(&mut self, case_id: &str) {
        if self.current_case_id.as_deref() != Some(case_id) {
            return;
        }
        if let Some(case) = self.cases.iter().find(|c| c.id == case_id) {
            self.current_analysis = case.analysis.clone();
            self.current_severity = case.severity;
        }
    }

    /// Clear the active case and its progress.
    pub(super) fn reset_active(&mut self) {
        self.current_case_id = None;
        self.current_analysis = AnalysisState::default();
        self.current_severity = Severity::Unassessed;
    }

    /// Capture the session for storage.
    pub fn snapshot(&self, timestamp_ms: i64) -> SessionSnapshot {
        SessionSnapshot {
            chat_history: self.cases.clone(),
            current_chat_id: self.current_case_id.clone(),
            selected_region: self.region,
            current_analysis: self.current_analysis.clone(),
            current_severity: self.current_severity,
            timestamp: timestamp_ms,
        }
    }

    /// Rebuild a session from a snapshot.
    ///
    /// Messages left streaming when the snapshot was taken are finalized: a
    /// partial reply keeps its text, an empty one becomes an error notice.
    /// An interrupted report always fails, since only a completed report may
    /// be attached to its case.
    pub fn restore(snapshot: SessionSnapshot) -> Self {
        let mut cases = snapshot.chat_history;
        for case in &mut cases {
            for message in case.messages.iter_mut().filter(|m| m.streaming) {
                debug!(case_id = %case.id, message_id = %message.id, "Finalizing interrupted message");
                if message.kind == MessageKind::Soap {
                    message.fail(MessageKind::Soap, "This response was interrupted. Please try again.");
                } else if message.content.is_empty() {
                    message.fail(MessageKind::System, "This response was interrupted. Please try again.");
                } else {
                    let content = std::mem::take(&mut message.content);
                    message.finish(content);
                }
            }
        }

        let current_case_id = snapshot
            .current_chat_id
            .filter(|id| cases.iter().any(|c| &c.id == id));

        let mut session = Self {
            cases,
            current_case_id,
            region: snapshot.selected_region,
            current_analysis: snapshot.current_analysis,
            current_severity: snapshot.current_severity,
        };
        if session.current_case_id.is_none() {
            session.reset_active();
        }
        session
    }

    /// Load the stored session, or start empty.
    pub fn load_or_default(adapter: &PersistenceAdapter<'_>, region: Region) -> Self {
        adapter
            .load()
            .map(Self::restore)
            .unwrap_or_else(|| Self::new(region))
    }

    /// Save the session now.
    pub fn persist(&self, adapter: &PersistenceAdapter<'_>) -> SaveOutcome {
        adapter.save(&self.snapshot(chrono::Utc::now().timestamp_millis()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;

    #[test]
    fn test_snapshot_round_trip() {
        let mut session = TriageSession::new(Region::NZ);
        let id = session.start_new_chat();
        session.case_mut(&id).unwrap().push(Message::user("Kitten sneezing"));

        let snapshot = session.snapshot(42);
        assert_eq!(snapshot.timestamp, 42);
        let restored = TriageSession::restore(snapshot);
        assert_eq!(restored, session);
    }

    #[test]
    fn test_restore_finalizes_streaming() {
        let mut session = TriageSession::new(Region::AU);
        let id = session.start_new_chat();
        let case = session.case_mut(&id).unwrap();
        let mut partial = Message::ai_placeholder();
        partial.content = "Is she eating".into();
        case.push(partial);
        case.push(Message::soap_placeholder());

        let restored = TriageSession::restore(session.snapshot(0));
        let messages = &restored.case(&id).unwrap().messages;
        assert!(messages.iter().all(|m| !m.streaming));

        let reply = &messages[1];
        assert_eq!(reply.content, "Is she eating");
        assert!(!reply.is_error);

        let report = &messages[2];
        assert_eq!(report.kind, MessageKind::Soap);
        assert!(report.is_error);
    }

    #[test]
    fn test_restore_fails_partial_report() {
        let mut session = TriageSession::new(Region::AU);
        let id = session.start_new_chat();
        let case = session.case_mut(&id).unwrap();
        let mut report = Message::soap_placeholder();
        report.content = "## Subjective\nVomit".into();
        let report_id = case.push(report);

        let restored = TriageSession::restore(session.snapshot(0));
        let case = restored.case(&id).unwrap();
        let report = case.message(&report_id).unwrap();
        assert_eq!(report.kind, MessageKind::Soap);
        assert!(report.is_error);
        assert!(!report.streaming);
        assert_eq!(case.successful_report_count(), 0);
        assert!(case.health_report.is_none());
        assert!(!case.locked);
    }

    #[test]
    fn test_restore_drops_dangling_current_id() {
        let mut snapshot = TriageSession::new(Region::AU).snapshot(0);
        snapshot.current_chat_id = Some("gone".into());
        snapshot.current_severity = Severity::Serious;

        let restored = TriageSession::restore(snapshot);
        assert!(restored.current_case_id().is_none());
        assert_eq!(restored.current_severity(), Severity::Unassessed);
    }
}
