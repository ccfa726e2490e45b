//! Change notifications for the UI layer.

use std::sync::Mutex;

use crate::models::{AnalysisState, Message};

/// Something changed in a case.
#[derive(Debug, Clone, PartialEq)]
pub enum TriageEvent {
    MessageAppended {
        case_id: String,
        message: Message,
    },
    /// Streaming content (or final content) for an existing message
    MessageUpdated {
        case_id: String,
        message_id: String,
        content: String,
    },
    AnalysisUpdated {
        case_id: String,
        analysis: AnalysisState,
    },
    /// Raised at most once per case
    EmergencyAlert {
        case_id: String,
    },
    CaseLocked {
        case_id: String,
        report_id: String,
    },
    InputClosed {
        case_id: String,
        reason: String,
    },
}

impl TriageEvent {
    pub fn case_id(&self) -> &str {
        match self {
            TriageEvent::MessageAppended { case_id, .. }
            | TriageEvent::MessageUpdated { case_id, .. }
            | TriageEvent::AnalysisUpdated { case_id, .. }
            | TriageEvent::EmergencyAlert { case_id }
            | TriageEvent::CaseLocked { case_id, .. }
            | TriageEvent::InputClosed { case_id, .. } => case_id,
        }
    }
}

/// Receives triage events. Called on the thread running the turn.
pub trait TriageObserver: Send + Sync {
    fn on_event(&self, event: &TriageEvent);
}

/// Discards events.
pub struct NoopObserver;

impl TriageObserver for NoopObserver {
    fn on_event(&self, _event: &TriageEvent) {}
}

/// Records events in order (for tests and replay).
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<TriageEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TriageEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, predicate: impl Fn(&TriageEvent) -> bool) -> usize {
        self.events
            .lock()
            .map(|e| e.iter().filter(|ev| predicate(ev)).count())
            .unwrap_or(0)
    }
}

impl TriageObserver for EventLog {
    fn on_event(&self, event: &TriageEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
