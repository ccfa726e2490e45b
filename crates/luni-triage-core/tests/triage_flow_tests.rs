//! End-to-end triage conversations against a scripted AI service.
//!
//! Criteria come from the keyword classifier so the intake progresses the
//! way a real conversation does.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use luni_triage_core::ai::{AiError, AiResult, CriteriaAssessment, OnStream, TriageReply};
use luni_triage_core::config::TriageConfig;
use luni_triage_core::models::{
    AnalysisState, Criteria, Message, MessageKind, Region, Severity,
};
use luni_triage_core::triage::{EventLog, MergePolicy, TriageEngine, TriageEvent, TriageSession};
use luni_triage_core::TriageService;
use luni_triage_llm::KeywordClassifier;

/// Which owner messages the classifier sees.
#[derive(Clone, Copy)]
enum Scope {
    Transcript,
    LastMessage,
}

struct ScriptedService {
    replies: Mutex<VecDeque<AiResult<TriageReply>>>,
    report: AiResult<String>,
    scope: Scope,
    report_calls: Mutex<usize>,
}

impl ScriptedService {
    fn new(scope: Scope) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            report: Ok("## Subjective\nVomiting since yesterday\n## Plan\nSee a vet".into()),
            scope,
            report_calls: Mutex::new(0),
        }
    }

    fn reply(self, content: &str, severity: Option<Severity>) -> Self {
        self.replies.lock().unwrap().push_back(Ok(TriageReply {
            content: content.to_string(),
            severity,
            should_generate_report: false,
        }));
        self
    }

    fn failing_reply(self, error: AiError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    fn failing_report(mut self, error: AiError) -> Self {
        self.report = Err(error);
        self
    }

    fn report_calls(&self) -> usize {
        *self.report_calls.lock().unwrap()
    }
}

impl TriageService for ScriptedService {
    fn generate_triage_response(
        &self,
        _messages: &[Message],
        _region: Region,
        _precomputed_analysis: Option<&AnalysisState>,
        on_stream: OnStream<'_>,
        _medical_context: Option<&str>,
    ) -> AiResult<TriageReply> {
        let next = self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(TriageReply {
                content: "Tell me more.".into(),
                severity: None,
                should_generate_report: false,
            })
        });
        if let Ok(reply) = &next {
            on_stream(&reply.content, &reply.content);
        }
        next
    }

    fn analyze_completion_criteria(
        &self,
        messages: &[Message],
        _previous_analysis: Option<&AnalysisState>,
    ) -> AiResult<CriteriaAssessment> {
        let owner: Vec<&str> = messages
            .iter()
            .filter(|m| m.kind == MessageKind::User)
            .map(|m| m.content.as_str())
            .collect();
        let text = match self.scope {
            Scope::Transcript => owner.join("\n"),
            Scope::LastMessage => owner.last().map(|s| s.to_string()).unwrap_or_default(),
        };

        let output = KeywordClassifier::classify(&text);
        Ok(CriteriaAssessment {
            analysis: AnalysisState::from_criteria(
                Criteria::from(&output.criteria),
                output.emergency_detected,
            ),
            severity: output.severity.as_deref().and_then(Severity::parse_label),
        })
    }

    fn generate_health_report(
        &self,
        _messages: &[Message],
        _region: Region,
        _summary_hint: Option<&str>,
        _analysis: &AnalysisState,
        _severity: Severity,
        on_stream: OnStream<'_>,
        _medical_context: Option<&str>,
    ) -> AiResult<String> {
        *self.report_calls.lock().unwrap() += 1;
        if let Ok(content) = &self.report {
            on_stream(content, content);
        }
        self.report.clone()
    }

    fn analyze_image_with_vision(
        &self,
        _base64: &str,
        filename: &str,
        _region: Region,
        on_stream: OnStream<'_>,
    ) -> AiResult<String> {
        let content = format!("The photo {} shows mild redness.", filename);
        on_stream(&content, &content);
        Ok(content)
    }
}

fn engine_with(
    service: Arc<ScriptedService>,
    policy: MergePolicy,
) -> (TriageEngine, Arc<EventLog>) {
    let config = TriageConfig {
        merge_policy: policy,
        ..TriageConfig::default()
    };
    let log = Arc::new(EventLog::new());
    let engine = TriageEngine::new(service, &config).with_observer(log.clone());
    (engine, log)
}

#[test]
fn test_full_intake_generates_report() {
    let service = Arc::new(
        ScriptedService::new(Scope::Transcript)
            .reply("How old is she?", Some(Severity::Mild))
            .reply("Is she eating?", Some(Severity::Moderate))
            .reply("Thanks, I have what I need.", None),
    );
    let (engine, log) = engine_with(service.clone(), MergePolicy::Recompute);
    let mut session = TriageSession::new(Region::AU);
    let id = session.start_new_chat();

    let first = engine
        .send_message(&mut session, &id, "My dog has been vomiting since yesterday", None)
        .unwrap();
    assert!(first.report.is_none());
    assert_eq!(session.current_analysis().completed_criteria, 3);
    assert_eq!(session.current_severity(), Severity::Mild);

    engine
        .send_message(&mut session, &id, "She is 4 years old and not eating", None)
        .unwrap();
    assert_eq!(session.current_analysis().completed_criteria, 5);
    assert!(!session.case(&id).unwrap().locked);

    let last = engine
        .send_message(&mut session, &id, "She seems quiet and has no known conditions", None)
        .unwrap();
    assert!(last.report.unwrap().is_generated());

    let case = session.case(&id).unwrap();
    assert!(case.locked);
    assert!(!case.accepts_input());
    assert_eq!(case.analysis.progress_percentage, 100);
    assert_eq!(case.successful_report_count(), 1);
    assert_eq!(case.messages.last().unwrap().kind, MessageKind::Soap);
    assert_eq!(service.report_calls(), 1);
    assert_eq!(log.count(|e| matches!(e, TriageEvent::CaseLocked { .. })), 1);
}

#[test]
fn test_vomiting_intake_progress_is_monotonic() {
    let service = Arc::new(ScriptedService::new(Scope::Transcript));
    let (engine, log) = engine_with(service, MergePolicy::Monotonic);
    let mut session = TriageSession::new(Region::AU);
    let id = session.start_new_chat();

    let mut progress = Vec::new();
    for turn in [
        "My dog has been vomiting for 2 days",
        "He is a kelpie",
        "He is 5 years old",
    ] {
        engine.send_message(&mut session, &id, turn, None).unwrap();
        progress.push(session.case(&id).unwrap().analysis.completed_criteria);
    }
    assert_eq!(progress, vec![3, 3, 4]);

    let analysis = &session.case(&id).unwrap().analysis;
    assert!(analysis.criteria.pet_species);
    assert!(analysis.criteria.main_symptoms);
    assert!(analysis.criteria.symptom_duration);
    assert!(analysis.criteria.pet_age);
    assert!(!analysis.criteria.eating_drinking);
    assert!(!analysis.is_complete());
    assert_eq!(session.current_analysis(), analysis);

    // Every published update is at least the one before it
    let published: Vec<u8> = log
        .events()
        .iter()
        .filter_map(|e| match e {
            TriageEvent::AnalysisUpdated { analysis, .. } => Some(analysis.completed_criteria),
            _ => None,
        })
        .collect();
    assert!(!published.is_empty());
    assert!(published.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(published.last(), Some(&4));
}

#[test]
fn test_emergency_raised_once_and_overrides_reply_severity() {
    let service = Arc::new(
        ScriptedService::new(Scope::Transcript)
            .reply("Please go to an emergency vet now.", Some(Severity::Mild))
            .reply("Please don't wait.", Some(Severity::Mild)),
    );
    let (engine, log) = engine_with(service, MergePolicy::Recompute);
    let mut session = TriageSession::new(Region::NZ);
    let id = session.start_new_chat();

    let first = engine
        .send_message(&mut session, &id, "My puppy ate rat bait", None)
        .unwrap();
    assert!(first.emergency_raised);
    assert_eq!(session.case(&id).unwrap().severity, Severity::Emergency);

    let second = engine
        .send_message(&mut session, &id, "He is shaking", None)
        .unwrap();
    assert!(!second.emergency_raised);
    assert_eq!(session.case(&id).unwrap().severity, Severity::Emergency);
    assert_eq!(log.count(|e| matches!(e, TriageEvent::EmergencyAlert { .. })), 1);
}

#[test]
fn test_recompute_retracts_criteria_monotonic_keeps_them() {
    let turns = [
        "My cat is 2 years old",
        "She keeps sneezing",
    ];

    let mut results = Vec::new();
    for policy in [MergePolicy::Recompute, MergePolicy::Monotonic] {
        let service = Arc::new(ScriptedService::new(Scope::LastMessage));
        let (engine, _) = engine_with(service, policy);
        let mut session = TriageSession::new(Region::AU);
        let id = session.start_new_chat();
        for turn in turns {
            engine.send_message(&mut session, &id, turn, None).unwrap();
        }
        results.push(session.case(&id).unwrap().analysis.clone());
    }

    let (recompute, monotonic) = (&results[0], &results[1]);
    assert!(!recompute.criteria.pet_age);
    assert!(recompute.criteria.main_symptoms);
    assert!(monotonic.criteria.pet_age);
    assert!(monotonic.criteria.pet_species);
    assert!(monotonic.criteria.main_symptoms);
    assert!(monotonic.completed_criteria > recompute.completed_criteria);
}

#[test]
fn test_auth_failure_closes_input() {
    let service = Arc::new(
        ScriptedService::new(Scope::Transcript).failing_reply(AiError::Auth("401".into())),
    );
    let (engine, log) = engine_with(service, MergePolicy::Recompute);
    let mut session = TriageSession::new(Region::AU);
    let id = session.start_new_chat();

    let outcome = engine
        .send_message(&mut session, &id, "My dog is limping", None)
        .unwrap();
    assert!(matches!(outcome.reply_error, Some(AiError::Auth(_))));

    let case = session.case(&id).unwrap();
    let notice = case.message(&outcome.reply_message_id).unwrap();
    assert_eq!(notice.kind, MessageKind::System);
    assert!(notice.is_error);
    assert!(!case.accepts_input());
    assert!(!case.locked);
    assert_eq!(log.count(|e| matches!(e, TriageEvent::InputClosed { .. })), 1);
}

#[test]
fn test_transient_failure_keeps_case_open() {
    let service = Arc::new(
        ScriptedService::new(Scope::Transcript)
            .failing_reply(AiError::RateLimited)
            .reply("Sorry about that. How long has this been going on?", None),
    );
    let (engine, _) = engine_with(service, MergePolicy::Recompute);
    let mut session = TriageSession::new(Region::AU);
    let id = session.start_new_chat();

    let first = engine
        .send_message(&mut session, &id, "My rabbit is not eating", None)
        .unwrap();
    assert_eq!(first.reply_error, Some(AiError::RateLimited));
    assert!(session.case(&id).unwrap().accepts_input());

    let second = engine
        .send_message(&mut session, &id, "Since this morning", None)
        .unwrap();
    assert!(second.reply_error.is_none());
}

#[test]
fn test_failed_report_can_be_retried() {
    let service = Arc::new(
        ScriptedService::new(Scope::Transcript).failing_report(AiError::Server("503".into())),
    );
    let (engine, _) = engine_with(service.clone(), MergePolicy::Recompute);
    let mut session = TriageSession::new(Region::AU);
    let id = session.start_new_chat();
    engine
        .send_message(&mut session, &id, "My cat is sneezing", None)
        .unwrap();

    let outcome = engine.generate_report(&mut session, &id, None).unwrap();
    assert!(!outcome.is_generated());

    let case = session.case(&id).unwrap();
    assert!(!case.locked);
    assert_eq!(case.successful_report_count(), 0);
    let failed = case.messages.last().unwrap();
    assert_eq!(failed.kind, MessageKind::Soap);
    assert!(failed.is_error);
    assert!(failed.content.starts_with("We couldn't generate your Health Report."));
    assert_eq!(service.report_calls(), 1);
}

#[test]
fn test_image_turn() {
    let service = Arc::new(ScriptedService::new(Scope::Transcript));
    let (engine, _) = engine_with(service, MergePolicy::Recompute);
    let mut session = TriageSession::new(Region::AU);
    let id = session.start_new_chat();

    // "hello" in base64
    let outcome = engine
        .send_image(&mut session, &id, "data:image/png;base64,aGVsbG8=", "paw.png")
        .unwrap();

    let case = session.case(&id).unwrap();
    let image = case.message(&outcome.user_message_id).unwrap();
    assert_eq!(image.kind, MessageKind::Image);
    assert_eq!(image.filename.as_deref(), Some("paw.png"));
    let reply = case.message(&outcome.reply_message_id).unwrap();
    assert_eq!(reply.content, "The photo paw.png shows mild redness.");
    assert!(!reply.streaming);
}

#[test]
fn test_cases_are_independent() {
    let service = Arc::new(
        ScriptedService::new(Scope::Transcript).reply("Noted.", Some(Severity::Moderate)),
    );
    let (engine, _) = engine_with(service, MergePolicy::Recompute);
    let mut session = TriageSession::new(Region::AU);
    let first = session.start_new_chat();
    let second = session.start_new_chat();

    engine
        .send_message(&mut session, &first, "My dog is coughing", None)
        .unwrap();

    assert_eq!(session.case(&first).unwrap().severity, Severity::Moderate);
    assert_eq!(session.case(&second).unwrap().severity, Severity::Unassessed);
    assert_eq!(session.case(&second).unwrap().messages.len(), 1);
}
