//! Conversation engine: owner turns, photo uploads and the Health Report.
//!
//! A turn appends the owner's message, then runs the criteria analysis on a
//! scoped thread while the reply streams on the calling thread. Results are
//! written back once both finish, analysis first, then the reply.

use std::sync::Arc;
use std::thread;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, info, instrument, warn};

use super::{CriteriaAnalyzer, NoopObserver, TriageError, TriageEvent, TriageObserver};
use super::{TriageResult, TriageSession};
use crate::ai::{AiError, TriageService};
use crate::config::TriageConfig;
use crate::models::{Case, Message, MessageKind, Report, Severity};

/// Result of a Health Report attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// Report attached; the case is locked
    Generated {
        report_id: String,
        message_id: String,
    },
    /// An error notice replaced the report; the case stays open
    Failed { message_id: String, error: AiError },
}

impl ReportOutcome {
    pub fn is_generated(&self) -> bool {
        matches!(self, ReportOutcome::Generated { .. })
    }
}

/// What happened during one owner turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub user_message_id: String,
    pub reply_message_id: String,
    pub reply_error: Option<AiError>,
    pub analysis_error: Option<AiError>,
    /// The emergency popup should open
    pub emergency_raised: bool,
    /// Set when the turn triggered the Health Report
    pub report: Option<ReportOutcome>,
}

pub struct TriageEngine {
    service: Arc<dyn TriageService>,
    analyzer: CriteriaAnalyzer,
    observer: Arc<dyn TriageObserver>,
    max_image_bytes: usize,
}

impl TriageEngine {
    pub fn new(service: Arc<dyn TriageService>, config: &TriageConfig) -> Self {
        Self {
            service,
            analyzer: CriteriaAnalyzer::new(config.merge_policy),
            observer: Arc::new(NoopObserver),
            max_image_bytes: config.max_image_bytes,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TriageObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn analyzer(&self) -> CriteriaAnalyzer {
        self.analyzer
    }

    /// Run one owner turn.
    #[instrument(skip(self, session, text, medical_context))]
    pub fn send_message(
        &self,
        session: &mut TriageSession,
        case_id: &str,
        text: &str,
        medical_context: Option<&str>,
    ) -> TriageResult<TurnOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TriageError::EmptyMessage);
        }

        let case = session.case_mut(case_id)?;
        ensure_accepts_input(case)?;

        let user_message_id = self.append(case, Message::user(text));
        let reply_message_id = self.append(case, Message::ai_placeholder());

        let messages = case.messages.clone();
        let previous = case.analysis.clone();
        let region = case.region;

        let service = self.service.as_ref();
        let analyzer = self.analyzer;
        let observer = self.observer.as_ref();

        let (analysis, reply) = thread::scope(|scope| {
            let analysis = scope.spawn(|| analyzer.analyze(service, &messages, &previous));

            let reply = service.generate_triage_response(
                &messages,
                region,
                Some(&previous),
                &mut |_, full| {
                    if let Some(placeholder) = case.message_mut(&reply_message_id) {
                        placeholder.content = full.to_string();
                    }
                    observer.on_event(&TriageEvent::MessageUpdated {
                        case_id: case_id.to_string(),
                        message_id: reply_message_id.clone(),
                        content: full.to_string(),
                    });
                },
                medical_context,
            );

            let analysis = analysis
                .join()
                .unwrap_or_else(|_| Err(AiError::Other("criteria analysis panicked".into())));
            (analysis, reply)
        });

        let mut emergency_raised = false;
        let analysis_error = match analysis {
            Ok(assessment) => {
                emergency_raised = CriteriaAnalyzer::apply(case, assessment).emergency_raised;
                debug!(
                    completed = case.analysis.completed_criteria,
                    stage = %case.analysis.stage,
                    "Analysis updated"
                );
                self.publish(TriageEvent::AnalysisUpdated {
                    case_id: case_id.to_string(),
                    analysis: case.analysis.clone(),
                });
                if emergency_raised {
                    warn!(case_id, "Emergency detected");
                    self.publish(TriageEvent::EmergencyAlert {
                        case_id: case_id.to_string(),
                    });
                }
                None
            }
            Err(e) => {
                warn!(case_id, error = %e, "Criteria analysis failed");
                case.severity = Severity::ServiceUnavailable;
                self.close_input(case, e.user_message());
                Some(e)
            }
        };

        let mut report_hint = None;
        let reply_error = match reply {
            Ok(reply) => {
                if let Some(message) = case.message_mut(&reply_message_id) {
                    message.finish(reply.content.clone());
                    message.severity = reply.severity;
                }
                if let Some(severity) = reply.severity {
                    if !case.service_unavailable && !case.analysis.emergency_detected {
                        case.severity = severity;
                    }
                }
                self.publish(TriageEvent::MessageUpdated {
                    case_id: case_id.to_string(),
                    message_id: reply_message_id.clone(),
                    content: reply.content.clone(),
                });
                if reply.should_generate_report || case.analysis.is_complete() {
                    report_hint = Some(reply.content);
                }
                None
            }
            Err(e) => {
                warn!(case_id, error = %e, "Triage reply failed");
                let notice = e.user_message();
                if let Some(message) = case.message_mut(&reply_message_id) {
                    message.fail(MessageKind::System, notice);
                }
                self.publish(TriageEvent::MessageUpdated {
                    case_id: case_id.to_string(),
                    message_id: reply_message_id.clone(),
                    content: notice.to_string(),
                });
                if e.locks_case() {
                    self.close_input(case, notice);
                }
                Some(e)
            }
        };

        let report = match report_hint {
            Some(hint) if case.health_report.is_none() && !case.service_unavailable => {
                info!(case_id, "Conversation ready for Health Report");
                Some(self.run_report(case, Some(&hint), medical_context))
            }
            _ => None,
        };

        session.sync_current(case_id);

        Ok(TurnOutcome {
            user_message_id,
            reply_message_id,
            reply_error,
            analysis_error,
            emergency_raised,
            report,
        })
    }

    /// Upload a photo and stream its analysis.
    ///
    /// `base64_data` may carry a `data:` URL prefix.
    #[instrument(skip(self, session, base64_data))]
    pub fn send_image(
        &self,
        session: &mut TriageSession,
        case_id: &str,
        base64_data: &str,
        filename: &str,
    ) -> TriageResult<TurnOutcome> {
        let case = session.case_mut(case_id)?;
        ensure_accepts_input(case)?;

        let payload = strip_data_url(base64_data.trim());
        let decoded = STANDARD
            .decode(payload)
            .map_err(|e| TriageError::InvalidImage(e.to_string()))?;
        if decoded.is_empty() {
            return Err(TriageError::InvalidImage("image is empty".into()));
        }
        if decoded.len() > self.max_image_bytes {
            return Err(TriageError::ImageTooLarge {
                size: decoded.len(),
                max: self.max_image_bytes,
            });
        }

        let filename = match filename.trim() {
            "" => "photo",
            name => name,
        };
        let user_message_id = self.append(case, Message::image(payload.to_string(), filename));
        let reply_message_id = self.append(case, Message::ai_placeholder());
        let region = case.region;
        let observer = self.observer.as_ref();

        let result = self.service.analyze_image_with_vision(
            payload,
            filename,
            region,
            &mut |_, full| {
                if let Some(placeholder) = case.message_mut(&reply_message_id) {
                    placeholder.content = full.to_string();
                }
                observer.on_event(&TriageEvent::MessageUpdated {
                    case_id: case_id.to_string(),
                    message_id: reply_message_id.clone(),
                    content: full.to_string(),
                });
            },
        );

        let (content, reply_error) = match result {
            Ok(text) => {
                if let Some(message) = case.message_mut(&reply_message_id) {
                    message.finish(text.clone());
                }
                (text, None)
            }
            Err(e) => {
                warn!(case_id, error = %e, "Photo analysis failed");
                let notice = e.user_message();
                if let Some(message) = case.message_mut(&reply_message_id) {
                    message.fail(MessageKind::System, notice);
                }
                if e.locks_case() {
                    self.close_input(case, notice);
                }
                (notice.to_string(), Some(e))
            }
        };
        self.publish(TriageEvent::MessageUpdated {
            case_id: case_id.to_string(),
            message_id: reply_message_id.clone(),
            content,
        });

        Ok(TurnOutcome {
            user_message_id,
            reply_message_id,
            reply_error,
            analysis_error: None,
            emergency_raised: false,
            report: None,
        })
    }

    /// Generate the Health Report on request.
    ///
    /// Fails with [`TriageError::ReportAlreadyGenerated`] if the case has one.
    /// A failed generation is reported in the outcome and can be retried.
    #[instrument(skip(self, session, medical_context))]
    pub fn generate_report(
        &self,
        session: &mut TriageSession,
        case_id: &str,
        medical_context: Option<&str>,
    ) -> TriageResult<ReportOutcome> {
        let case = session.case_mut(case_id)?;
        if case.health_report.is_some() {
            return Err(TriageError::ReportAlreadyGenerated(case_id.to_string()));
        }

        let hint = case
            .messages
            .iter()
            .rev()
            .find(|m| m.kind == MessageKind::Ai && m.is_conversational())
            .map(|m| m.content.clone());

        let outcome = self.run_report(case, hint.as_deref(), medical_context);
        session.sync_current(case_id);
        Ok(outcome)
    }

    fn run_report(
        &self,
        case: &mut Case,
        summary_hint: Option<&str>,
        medical_context: Option<&str>,
    ) -> ReportOutcome {
        let message_id = self.append(case, Message::soap_placeholder());
        let case_id = case.id.clone();
        let messages = case.messages.clone();
        let analysis = case.analysis.clone();
        let severity = case.severity;
        let region = case.region;
        let observer = self.observer.as_ref();

        let result = self.service.generate_health_report(
            &messages,
            region,
            summary_hint,
            &analysis,
            severity,
            &mut |_, full| {
                if let Some(placeholder) = case.message_mut(&message_id) {
                    placeholder.content = full.to_string();
                }
                observer.on_event(&TriageEvent::MessageUpdated {
                    case_id: case_id.clone(),
                    message_id: message_id.clone(),
                    content: full.to_string(),
                });
            },
            medical_context,
        );

        match result {
            Ok(content) => {
                if let Some(message) = case.message_mut(&message_id) {
                    message.finish(content.clone());
                    message.severity = Some(severity);
                }
                let report = Report::new(region, content.clone(), analysis, severity);
                let report_id = report.id.clone();

                if case.attach_report(report) {
                    info!(case_id = %case_id, report_id = %report_id, "Health Report generated, case locked");
                    self.publish(TriageEvent::MessageUpdated {
                        case_id: case_id.clone(),
                        message_id: message_id.clone(),
                        content,
                    });
                    self.publish(TriageEvent::CaseLocked {
                        case_id: case_id.clone(),
                        report_id: report_id.clone(),
                    });
                    ReportOutcome::Generated {
                        report_id,
                        message_id,
                    }
                } else {
                    self.fail_report(case, message_id, AiError::Other("report already attached".into()))
                }
            }
            Err(e) => self.fail_report(case, message_id, e),
        }
    }

    fn fail_report(&self, case: &mut Case, message_id: String, error: AiError) -> ReportOutcome {
        warn!(case_id = %case.id, error = %error, "Health Report generation failed");
        let notice = format!("We couldn't generate your Health Report. {}", error.user_message());
        if let Some(message) = case.message_mut(&message_id) {
            message.fail(MessageKind::Soap, notice.clone());
        }
        self.publish(TriageEvent::MessageUpdated {
            case_id: case.id.clone(),
            message_id: message_id.clone(),
            content: notice,
        });
        ReportOutcome::Failed { message_id, error }
    }

    fn append(&self, case: &mut Case, message: Message) -> String {
        let event = TriageEvent::MessageAppended {
            case_id: case.id.clone(),
            message: message.clone(),
        };
        let id = case.push(message);
        self.publish(event);
        id
    }

    fn close_input(&self, case: &mut Case, reason: &str) {
        case.service_unavailable = true;
        self.publish(TriageEvent::InputClosed {
            case_id: case.id.clone(),
            reason: reason.to_string(),
        });
    }

    fn publish(&self, event: TriageEvent) {
        self.observer.on_event(&event);
    }
}

fn ensure_accepts_input(case: &Case) -> TriageResult<()> {
    if case.locked {
        return Err(TriageError::CaseLocked(case.id.clone()));
    }
    if case.service_unavailable {
        return Err(TriageError::ServiceUnavailable(case.id.clone()));
    }
    Ok(())
}

fn strip_data_url(data: &str) -> &str {
    match data.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::LlmTriageService;
    use crate::models::Region;
    use crate::triage::EventLog;
    use luni_triage_llm::{LlmError, LlmResult, MockLlmClient};

    const ALL_CRITERIA: &str = r#"{"criteria":{"pet_species":true,"pet_age":true,
        "main_symptoms":true,"symptom_duration":true,"eating_drinking":true,
        "behavior_changes":true,"medical_history":true},"severity":"Moderate"}"#;

    const TWO_CRITERIA: &str = r#"{"criteria":{"pet_species":true,"main_symptoms":true}}"#;

    fn service(
        reply: &'static str,
        criteria: &'static str,
        report: LlmResult<&'static str>,
    ) -> Arc<dyn TriageService> {
        let client = MockLlmClient::with_responder(move |request| {
            if request.json_mode {
                Ok(criteria.to_string())
            } else if request.system.contains("Health Report") {
                report.clone().map(String::from)
            } else {
                Ok(reply.to_string())
            }
        });
        Arc::new(LlmTriageService::new(client))
    }

    fn engine(service: Arc<dyn TriageService>) -> (TriageEngine, Arc<EventLog>) {
        let log = Arc::new(EventLog::new());
        let engine = TriageEngine::new(service, &TriageConfig::default()).with_observer(log.clone());
        (engine, log)
    }

    fn session() -> (TriageSession, String) {
        let mut session = TriageSession::new(Region::AU);
        let id = session.start_new_chat();
        (session, id)
    }

    #[test]
    fn test_turn_appends_and_analyzes() {
        let (engine, log) = engine(service("How old is she? [SEVERITY: Mild]", TWO_CRITERIA, Ok("")));
        let (mut session, id) = session();

        let outcome = engine
            .send_message(&mut session, &id, "  My dog is vomiting  ", None)
            .unwrap();
        assert!(outcome.reply_error.is_none());
        assert!(outcome.report.is_none());

        let case = session.case(&id).unwrap();
        assert_eq!(case.messages.len(), 3);
        assert_eq!(case.messages[1].content, "My dog is vomiting");
        assert_eq!(case.messages[2].content, "How old is she?");
        assert!(!case.messages[2].streaming);
        assert_eq!(case.analysis.completed_criteria, 2);
        assert_eq!(case.severity, Severity::Mild);
        assert_eq!(session.current_analysis().completed_criteria, 2);

        // User message is published before any streamed content
        let events = log.events();
        assert!(matches!(&events[0], TriageEvent::MessageAppended { message, .. } if message.kind == MessageKind::User));
        assert!(log.count(|e| matches!(e, TriageEvent::MessageUpdated { .. })) > 1);
    }

    #[test]
    fn test_reply_cannot_claim_service_outage() {
        let (engine, _) = engine(service(
            "Tell me more. [SEVERITY: AI Service Unavailable]",
            TWO_CRITERIA,
            Ok(""),
        ));
        let (mut session, id) = session();
        engine
            .send_message(&mut session, &id, "My dog is vomiting", None)
            .unwrap();

        let case = session.case(&id).unwrap();
        assert_eq!(case.severity, Severity::Unassessed);
        assert_eq!(case.messages[2].content, "Tell me more.");
        assert!(case.accepts_input());
    }

    #[test]
    fn test_empty_message_rejected() {
        let (engine, _) = engine(service("ok", TWO_CRITERIA, Ok("")));
        let (mut session, id) = session();
        assert_eq!(
            engine.send_message(&mut session, &id, "   ", None),
            Err(TriageError::EmptyMessage)
        );
        assert_eq!(session.case(&id).unwrap().messages.len(), 1);
    }

    #[test]
    fn test_ready_marker_generates_report_and_locks() {
        let (engine, log) = engine(service(
            "Thanks, that's everything. [READY_FOR_REPORT]",
            TWO_CRITERIA,
            Ok("## Subjective\nVomiting"),
        ));
        let (mut session, id) = session();

        let outcome = engine.send_message(&mut session, &id, "She is 3 years old", None).unwrap();
        assert!(outcome.report.unwrap().is_generated());

        let case = session.case(&id).unwrap();
        assert!(case.locked);
        assert!(case.health_report.as_ref().unwrap().verify());
        assert_eq!(case.successful_report_count(), 1);
        assert_eq!(log.count(|e| matches!(e, TriageEvent::CaseLocked { .. })), 1);

        assert_eq!(
            engine.send_message(&mut session, &id, "one more thing", None),
            Err(TriageError::CaseLocked(id.clone()))
        );
        assert_eq!(
            engine.generate_report(&mut session, &id, None),
            Err(TriageError::ReportAlreadyGenerated(id))
        );
    }

    #[test]
    fn test_complete_analysis_triggers_report() {
        let (engine, _) = engine(service("Thank you.", ALL_CRITERIA, Ok("## Plan\nSee a vet")));
        let (mut session, id) = session();

        let outcome = engine.send_message(&mut session, &id, "All the details", None).unwrap();
        assert!(outcome.report.is_some());
        assert_eq!(session.case(&id).unwrap().analysis.stage, "Assessment Complete");
    }

    #[test]
    fn test_report_failure_leaves_case_open() {
        let (engine, _) = engine(service(
            "Done. [READY_FOR_REPORT]",
            TWO_CRITERIA,
            Err(LlmError::Server {
                status: 502,
                body: "bad gateway".into(),
            }),
        ));
        let (mut session, id) = session();

        let outcome = engine.send_message(&mut session, &id, "That's all", None).unwrap();
        assert!(matches!(outcome.report, Some(ReportOutcome::Failed { .. })));

        let case = session.case(&id).unwrap();
        assert!(!case.locked);
        assert!(case.health_report.is_none());
        let soap = case.messages.last().unwrap();
        assert_eq!(soap.kind, MessageKind::Soap);
        assert!(soap.is_error);
        assert_eq!(case.successful_report_count(), 0);
        assert!(case.accepts_input());
    }

    #[test]
    fn test_analysis_failure_closes_input() {
        let (engine, log) = engine(service("Tell me more.", "not json at all", Ok("")));
        let (mut session, id) = session();

        let outcome = engine.send_message(&mut session, &id, "My cat is sneezing", None).unwrap();
        assert!(outcome.analysis_error.is_some());
        assert!(outcome.reply_error.is_none());

        let case = session.case(&id).unwrap();
        assert_eq!(case.severity, Severity::ServiceUnavailable);
        assert!(!case.locked);
        assert!(!case.accepts_input());
        assert_eq!(session.current_severity(), Severity::ServiceUnavailable);
        assert_eq!(log.count(|e| matches!(e, TriageEvent::InputClosed { .. })), 1);

        assert_eq!(
            engine.send_message(&mut session, &id, "hello?", None),
            Err(TriageError::ServiceUnavailable(id))
        );
    }

    #[test]
    fn test_reply_failure_becomes_system_message() {
        let client = MockLlmClient::with_responder(|request| {
            if request.json_mode {
                Ok(TWO_CRITERIA.to_string())
            } else {
                Err(LlmError::RateLimited)
            }
        });
        let (engine, _) = engine(Arc::new(LlmTriageService::new(client)));
        let (mut session, id) = session();

        let outcome = engine.send_message(&mut session, &id, "My dog is limping", None).unwrap();
        assert_eq!(outcome.reply_error, Some(AiError::RateLimited));

        let case = session.case(&id).unwrap();
        let notice = case.message(&outcome.reply_message_id).unwrap();
        assert_eq!(notice.kind, MessageKind::System);
        assert!(notice.is_error);
        assert_eq!(notice.content, AiError::RateLimited.user_message());
        assert!(case.accepts_input());
    }

    #[test]
    fn test_auth_failure_closes_input() {
        let (engine, _) = engine(Arc::new(LlmTriageService::new(MockLlmClient::failing(
            LlmError::Auth("401".into()),
        ))));
        let (mut session, id) = session();

        engine.send_message(&mut session, &id, "Hello", None).unwrap();
        let case = session.case(&id).unwrap();
        assert!(!case.accepts_input());
        assert!(!case.locked);
    }

    #[test]
    fn test_emergency_alert_once() {
        let (engine, log) = engine(service("Please go to a vet now.", r#"{"criteria":{}}"#, Ok("")));
        let (mut session, id) = session();

        let first = engine
            .send_message(&mut session, &id, "My dog collapsed", None)
            .unwrap();
        assert!(first.emergency_raised);
        let second = engine
            .send_message(&mut session, &id, "He collapsed again", None)
            .unwrap();
        assert!(!second.emergency_raised);

        assert_eq!(log.count(|e| matches!(e, TriageEvent::EmergencyAlert { .. })), 1);
        assert_eq!(session.case(&id).unwrap().severity, Severity::Emergency);
    }

    #[test]
    fn test_send_image() {
        let (engine, _) = engine(service("The paw looks swollen.", TWO_CRITERIA, Ok("")));
        let (mut session, id) = session();

        let outcome = engine
            .send_image(&mut session, &id, "data:image/png;base64,QUJD", "paw.png")
            .unwrap();
        let case = session.case(&id).unwrap();
        let image = case.message(&outcome.user_message_id).unwrap();
        assert_eq!(image.kind, MessageKind::Image);
        assert_eq!(image.image.as_deref(), Some("QUJD"));
        assert_eq!(
            case.message(&outcome.reply_message_id).unwrap().content,
            "The paw looks swollen."
        );
    }

    #[test]
    fn test_image_validation() {
        let (engine, _) = engine(service("ok", TWO_CRITERIA, Ok("")));
        let (mut session, id) = session();

        assert!(matches!(
            engine.send_image(&mut session, &id, "not base64!!", "a.jpg"),
            Err(TriageError::InvalidImage(_))
        ));

        let config = TriageConfig {
            max_image_bytes: 2,
            ..TriageConfig::default()
        };
        let small = TriageEngine::new(service("ok", TWO_CRITERIA, Ok("")), &config);
        assert_eq!(
            small.send_image(&mut session, &id, "QUJD", "a.jpg"),
            Err(TriageError::ImageTooLarge { size: 3, max: 2 })
        );
        assert_eq!(session.case(&id).unwrap().messages.len(), 1);
    }

    #[test]
    fn test_manual_report_uses_last_reply() {
        let (engine, _) = engine(service("Is he eating?", TWO_CRITERIA, Ok("## Assessment\nMild")));
        let (mut session, id) = session();
        engine.send_message(&mut session, &id, "Cough", None).unwrap();

        let outcome = engine.generate_report(&mut session, &id, None).unwrap();
        assert!(outcome.is_generated());
        assert!(session.case(&id).unwrap().locked);
    }

    #[test]
    fn test_unknown_case() {
        let (engine, _) = engine(service("ok", TWO_CRITERIA, Ok("")));
        let mut session = TriageSession::new(Region::AU);
        assert!(matches!(
            engine.send_message(&mut session, "nope", "hi", None),
            Err(TriageError::CaseNotFound(_))
        ));
    }
}
