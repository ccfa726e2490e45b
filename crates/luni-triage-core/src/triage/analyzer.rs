//! Criteria analysis and the emergency latch.

use serde::{Deserialize, Serialize};

use crate::ai::{AiResult, CriteriaAssessment, TriageService};
use crate::models::{AnalysisState, Case, Message, Severity};

/// How a fresh classification combines with the previous one.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Take the fresh classification as is; criteria may flip back to false
    #[default]
    Recompute,
    /// Keep every criterion ever established
    Monotonic,
}

/// What applying an assessment changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedAnalysis {
    /// The emergency popup should open now
    pub emergency_raised: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CriteriaAnalyzer {
    policy: MergePolicy,
}

impl CriteriaAnalyzer {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Classify the whole transcript, seeded with the previous state.
    pub fn analyze(
        &self,
        service: &dyn TriageService,
        messages: &[Message],
        previous: &AnalysisState,
    ) -> AiResult<CriteriaAssessment> {
        let mut assessment = service.analyze_completion_criteria(messages, Some(previous))?;
        assessment.analysis = self.merge(previous, assessment.analysis);
        Ok(assessment)
    }

    pub fn merge(&self, previous: &AnalysisState, fresh: AnalysisState) -> AnalysisState {
        match self.policy {
            MergePolicy::Recompute => fresh,
            MergePolicy::Monotonic => AnalysisState::from_criteria(
                previous.criteria.union(&fresh.criteria),
                previous.emergency_detected || fresh.emergency_detected,
            ),
        }
    }

    /// Store an assessment on a case.
    ///
    /// The emergency popup opens only the first time an emergency is seen in
    /// a case.
    pub fn apply(case: &mut Case, assessment: CriteriaAssessment) -> AppliedAnalysis {
        let emergency = assessment.analysis.emergency_detected;
        case.analysis = assessment.analysis;

        if let Some(severity) = assessment.severity {
            case.severity = severity;
        } else if emergency {
            case.severity = Severity::Emergency;
        }

        let emergency_raised = emergency && !case.emergency_popup_shown;
        if emergency_raised {
            case.emergency_popup_shown = true;
        }
        AppliedAnalysis { emergency_raised }
    }
}
