//! Case management: create, select, rename and delete.

use tracing::info;

use super::{TriageError, TriageResult, TriageSession};
use crate::models::{Case, Message, Region};

/// A delete awaiting confirmation.
///
/// Returned by [`TriageSession::request_delete`]; nothing is removed until it
/// is passed to [`TriageSession::confirm_delete`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a delete request does nothing until confirmed"]
pub struct PendingDelete {
    pub case_id: String,
    /// Title to show in the confirmation prompt
    pub title: String,
}

impl TriageSession {
    /// Start a case with its greeting and make it active. Returns the case ID.
    pub fn start_new_chat(&mut self) -> String {
        let title = format!("Case {}", self.cases.len() + 1);
        let mut case = Case::new(title, self.region);
        case.push(Message::ai(self.region.greeting()));

        let id = case.id.clone();
        info!(case_id = %id, region = %self.region, "Started new case");

        self.cases.insert(0, case);
        self.current_case_id = Some(id.clone());
        self.sync_current(&id);
        id
    }

    /// Make a case active.
    pub fn select_chat(&mut self, case_id: &str) -> TriageResult<()> {
        if self.case(case_id).is_none() {
            return Err(TriageError::CaseNotFound(case_id.to_string()));
        }
        self.current_case_id = Some(case_id.to_string());
        self.sync_current(case_id);
        Ok(())
    }

    /// Rename a case. The title is trimmed and must not be empty.
    pub fn rename_chat(&mut self, case_id: &str, title: &str) -> TriageResult<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TriageError::InvalidTitle("title cannot be empty".into()));
        }
        self.case_mut(case_id)?.title = title.to_string();
        Ok(())
    }

    /// First step of deleting a case.
    pub fn request_delete(&self, case_id: &str) -> TriageResult<PendingDelete> {
        let case = self
            .case(case_id)
            .ok_or_else(|| TriageError::CaseNotFound(case_id.to_string()))?;
        Ok(PendingDelete {
            case_id: case.id.clone(),
            title: case.title.clone(),
        })
    }

    /// Delete a case for good. Deleting the active case clears the active state.
    pub fn confirm_delete(&mut self, pending: PendingDelete) -> TriageResult<Case> {
        let index = self
            .cases
            .iter()
            .position(|c| c.id == pending.case_id)
            .ok_or_else(|| TriageError::CaseNotFound(pending.case_id.clone()))?;

        let removed = self.cases.remove(index);
        if self.current_case_id.as_deref() == Some(removed.id.as_str()) {
            self.reset_active();
        }

        info!(case_id = %removed.id, "Deleted case");
        Ok(removed)
    }

    /// Region for new cases. Existing cases keep theirs.
    pub fn set_region(&mut self, region: Region) {
        self.region = region;
    }
}
