//! The triage conversation state machine.
//!
//! - [`TriageSession`]: all cases plus the active-case state
//! - case management on the session (`start_new_chat`, `rename_chat`, ...)
//! - [`CriteriaAnalyzer`]: merges classifier output into a case
//! - [`TriageEngine`]: runs turns and generates the Health Report

mod analyzer;
mod cases;
mod engine;
mod events;
mod session;

pub use analyzer::*;
pub use cases::*;
pub use engine::*;
pub use events::*;
pub use session::*;

use thiserror::Error;

use crate::ai::AiError;

/// Triage errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TriageError {
    #[error("Case not found: {0}")]
    CaseNotFound(String),

    #[error("Case {0} is locked: its Health Report has been generated")]
    CaseLocked(String),

    #[error("Case {0} no longer accepts messages: the AI service is unavailable")]
    ServiceUnavailable(String),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Invalid title: {0}")]
    InvalidTitle(String),

    #[error("Case {0} already has a Health Report")]
    ReportAlreadyGenerated(String),

    #[error("Case {0} has no Health Report")]
    NoReport(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Image is {size} bytes, limit is {max}")]
    ImageTooLarge { size: usize, max: usize },

    #[error(transparent)]
    Ai(#[from] AiError),
}

pub type TriageResult<T> = Result<T, TriageError>;
