//! Severity labels and the Health Report artifact.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::analysis::AnalysisState;
use super::region::Region;

/// Coarse urgency assessed for a case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Severity {
    /// No assessment yet
    #[default]
    Unassessed,
    Mild,
    Moderate,
    Serious,
    Emergency,
    /// The AI service failed; the case no longer accepts input
    #[serde(rename = "AI Service Unavailable")]
    ServiceUnavailable,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Unassessed => "Unassessed",
            Severity::Mild => "Mild",
            Severity::Moderate => "Moderate",
            Severity::Serious => "Serious",
            Severity::Emergency => "Emergency",
            Severity::ServiceUnavailable => "AI Service Unavailable",
        }
    }

    /// Parse a label produced by the model. Only real assessments parse.
    pub fn parse_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "mild" | "low" => Some(Severity::Mild),
            "moderate" | "medium" => Some(Severity::Moderate),
            "serious" | "high" | "urgent" => Some(Severity::Serious),
            "emergency" | "critical" => Some(Severity::Emergency),
            _ => None,
        }
    }

    /// Urgency ordering; `None` for labels that are not assessments.
    pub fn urgency(self) -> Option<u8> {
        match self {
            Severity::Mild => Some(1),
            Severity::Moderate => Some(2),
            Severity::Serious => Some(3),
            Severity::Emergency => Some(4),
            Severity::Unassessed | Severity::ServiceUnavailable => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The generated Health Report. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Unique report ID
    pub id: String,
    /// Creation timestamp
    pub created_at: String,
    /// Region the report was written for
    pub region: Region,
    /// SOAP-formatted report text
    pub content: String,
    /// Analysis at the time of generation
    pub analysis: AnalysisState,
    /// Severity at the time of generation
    pub severity: Severity,
    /// SHA-256 of `content`, hex encoded
    pub content_hash: String,
}

impl Report {
    pub fn new(region: Region, content: String, analysis: AnalysisState, severity: Severity) -> Self {
        let content_hash = hash_content(&content);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            region,
            content,
            analysis,
            severity,
            content_hash,
        }
    }

    /// Check that the content still matches its hash.
    pub fn verify(&self) -> bool {
        hash_content(&self.content) == self.content_hash
    }
}

/// Hash report content.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
