//! Health Report export for sharing with a vet.

use serde::{Deserialize, Serialize};

use crate::models::{Case, Criterion, Report};
use crate::triage::{TriageError, TriageResult, TriageSession};

/// Health Report export for a single case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReportExport {
    /// Export metadata
    pub metadata: ReportMetadata,
    /// Intake coverage at generation time
    pub criteria: Vec<CriterionLine>,
    /// SOAP report text
    pub content: String,
}

/// Health Report export metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Case ID for traceability
    pub case_id: String,
    /// Case title
    pub title: String,
    pub report_id: String,
    /// Region code
    pub region: String,
    /// Severity label
    pub severity: String,
    /// Report creation timestamp
    pub created_at: String,
    /// Export timestamp
    pub exported_at: String,
    /// SHA-256 of the report content
    pub content_hash: String,
    /// Intake progress (0..=100)
    pub progress_percentage: u8,
}

/// One intake criterion and whether it was established.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionLine {
    pub label: String,
    pub established: bool,
}

impl HealthReportExport {
    /// Build an export from a case and its report.
    pub fn from_report(case: &Case, report: &Report) -> Self {
        let criteria = Criterion::TRACKED
            .iter()
            .map(|c| CriterionLine {
                label: c.label().to_string(),
                established: report.analysis.criteria.get(*c),
            })
            .collect();

        Self {
            metadata: ReportMetadata {
                case_id: case.id.clone(),
                title: case.title.clone(),
                report_id: report.id.clone(),
                region: report.region.to_string(),
                severity: report.severity.label().to_string(),
                created_at: report.created_at.clone(),
                exported_at: chrono::Utc::now().to_rfc3339(),
                content_hash: report.content_hash.clone(),
                progress_percentage: report.analysis.progress_percentage,
            },
            criteria,
            content: report.content.clone(),
        }
    }

    /// Export of a case's report, if it has one.
    pub fn from_case(case: &Case) -> Option<Self> {
        case.health_report
            .as_ref()
            .map(|report| Self::from_report(case, report))
    }

    /// Check the content against the recorded hash.
    pub fn verify(&self) -> bool {
        crate::models::hash_content(&self.content) == self.metadata.content_hash
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to Markdown.
    pub fn to_markdown(&self) -> String {
        let meta = &self.metadata;
        let mut md = String::new();

        md.push_str(&format!("# Health Report: {}\n\n", meta.title));
        md.push_str(&format!("- Severity: **{}**\n", meta.severity));
        md.push_str(&format!("- Region: {}\n", meta.region));
        md.push_str(&format!("- Generated: {}\n", meta.created_at));
        md.push_str(&format!("- Intake coverage: {}%\n\n", meta.progress_percentage));

        md.push_str("## Intake\n\n");
        for line in &self.criteria {
            let mark = if line.established { "x" } else { " " };
            md.push_str(&format!("- [{}] {}\n", mark, line.label));
        }

        md.push('\n');
        md.push_str(self.content.trim());
        md.push_str("\n\n---\n");
        md.push_str(&format!(
            "Report {} · SHA-256 {}\n",
            meta.report_id, meta.content_hash
        ));
        md
    }
}

/// Batch Health Report export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReportExport {
    /// Export timestamp
    pub exported_at: String,
    /// Individual report exports
    pub reports: Vec<HealthReportExport>,
}

impl BatchReportExport {
    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// One summary row per report.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("case_id,title,report_id,region,severity,created_at,content_hash\n");

        for export in &self.reports {
            let meta = &export.metadata;
            csv.push_str(&format!(
                "{},{},{},{},{},{},{}\n",
                escape_csv(&meta.case_id),
                escape_csv(&meta.title),
                escape_csv(&meta.report_id),
                escape_csv(&meta.region),
                escape_csv(&meta.severity),
                escape_csv(&meta.created_at),
                escape_csv(&meta.content_hash),
            ));
        }

        csv
    }
}

/// Health Report exporter.
pub struct ReportExporter<'a> {
    session: &'a TriageSession,
}

impl<'a> ReportExporter<'a> {
    pub fn new(session: &'a TriageSession) -> Self {
        Self { session }
    }

    /// Export one case's report.
    pub fn export_case(&self, case_id: &str) -> TriageResult<HealthReportExport> {
        let case = self
            .session
            .case(case_id)
            .ok_or_else(|| TriageError::CaseNotFound(case_id.to_string()))?;
        HealthReportExport::from_case(case)
            .ok_or_else(|| TriageError::NoReport(case_id.to_string()))
    }

    /// Export every generated report.
    pub fn export_all(&self) -> BatchReportExport {
        BatchReportExport {
            exported_at: chrono::Utc::now().to_rfc3339(),
            reports: self
                .session
                .cases()
                .iter()
                .filter_map(HealthReportExport::from_case)
                .collect(),
        }
    }
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisState, Criteria, Region, Severity};

    fn session_with_report() -> (TriageSession, String) {
        let mut session = TriageSession::new(Region::NZ);
        let id = session.start_new_chat();
        session.rename_chat(&id, "Milo, sneezing").unwrap();

        let mut criteria = Criteria::default();
        criteria.pet_species = true;
        criteria.main_symptoms = true;
        let report = Report::new(
            Region::NZ,
            "## Subjective\nSneezing for 3 days".into(),
            AnalysisState::from_criteria(criteria, false),
            Severity::Mild,
        );
        session.case_mut(&id).unwrap().attach_report(report);
        session.start_new_chat();
        (session, id)
    }

    #[test]
    fn test_export_case() {
        let (session, id) = session_with_report();
        let export = ReportExporter::new(&session).export_case(&id).unwrap();

        assert_eq!(export.metadata.region, "NZ");
        assert_eq!(export.metadata.severity, "Mild");
        assert_eq!(export.metadata.progress_percentage, 29);
        assert_eq!(export.criteria.len(), 7);
        assert!(export.verify());
    }

    #[test]
    fn test_case_without_report() {
        let (session, _) = session_with_report();
        let empty = session.cases()[0].id.clone();
        assert!(matches!(
            ReportExporter::new(&session).export_case(&empty),
            Err(TriageError::NoReport(_))
        ));
    }

    #[test]
    fn test_markdown() {
        let (session, id) = session_with_report();
        let md = ReportExporter::new(&session).export_case(&id).unwrap().to_markdown();

        assert!(md.starts_with("# Health Report: Milo, sneezing"));
        assert!(md.contains("- [x] Pet species"));
        assert!(md.contains("- [ ] Pet age"));
        assert!(md.contains("## Subjective"));
    }

    #[test]
    fn test_batch_csv() {
        let (session, _) = session_with_report();
        let batch = ReportExporter::new(&session).export_all();
        assert_eq!(batch.reports.len(), 1);

        let csv = batch.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"Milo, sneezing\""));
    }

    #[test]
    fn test_tampered_export_fails_verify() {
        let (session, id) = session_with_report();
        let mut export = ReportExporter::new(&session).export_case(&id).unwrap();
        export.content.push_str("\nextra");
        assert!(!export.verify());
    }
}
