//! Prompts for the Luni triage conversation.
//!
//! Four prompt families: the conversational triage reply, the intake
//! criteria classifier (JSON output), the SOAP-style health report, and
//! photo analysis.

/// Marker the triage model appends once it has enough to write a report.
pub const READY_FOR_REPORT_MARKER: &str = "[READY_FOR_REPORT]";

/// Prefix of the severity marker, e.g. `[SEVERITY: Moderate]`.
pub const SEVERITY_MARKER_PREFIX: &str = "[SEVERITY:";

/// Regional framing passed into prompts.
#[derive(Debug, Clone, Copy)]
pub struct PromptRegion<'a> {
    /// Display name, e.g. "Australia"
    pub country: &'a str,
    /// Veterinary authority, e.g. "Australian Veterinary Association"
    pub authority: &'a str,
    /// Emergency contact advice
    pub emergency_advice: &'a str,
}

/// System prompt for the conversational triage assistant.
pub fn make_triage_system_prompt(
    region: PromptRegion<'_>,
    analysis_summary: Option<&str>,
    medical_context: Option<&str>,
) -> String {
    let mut prompt = format!(
        r#"You are Luni, a warm and careful veterinary triage assistant for pet owners in {country}.

Your job is to understand what is happening with the pet, one or two questions at a time.
You need to establish:
- the pet's species
- the pet's age
- the main symptoms
- how long the symptoms have been present
- whether the pet is eating and drinking normally
- any behaviour changes
- relevant medical history

Rules:
- Never diagnose or prescribe. Suggest seeing a vet registered with the {authority} when appropriate.
- If anything suggests an emergency, say so immediately: {emergency}
- Keep replies short and plain.
- End every reply with a severity marker: {severity_prefix} Mild|Moderate|Serious|Emergency]
- When all of the facts above are known, end with {ready} on its own line."#,
        country = region.country,
        authority = region.authority,
        emergency = region.emergency_advice,
        severity_prefix = SEVERITY_MARKER_PREFIX,
        ready = READY_FOR_REPORT_MARKER,
    );

    if let Some(summary) = analysis_summary {
        prompt.push_str("\n\nAssessment progress so far:\n");
        prompt.push_str(summary);
    }
    if let Some(context) = medical_context {
        prompt.push_str("\n\nKnown medical record for this pet:\n");
        prompt.push_str(context);
    }
    prompt
}

/// System prompt for the intake criteria classifier.
pub const CRITERIA_SYSTEM_PROMPT: &str = r#"You classify veterinary triage conversations.

Read the conversation between a pet owner and the assistant and decide which intake facts
the owner has clearly provided. Respond with JSON only:

{"criteria":{"pet_species":bool,"pet_age":bool,"main_symptoms":bool,"symptom_duration":bool,
"eating_drinking":bool,"behavior_changes":bool,"medical_history":bool,"pet_breed":bool,
"pet_weight":bool,"current_medications":bool},"emergency_detected":bool,
"severity":"Mild"|"Moderate"|"Serious"|"Emergency"|null}

Set emergency_detected when the owner describes collapse, breathing difficulty, seizures,
poisoning, heavy bleeding, trauma, bloat or inability to urinate."#;

/// User prompt for the criteria classifier.
pub fn make_criteria_prompt(transcript: &str, previous_analysis_json: Option<&str>) -> String {
    let mut prompt = String::new();
    if let Some(previous) = previous_analysis_json {
        prompt.push_str("Previous classification (for continuity, re-check every flag):\n");
        prompt.push_str(previous);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Conversation:\n");
    prompt.push_str(transcript);
    prompt
}

/// System prompt for the health report.
pub fn make_report_system_prompt(region: PromptRegion<'_>) -> String {
    format!(
        r#"You are a veterinary triage assistant writing a Health Report for a pet owner in {country}.

Write the report in SOAP structure with these headings:
## Subjective
## Objective
## Assessment
## Plan

Use only facts from the conversation. State the urgency clearly. The Plan must recommend
an appropriate next step with a vet registered with the {authority}. Do not diagnose."#,
        country = region.country,
        authority = region.authority,
    )
}

/// User prompt for the health report.
pub fn make_report_prompt(
    transcript: &str,
    summary_hint: Option<&str>,
    analysis_summary: &str,
    severity: &str,
    medical_context: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Assessed severity: {}\n\nIntake coverage:\n{}\n",
        severity, analysis_summary
    );
    if let Some(hint) = summary_hint {
        prompt.push_str("\nAssistant's closing summary:\n");
        prompt.push_str(hint);
        prompt.push('\n');
    }
    if let Some(context) = medical_context {
        prompt.push_str("\nMedical record:\n");
        prompt.push_str(context);
        prompt.push('\n');
    }
    prompt.push_str("\nConversation:\n");
    prompt.push_str(transcript);
    prompt
}

/// System prompt for photo analysis.
pub fn make_vision_system_prompt(region: PromptRegion<'_>) -> String {
    format!(
        r#"You are Luni, a veterinary triage assistant for pet owners in {country}.
Describe what is visible in the owner's photo that may matter for the pet's health, in plain words.
Do not diagnose. If the photo suggests an emergency, say so: {emergency}
Finish with one question that helps the triage continue."#,
        country = region.country,
        emergency = region.emergency_advice,
    )
}

/// User prompt accompanying a photo.
pub fn make_vision_prompt(filename: &str) -> String {
    format!("The owner uploaded a photo named \"{}\". What do you see?", filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn au() -> PromptRegion<'static> {
        PromptRegion {
            country: "Australia",
            authority: "Australian Veterinary Association",
            emergency_advice: "contact your nearest 24-hour emergency vet now",
        }
    }

    #[test]
    fn test_triage_prompt_mentions_region_and_markers() {
        let prompt = make_triage_system_prompt(au(), None, None);
        assert!(prompt.contains("Australia"));
        assert!(prompt.contains("Australian Veterinary Association"));
        assert!(prompt.contains(READY_FOR_REPORT_MARKER));
        assert!(prompt.contains(SEVERITY_MARKER_PREFIX));
        assert!(!prompt.contains("Known medical record"));
    }

    #[test]
    fn test_triage_prompt_with_context() {
        let prompt = make_triage_system_prompt(au(), Some("3/7 criteria"), Some("Allergic to penicillin"));
        assert!(prompt.contains("3/7 criteria"));
        assert!(prompt.contains("Allergic to penicillin"));
    }

    #[test]
    fn test_criteria_prompt_includes_previous() {
        let prompt = make_criteria_prompt("Owner: my cat is sneezing", Some(r#"{"pet_species":true}"#));
        assert!(prompt.starts_with("Previous classification"));
        assert!(prompt.contains("my cat is sneezing"));

        let fresh = make_criteria_prompt("Owner: hi", None);
        assert!(fresh.starts_with("Conversation:"));
    }

    #[test]
    fn test_report_prompts() {
        let system = make_report_system_prompt(au());
        assert!(system.contains("## Subjective"));
        assert!(system.contains("## Plan"));

        let prompt = make_report_prompt("Owner: vomiting", Some("Likely gastritis"), "7/7", "Moderate", None);
        assert!(prompt.contains("Assessed severity: Moderate"));
        assert!(prompt.contains("Likely gastritis"));
        assert!(prompt.contains("Owner: vomiting"));
    }

    #[test]
    fn test_vision_prompt() {
        assert!(make_vision_prompt("paw.jpg").contains("paw.jpg"));
        assert!(make_vision_system_prompt(au()).contains("emergency vet"));
    }
}
