//! Parsing of model output: classifier JSON and reply markers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prompts::{READY_FOR_REPORT_MARKER, SEVERITY_MARKER_PREFIX};

/// Extraction errors.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Raw criteria flags as reported by the classifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RawCriteria {
    pub pet_species: bool,
    pub pet_age: bool,
    pub main_symptoms: bool,
    pub symptom_duration: bool,
    pub eating_drinking: bool,
    pub behavior_changes: bool,
    pub medical_history: bool,
    pub pet_breed: bool,
    pub pet_weight: bool,
    pub current_medications: bool,
}

/// Classifier output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CriteriaOutput {
    pub criteria: RawCriteria,
    pub emergency_detected: bool,
    pub severity: Option<String>,
}

/// Parse classifier output JSON.
pub fn parse_criteria_output(text: &str) -> ExtractionResult<CriteriaOutput> {
    // Models sometimes wrap JSON in prose or code fences
    let json_start = text.find('{').ok_or_else(|| {
        ExtractionError::InvalidFormat("No JSON object found in response".into())
    })?;
    let json_end = text.rfind('}').ok_or_else(|| {
        ExtractionError::InvalidFormat("No closing brace found in response".into())
    })?;
    if json_end < json_start {
        return Err(ExtractionError::InvalidFormat(
            "Closing brace precedes opening brace".into(),
        ));
    }

    let output: CriteriaOutput = serde_json::from_str(&text[json_start..=json_end])?;
    Ok(output)
}

/// A triage reply with its control markers removed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyMarkers {
    /// Reply text shown to the owner
    pub content: String,
    /// Model signalled it has enough for a report
    pub ready_for_report: bool,
    /// Severity label from the marker, if present
    pub severity: Option<String>,
}

/// Strip `[READY_FOR_REPORT]` and `[SEVERITY: ...]` markers from a reply.
pub fn parse_reply_markers(reply: &str) -> ReplyMarkers {
    let ready_for_report = reply.contains(READY_FOR_REPORT_MARKER);
    let mut content = reply.replace(READY_FOR_REPORT_MARKER, "");
    let mut severity = None;

    while let Some(start) = content.find(SEVERITY_MARKER_PREFIX) {
        let Some(len) = content[start..].find(']') else {
            break;
        };
        let end = start + len;
        let label = content[start + SEVERITY_MARKER_PREFIX.len()..end].trim();
        if !label.is_empty() {
            severity = Some(label.to_string());
        }
        content.replace_range(start..=end, "");
    }

    ReplyMarkers {
        content: content.trim().to_string(),
        ready_for_report,
        severity,
    }
}

/// Strip markers from a partial streamed reply for display.
///
/// A marker may be split across chunks, so a trailing unterminated `[` is
/// held back until more text arrives.
pub fn display_text(partial: &str) -> String {
    let visible = match partial.rfind('[') {
        Some(pos) if !partial[pos..].contains(']') => &partial[..pos],
        _ => partial,
    };
    parse_reply_markers(visible).content
}

/// Keyword-based classifier used for emergency screening and offline tests.
///
/// Only ever reports facts that appear in the transcript, so running it over
/// a growing transcript never retracts a criterion.
pub struct KeywordClassifier;

const SPECIES: &[&str] = &[
    "dog", "puppy", "pup", "cat", "kitten", "rabbit", "bunny", "bird", "parrot", "guinea pig",
    "ferret", "horse", "hamster",
];

const SYMPTOMS: &[&str] = &[
    "vomit", "diarrh", "cough", "sneez", "limp", "itch", "scratch", "letharg", "bleed", "seiz",
    "swell", "lump", "rash", "pain", "discharge", "wheez", "fever",
];

const EATING: &[&str] = &["eating", "eaten", "eats", "drink", "appetite", "food", "water", "thirst"];

const BEHAVIOR: &[&str] = &[
    "behav", "letharg", "hiding", "energy", "playful", "restless", "sleeping", "tired", "quiet",
    "aggressive", "normal self",
];

const HISTORY: &[&str] = &[
    "history", "vaccin", "previous", "surgery", "condition", "diagnosed", "no known",
    "healthy before", "never had",
];

const MEDICATIONS: &[&str] = &["medication", "tablet", "pill", "prescribed", "taking"];

const BREEDS: &[&str] = &[
    "labrador", "retriever", "poodle", "terrier", "shepherd", "bulldog", "beagle", "spaniel",
    "kelpie", "cavoodle", "siamese", "persian", "ragdoll", "burmese", "tabby",
];

const EMERGENCY: &[&str] = &[
    "not breathing", "can't breathe", "cannot breathe", "difficulty breathing",
    "struggling to breathe", "collapsed", "collapse", "unconscious", "unresponsive", "seizure",
    "fitting", "poisoned", "poisoning", "ate poison", "ate chocolate", "rat bait", "snail bait", "snake bite", "snakebite",
    "tick paralysis", "hit by a car", "hit by car", "bleeding heavily", "won't stop bleeding",
    "bloated", "can't urinate", "cannot urinate", "straining to pee",
];

/// Words that cancel an emergency phrase shortly after them.
const NEGATIONS: &[&str] = &[
    "no", "not", "never", "without", "hasn't", "hadn't", "haven't", "isn't", "wasn't", "didn't",
    "doesn't", "hasnt", "isnt", "wasnt", "didnt", "doesnt",
];

/// How many words before a phrase are checked for a negation.
const NEGATION_WINDOW: usize = 3;

const TIME_UNITS: &[&str] = &[
    "hour", "hours", "day", "days", "week", "weeks", "month", "months", "year", "years", "yr",
    "yrs",
];

impl KeywordClassifier {
    /// Classify a transcript of owner messages.
    pub fn classify(transcript: &str) -> CriteriaOutput {
        let text = transcript.to_lowercase();
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'').to_string())
            .filter(|w| !w.is_empty())
            .collect();

        let (age, duration) = scan_time_phrases(&text, &words);
        let emergency_detected = Self::detect_emergency(&text);

        CriteriaOutput {
            criteria: RawCriteria {
                pet_species: contains_word(&words, SPECIES) || text.contains("guinea pig"),
                pet_age: age,
                main_symptoms: contains_any(&text, SYMPTOMS),
                symptom_duration: duration,
                eating_drinking: contains_any(&text, EATING),
                behavior_changes: contains_any(&text, BEHAVIOR),
                medical_history: contains_any(&text, HISTORY),
                pet_breed: contains_any(&text, BREEDS),
                pet_weight: words.iter().any(|w| w.ends_with("kg") || w == "kilos"),
                current_medications: contains_any(&text, MEDICATIONS),
            },
            emergency_detected,
            severity: emergency_detected.then(|| "Emergency".to_string()),
        }
    }

    /// True when the text contains an emergency phrase that is not negated,
    /// so "she collapsed" counts and "he has never had a seizure" does not.
    pub fn detect_emergency(text: &str) -> bool {
        let text = text.to_lowercase().replace('\u{2019}', "'");
        EMERGENCY.iter().any(|phrase| {
            text.match_indices(phrase)
                .any(|(at, _)| !is_negated(&text[..at]))
        })
    }
}

/// A negation among the last few words of the clause before a phrase.
fn is_negated(before: &str) -> bool {
    let clause = before
        .rsplit(|c: char| matches!(c, '.' | ',' | ';' | '!' | '?' | '\n'))
        .next()
        .unwrap_or(before);
    clause
        .split_whitespace()
        .rev()
        .take(NEGATION_WINDOW)
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
        .any(|w| NEGATIONS.contains(&w))
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

fn contains_word(words: &[String], needles: &[&str]) -> bool {
    words.iter().any(|w| {
        needles
            .iter()
            .any(|n| w == n || w.strip_suffix('s') == Some(*n))
    })
}

/// Detect (age, duration) from number + time-unit phrases.
///
/// "3 years old" is an age; "for 2 days" is a duration.
fn scan_time_phrases(text: &str, words: &[String]) -> (bool, bool) {
    let mut age = text.contains("years old")
        || text.contains("year old")
        || text.contains("months old")
        || text.contains("weeks old")
        || text.contains("aged ");
    let mut duration = text.contains("since")
        || text.contains("yesterday")
        || text.contains("last night")
        || text.contains("this morning");

    for (i, word) in words.iter().enumerate() {
        let (number_part, unit_part) = split_number(word);
        let unit = if !number_part.is_empty() && !unit_part.is_empty() {
            Some(unit_part)
        } else if is_number(word) {
            words.get(i + 1).map(|w| w.as_str())
        } else {
            None
        };

        let Some(unit) = unit else { continue };
        if !TIME_UNITS.contains(&unit) {
            continue;
        }
        let next_offset = if unit_part.is_empty() { 2 } else { 1 };
        let followed_by_old = words.get(i + next_offset).map(|w| w == "old").unwrap_or(false);
        if followed_by_old {
            age = true;
        } else {
            duration = true;
        }
    }

    (age, duration)
}

fn is_number(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| c.is_ascii_digit() || c == '.')
        || matches!(
            word,
            "a" | "one" | "two" | "three" | "four" | "five" | "six" | "seven" | "few" | "couple"
        )
}

/// Split "2days" into ("2", "days").
fn split_number(word: &str) -> (&str, &str) {
    let idx = word
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(word.len());
    (&word[..idx], &word[idx..])
}
