//! Intake criteria and assessment progress.

use luni_triage_llm::RawCriteria;
use serde::{Deserialize, Serialize};

/// Stage label shown once every tracked criterion is established.
pub const STAGE_COMPLETE: &str = "Assessment Complete";

/// An intake fact the triage conversation tries to establish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    PetSpecies,
    PetAge,
    MainSymptoms,
    SymptomDuration,
    EatingDrinking,
    BehaviorChanges,
    MedicalHistory,
    PetBreed,
    PetWeight,
    CurrentMedications,
}

impl Criterion {
    /// Criteria that count toward progress.
    pub const TRACKED: [Criterion; 7] = [
        Criterion::PetSpecies,
        Criterion::PetAge,
        Criterion::MainSymptoms,
        Criterion::SymptomDuration,
        Criterion::EatingDrinking,
        Criterion::BehaviorChanges,
        Criterion::MedicalHistory,
    ];

    /// Every recorded criterion.
    pub const ALL: [Criterion; 10] = [
        Criterion::PetSpecies,
        Criterion::PetAge,
        Criterion::MainSymptoms,
        Criterion::SymptomDuration,
        Criterion::EatingDrinking,
        Criterion::BehaviorChanges,
        Criterion::MedicalHistory,
        Criterion::PetBreed,
        Criterion::PetWeight,
        Criterion::CurrentMedications,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Criterion::PetSpecies => "Pet species",
            Criterion::PetAge => "Pet age",
            Criterion::MainSymptoms => "Main symptoms",
            Criterion::SymptomDuration => "Symptom duration",
            Criterion::EatingDrinking => "Eating and drinking",
            Criterion::BehaviorChanges => "Behaviour changes",
            Criterion::MedicalHistory => "Medical history",
            Criterion::PetBreed => "Breed",
            Criterion::PetWeight => "Weight",
            Criterion::CurrentMedications => "Current medications",
        }
    }

    pub fn is_tracked(self) -> bool {
        Self::TRACKED.contains(&self)
    }
}

/// The ten criteria flags.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Criteria {
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

impl Criteria {
    pub fn get(&self, criterion: Criterion) -> bool {
        match criterion {
            Criterion::PetSpecies => self.pet_species,
            Criterion::PetAge => self.pet_age,
            Criterion::MainSymptoms => self.main_symptoms,
            Criterion::SymptomDuration => self.symptom_duration,
            Criterion::EatingDrinking => self.eating_drinking,
            Criterion::BehaviorChanges => self.behavior_changes,
            Criterion::MedicalHistory => self.medical_history,
            Criterion::PetBreed => self.pet_breed,
            Criterion::PetWeight => self.pet_weight,
            Criterion::CurrentMedications => self.current_medications,
        }
    }

    pub fn set(&mut self, criterion: Criterion, value: bool) {
        let flag = match criterion {
            Criterion::PetSpecies => &mut self.pet_species,
            Criterion::PetAge => &mut self.pet_age,
            Criterion::MainSymptoms => &mut self.main_symptoms,
            Criterion::SymptomDuration => &mut self.symptom_duration,
            Criterion::EatingDrinking => &mut self.eating_drinking,
            Criterion::BehaviorChanges => &mut self.behavior_changes,
            Criterion::MedicalHistory => &mut self.medical_history,
            Criterion::PetBreed => &mut self.pet_breed,
            Criterion::PetWeight => &mut self.pet_weight,
            Criterion::CurrentMedications => &mut self.current_medications,
        };
        *flag = value;
    }

    /// Flag-wise OR with another set.
    pub fn union(&self, other: &Criteria) -> Criteria {
        let mut merged = *self;
        for criterion in Criterion::ALL {
            if other.get(criterion) {
                merged.set(criterion, true);
            }
        }
        merged
    }

    /// Number of tracked criteria established.
    pub fn tracked_count(&self) -> u8 {
        Criterion::TRACKED.iter().filter(|c| self.get(**c)).count() as u8
    }
}

impl From<&RawCriteria> for Criteria {
    fn from(raw: &RawCriteria) -> Self {
        Self {
            pet_species: raw.pet_species,
            pet_age: raw.pet_age,
            main_symptoms: raw.main_symptoms,
            symptom_duration: raw.symptom_duration,
            eating_drinking: raw.eating_drinking,
            behavior_changes: raw.behavior_changes,
            medical_history: raw.medical_history,
            pet_breed: raw.pet_breed,
            pet_weight: raw.pet_weight,
            current_medications: raw.current_medications,
        }
    }
}

/// Assessment progress for a case, recomputed after every owner turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisState {
    /// Criteria flags
    pub criteria: Criteria,
    /// Tracked criteria established (0..=7)
    pub completed_criteria: u8,
    /// Progress through tracked criteria (0..=100)
    pub progress_percentage: u8,
    /// Human-readable stage label
    pub stage: String,
    /// The owner described an emergency
    pub emergency_detected: bool,
}

impl AnalysisState {
    /// Derive counts and stage from a set of flags.
    pub fn from_criteria(criteria: Criteria, emergency_detected: bool) -> Self {
        let completed = criteria.tracked_count();
        let total = Criterion::TRACKED.len() as u32;
        let progress = ((completed as u32 * 100 + total / 2) / total) as u8;

        Self {
            criteria,
            completed_criteria: completed,
            progress_percentage: progress,
            stage: stage_label(completed).to_string(),
            emergency_detected,
        }
    }

    /// All tracked criteria are established.
    pub fn is_complete(&self) -> bool {
        self.completed_criteria as usize == Criterion::TRACKED.len()
    }

    /// Tracked criteria not yet established.
    pub fn missing(&self) -> Vec<Criterion> {
        Criterion::TRACKED
            .into_iter()
            .filter(|c| !self.criteria.get(*c))
            .collect()
    }

    /// Plain-text progress summary for prompts.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "{}/{} intake facts established ({}%, stage: {})",
            self.completed_criteria,
            Criterion::TRACKED.len(),
            self.progress_percentage,
            self.stage
        )];
        for criterion in Criterion::ALL {
            let mark = if self.criteria.get(criterion) { "x" } else { " " };
            lines.push(format!("[{}] {}", mark, criterion.label()));
        }
        if self.emergency_detected {
            lines.push("EMERGENCY SIGNS REPORTED".to_string());
        }
        lines.join("\n")
    }
}

impl Default for AnalysisState {
    fn default() -> Self {
        Self::from_criteria(Criteria::default(), false)
    }
}

/// Stage label for a number of established tracked criteria.
pub fn stage_label(completed: u8) -> &'static str {
    match completed {
        0 => "Getting Started",
        1..=2 => "Gathering Basics",
        3..=4 => "Understanding Symptoms",
        5..=6 => "Finalizing Assessment",
        _ => STAGE_COMPLETE,
    }
}
