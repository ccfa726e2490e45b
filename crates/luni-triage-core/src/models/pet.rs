//! Pet profiles and medical history.

use serde::{Deserialize, Serialize};

/// A pet profile with dual-ID support for backend sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pet {
    /// Local UUID - always present, generated locally
    pub local_id: String,
    /// Backend row ID - null until first sync
    pub server_id: Option<String>,
    /// Owning user ID
    pub owner_id: String,
    /// Pet name
    pub name: String,
    /// Species (e.g., "dog", "cat", "rabbit")
    pub species: String,
    /// Breed
    pub breed: Option<String>,
    /// Weight in kg
    pub weight_kg: Option<f64>,
    /// Date of birth
    pub date_of_birth: Option<String>,
    /// Known conditions
    pub conditions: Vec<String>,
    /// Current medications
    pub medications: Vec<String>,
    /// Known allergies
    pub allergies: Vec<String>,
    /// Additional notes
    pub notes: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Pet {
    /// Create a new pet with required fields.
    pub fn new(owner_id: String, name: String, species: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            local_id: uuid::Uuid::new_v4().to_string(),
            server_id: None,
            owner_id,
            name,
            species,
            breed: None,
            weight_kg: None,
            date_of_birth: None,
            conditions: Vec::new(),
            medications: Vec::new(),
            allergies: Vec::new(),
            notes: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Check if this pet has been synced to the backend.
    pub fn is_synced(&self) -> bool {
        self.server_id.is_some()
    }

    /// Medical context block passed to the triage model.
    pub fn medical_context(&self) -> String {
        let mut lines = vec![format!("Name: {}", self.name), format!("Species: {}", self.species)];
        if let Some(breed) = &self.breed {
            lines.push(format!("Breed: {}", breed));
        }
        if let Some(weight) = self.weight_kg {
            lines.push(format!("Weight: {} kg", weight));
        }
        if let Some(dob) = &self.date_of_birth {
            lines.push(format!("Date of birth: {}", dob));
        }
        lines.push(format!("Conditions: {}", list_or_none(&self.conditions)));
        lines.push(format!("Medications: {}", list_or_none(&self.medications)));
        lines.push(format!("Allergies: {}", list_or_none(&self.allergies)));
        if let Some(notes) = &self.notes {
            lines.push(format!("Notes: {}", notes));
        }
        lines.join("\n")
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none recorded".to_string()
    } else {
        items.join(", ")
    }
}
