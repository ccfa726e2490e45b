//! Pet profile database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::Pet;

const PET_COLUMNS: &str = "local_id, server_id, owner_id, name, species, breed, weight_kg, \
     date_of_birth, conditions, medications, allergies, notes, created_at, updated_at";

impl Database {
    /// Insert a new pet.
    pub fn insert_pet(&self, pet: &Pet) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO pets (
                local_id, server_id, owner_id, name, species, breed, weight_kg,
                date_of_birth, conditions, medications, allergies, notes,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                pet.local_id,
                pet.server_id,
                pet.owner_id,
                pet.name,
                pet.species,
                pet.breed,
                pet.weight_kg,
                pet.date_of_birth,
                serde_json::to_string(&pet.conditions)?,
                serde_json::to_string(&pet.medications)?,
                serde_json::to_string(&pet.allergies)?,
                pet.notes,
                pet.created_at,
                pet.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing pet, including its medical history.
    pub fn update_pet(&self, pet: &Pet) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE pets SET
                server_id = ?2,
                name = ?3,
                species = ?4,
                breed = ?5,
                weight_kg = ?6,
                date_of_birth = ?7,
                conditions = ?8,
                medications = ?9,
                allergies = ?10,
                notes = ?11,
                updated_at = datetime('now')
            WHERE local_id = ?1
            "#,
            params![
                pet.local_id,
                pet.server_id,
                pet.name,
                pet.species,
                pet.breed,
                pet.weight_kg,
                pet.date_of_birth,
                serde_json::to_string(&pet.conditions)?,
                serde_json::to_string(&pet.medications)?,
                serde_json::to_string(&pet.allergies)?,
                pet.notes,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a pet by local ID.
    pub fn get_pet(&self, local_id: &str) -> DbResult<Option<Pet>> {
        let sql = format!("SELECT {} FROM pets WHERE local_id = ?", PET_COLUMNS);
        self.conn
            .query_row(&sql, [local_id], PetRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List an owner's pets by name.
    pub fn list_pets_for_owner(&self, owner_id: &str) -> DbResult<Vec<Pet>> {
        let sql = format!(
            "SELECT {} FROM pets WHERE owner_id = ? ORDER BY name",
            PET_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([owner_id], PetRow::from_row)?;

        let mut pets = Vec::new();
        for row in rows {
            pets.push(row?.try_into()?);
        }
        Ok(pets)
    }

    /// Delete a pet.
    pub fn delete_pet(&self, local_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM pets WHERE local_id = ?", [local_id])?;
        Ok(rows_affected > 0)
    }

    /// Link local pet to its backend row after first sync.
    pub fn link_pet_server_id(&self, local_id: &str, server_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE pets SET server_id = ?, updated_at = datetime('now') WHERE local_id = ?",
            [server_id, local_id],
        )?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct PetRow {
    local_id: String,
    server_id: Option<String>,
    owner_id: String,
    name: String,
    species: String,
    breed: Option<String>,
    weight_kg: Option<f64>,
    date_of_birth: Option<String>,
    conditions: String,
    medications: String,
    allergies: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PetRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            local_id: row.get(0)?,
            server_id: row.get(1)?,
            owner_id: row.get(2)?,
            name: row.get(3)?,
            species: row.get(4)?,
            breed: row.get(5)?,
            weight_kg: row.get(6)?,
            date_of_birth: row.get(7)?,
            conditions: row.get(8)?,
            medications: row.get(9)?,
            allergies: row.get(10)?,
            notes: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

impl TryFrom<PetRow> for Pet {
    type Error = DbError;

    fn try_from(row: PetRow) -> Result<Self, Self::Error> {
        Ok(Pet {
            local_id: row.local_id,
            server_id: row.server_id,
            owner_id: row.owner_id,
            name: row.name,
            species: row.species,
            breed: row.breed,
            weight_kg: row.weight_kg,
            date_of_birth: row.date_of_birth,
            conditions: serde_json::from_str(&row.conditions)?,
            medications: serde_json::from_str(&row.medications)?,
            allergies: serde_json::from_str(&row.allergies)?,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let mut pet = Pet::new("owner-1".into(), "Bella".into(), "dog".into());
        pet.breed = Some("Kelpie".into());
        pet.weight_kg = Some(18.5);
        pet.conditions = vec!["hip dysplasia".into()];

        db.insert_pet(&pet).unwrap();

        let retrieved = db.get_pet(&pet.local_id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Bella");
        assert_eq!(retrieved.breed, Some("Kelpie".into()));
        assert_eq!(retrieved.weight_kg, Some(18.5));
        assert_eq!(retrieved.conditions, vec!["hip dysplasia".to_string()]);
        assert!(retrieved.allergies.is_empty());
    }

    #[test]
    fn test_update_medical_history() {
        let db = setup_db();

        let mut pet = Pet::new("owner-1".into(), "Milo".into(), "cat".into());
        db.insert_pet(&pet).unwrap();

        pet.medications = vec!["methimazole".into()];
        pet.allergies = vec!["chicken".into()];
        assert!(db.update_pet(&pet).unwrap());

        let retrieved = db.get_pet(&pet.local_id).unwrap().unwrap();
        assert_eq!(retrieved.medications, vec!["methimazole".to_string()]);
        assert_eq!(retrieved.allergies, vec!["chicken".to_string()]);
    }

    #[test]
    fn test_list_for_owner() {
        let db = setup_db();
        db.insert_pet(&Pet::new("owner-1".into(), "Milo".into(), "cat".into()))
            .unwrap();
        db.insert_pet(&Pet::new("owner-1".into(), "Bella".into(), "dog".into()))
            .unwrap();
        db.insert_pet(&Pet::new("owner-2".into(), "Rex".into(), "dog".into()))
            .unwrap();

        let pets = db.list_pets_for_owner("owner-1").unwrap();
        assert_eq!(pets.len(), 2);
        assert_eq!(pets[0].name, "Bella");
        assert_eq!(pets[1].name, "Milo");
    }

    #[test]
    fn test_link_server_id_and_delete() {
        let db = setup_db();
        let pet = Pet::new("owner-1".into(), "Bella".into(), "dog".into());
        db.insert_pet(&pet).unwrap();

        assert!(db.link_pet_server_id(&pet.local_id, "row-42").unwrap());
        let retrieved = db.get_pet(&pet.local_id).unwrap().unwrap();
        assert!(retrieved.is_synced());

        assert!(db.delete_pet(&pet.local_id).unwrap());
        assert!(db.get_pet(&pet.local_id).unwrap().is_none());
    }
}
