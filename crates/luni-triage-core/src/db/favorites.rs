//! Provider favorites table.

use super::{Database, DbResult};
use crate::favorites::FavoritesBackend;

impl FavoritesBackend for Database {
    fn add_favorite(&self, user_id: &str, provider_id: &str) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO favorites (user_id, provider_id) VALUES (?, ?)",
            [user_id, provider_id],
        )?;
        Ok(())
    }

    fn remove_favorite(&self, user_id: &str, provider_id: &str) -> DbResult<()> {
        self.conn.execute(
            "DELETE FROM favorites WHERE user_id = ? AND provider_id = ?",
            [user_id, provider_id],
        )?;
        Ok(())
    }

    fn list_favorites(&self, user_id: &str) -> DbResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT provider_id FROM favorites WHERE user_id = ? ORDER BY provider_id")?;
        let rows = stmt.query_map([user_id], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
