//! Key/value local storage with a byte quota.
//!
//! Mirrors browser local storage: string values under string keys, with
//! writes rejected once the total stored size would exceed the quota.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};

impl Database {
    /// Store a value, replacing any previous value under `key`.
    pub fn storage_set(&self, key: &str, value: &str) -> DbResult<()> {
        let needed = key.len() + value.len();
        let used_by_others: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(bytes), 0) FROM local_storage WHERE key != ?",
            [key],
            |row| row.get(0),
        )?;
        let available = self.storage_quota.saturating_sub(used_by_others as usize);

        if needed > available {
            return Err(DbError::QuotaExceeded { needed, available });
        }

        self.conn.execute(
            r#"
            INSERT INTO local_storage (key, value, bytes, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                bytes = excluded.bytes,
                updated_at = excluded.updated_at
            "#,
            params![key, value, needed as i64],
        )?;
        Ok(())
    }

    /// Read a value.
    pub fn storage_get(&self, key: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Remove a value. Returns whether it existed.
    pub fn storage_remove(&self, key: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM local_storage WHERE key = ?", [key])?;
        Ok(rows_affected > 0)
    }

    /// Keys starting with `prefix`, in key order.
    pub fn storage_keys_with_prefix(&self, prefix: &str) -> DbResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM local_storage WHERE substr(key, 1, ?1) = ?2 ORDER BY key")?;
        let rows = stmt.query_map(params![prefix.chars().count() as i64, prefix], |row| {
            row.get(0)
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Total bytes stored.
    pub fn storage_usage(&self) -> DbResult<usize> {
        let used: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(bytes), 0) FROM local_storage",
            [],
            |row| row.get(0),
        )?;
        Ok(used as usize)
    }
}
