//! Session snapshot persistence.
//!
//! The whole session is stored as one JSON blob under a fixed key. Loading
//! is all-or-nothing: a snapshot that is stale, malformed or fails the shape
//! check is discarded and `None` returned.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::TriageConfig;
use crate::db::{Database, DbError};
use crate::models::{AnalysisState, Case, Region, Severity};

/// Persistence errors.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    #[error("Snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot failed shape check: {0}")]
    Shape(String),

    #[error("Snapshot is {age_ms}ms old")]
    Stale { age_ms: i64 },
}

/// Everything needed to restore a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub chat_history: Vec<Case>,
    pub current_chat_id: Option<String>,
    pub selected_region: Region,
    pub current_analysis: AnalysisState,
    pub current_severity: Severity,
    /// Save time, Unix milliseconds
    pub timestamp: i64,
}

impl SessionSnapshot {
    /// Copy without image payloads outside the active case.
    pub fn compacted(&self) -> SessionSnapshot {
        let mut compact = self.clone();
        for case in &mut compact.chat_history {
            if Some(&case.id) == self.current_chat_id.as_ref() {
                continue;
            }
            for message in &mut case.messages {
                if message.image.take().is_some() {
                    message.image_omitted = true;
                }
            }
        }
        compact
    }
}

/// How a save attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Saved after dropping inactive images
    SavedCompressed,
    /// Saved after removing other app keys
    SavedAfterEviction { evicted: usize },
    /// Could not be saved; the failure was logged
    Dropped,
}

impl SaveOutcome {
    pub fn is_saved(self) -> bool {
        !matches!(self, SaveOutcome::Dropped)
    }
}

/// Reads and writes session snapshots in local storage.
pub struct PersistenceAdapter<'a> {
    db: &'a Database,
    key: String,
    prefix: String,
    max_age_ms: i64,
    compress_threshold: usize,
}

impl<'a> PersistenceAdapter<'a> {
    pub fn new(db: &'a Database, config: &TriageConfig) -> Self {
        Self {
            db,
            key: config.storage_key.clone(),
            prefix: config.storage_prefix.clone(),
            max_age_ms: config.snapshot_max_age_ms(),
            compress_threshold: config.compress_threshold_bytes,
        }
    }

    /// Save a snapshot. Failures are logged, never returned.
    pub fn save(&self, snapshot: &SessionSnapshot) -> SaveOutcome {
        let mut json = match serde_json::to_string(snapshot) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize session snapshot");
                return SaveOutcome::Dropped;
            }
        };

        let mut compressed = false;
        if json.len() > self.compress_threshold {
            match serde_json::to_string(&snapshot.compacted()) {
                Ok(compact) => {
                    debug!(
                        before = json.len(),
                        after = compact.len(),
                        "Compacted session snapshot"
                    );
                    json = compact;
                    compressed = true;
                }
                Err(e) => warn!(error = %e, "Failed to compact session snapshot"),
            }
        }

        match self.db.storage_set(&self.key, &json) {
            Ok(()) if compressed => SaveOutcome::SavedCompressed,
            Ok(()) => SaveOutcome::Saved,
            Err(DbError::QuotaExceeded { needed, available }) => {
                info!(needed, available, "Storage quota exceeded, evicting old entries");
                self.retry_after_eviction(&json)
            }
            Err(e) => {
                warn!(error = %e, bytes = json.len(), "Failed to save session snapshot");
                SaveOutcome::Dropped
            }
        }
    }

    fn retry_after_eviction(&self, json: &str) -> SaveOutcome {
        let evicted = match self.evict_siblings() {
            Ok(evicted) => evicted,
            Err(e) => {
                warn!(error = %e, "Failed to evict storage entries");
                return SaveOutcome::Dropped;
            }
        };

        match self.db.storage_set(&self.key, json) {
            Ok(()) => SaveOutcome::SavedAfterEviction { evicted },
            Err(e) => {
                warn!(error = %e, bytes = json.len(), evicted, "Session snapshot dropped after eviction");
                SaveOutcome::Dropped
            }
        }
    }

    /// Remove every other key under the app prefix.
    fn evict_siblings(&self) -> Result<usize, DbError> {
        let mut evicted = 0;
        for key in self.db.storage_keys_with_prefix(&self.prefix)? {
            if key != self.key && self.db.storage_remove(&key)? {
                evicted += 1;
            }
        }
        Ok(evicted)
    }

    /// Load the stored snapshot if it is fresh and well-formed.
    pub fn load(&self) -> Option<SessionSnapshot> {
        self.load_at(chrono::Utc::now().timestamp_millis())
    }

    /// [`load`](Self::load) against an explicit clock.
    pub fn load_at(&self, now_ms: i64) -> Option<SessionSnapshot> {
        match self.read(now_ms) {
            Ok(snapshot) => snapshot,
            Err(PersistenceError::Storage(e)) => {
                warn!(error = %e, "Failed to read session snapshot");
                None
            }
            Err(e) => {
                info!(reason = %e, "Discarding stored session snapshot");
                if let Err(e) = self.db.storage_remove(&self.key) {
                    warn!(error = %e, "Failed to remove discarded snapshot");
                }
                None
            }
        }
    }

    fn read(&self, now_ms: i64) -> Result<Option<SessionSnapshot>, PersistenceError> {
        let Some(json) = self.db.storage_get(&self.key)? else {
            return Ok(None);
        };

        let value: Value = serde_json::from_str(&json)?;
        check_shape(&value)?;

        let snapshot: SessionSnapshot = serde_json::from_value(value)?;
        let age_ms = now_ms - snapshot.timestamp;
        if age_ms > self.max_age_ms {
            return Err(PersistenceError::Stale { age_ms });
        }
        Ok(Some(snapshot))
    }

    /// Delete the stored snapshot.
    pub fn clear(&self) -> Result<bool, PersistenceError> {
        Ok(self.db.storage_remove(&self.key)?)
    }
}

/// Every case must have a string `id` and an array `messages`.
fn check_shape(value: &Value) -> Result<(), PersistenceError> {
    let cases = value
        .get("chatHistory")
        .and_then(Value::as_array)
        .ok_or_else(|| PersistenceError::Shape("chatHistory is not an array".into()))?;

    for (i, case) in cases.iter().enumerate() {
        if !case.get("id").map(Value::is_string).unwrap_or(false) {
            return Err(PersistenceError::Shape(format!("case {} has no id", i)));
        }
        if !case.get("messages").map(Value::is_array).unwrap_or(false) {
            return Err(PersistenceError::Shape(format!("case {} has no messages array", i)));
        }
    }

    if !value.get("timestamp").map(Value::is_i64).unwrap_or(false) {
        return Err(PersistenceError::Shape("timestamp missing".into()));
    }
    Ok(())
}
