//! SQLite schema definition.

/// Complete database schema for Luni triage.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Local Storage (key/value blobs with a byte quota)
-- ============================================================================

CREATE TABLE IF NOT EXISTS local_storage (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    bytes INTEGER NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Pets
-- ============================================================================

CREATE TABLE IF NOT EXISTS pets (
    local_id TEXT PRIMARY KEY,
    server_id TEXT UNIQUE,
    owner_id TEXT NOT NULL,
    name TEXT NOT NULL,
    species TEXT NOT NULL,
    breed TEXT,
    weight_kg REAL,
    date_of_birth TEXT,
    conditions TEXT NOT NULL DEFAULT '[]',       -- JSON array of strings
    medications TEXT NOT NULL DEFAULT '[]',      -- JSON array of strings
    allergies TEXT NOT NULL DEFAULT '[]',        -- JSON array of strings
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_pets_owner ON pets(owner_id);

-- ============================================================================
-- Provider Favorites
-- ============================================================================

CREATE TABLE IF NOT EXISTS favorites (
    user_id TEXT NOT NULL,
    provider_id TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (user_id, provider_id)
);
"#;
