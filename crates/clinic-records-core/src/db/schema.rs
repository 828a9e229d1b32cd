//! SQLite schema definition.

/// Complete database schema for the durable cache.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Key-value entries (one serialized blob per key)
-- ============================================================================

CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    checksum TEXT NOT NULL,                      -- hex(sha256(value))
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
