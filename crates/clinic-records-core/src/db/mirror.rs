//! Persisted copy of the patient mirror.

use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};

use super::{Database, DbError, DbResult};
use crate::models::Patient;

/// Fixed key the whole patient collection is stored under.
pub const MIRROR_KEY: &str = "patients";

/// Hex SHA-256 of a cache value.
pub fn checksum(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

impl Database {
    /// Overwrite an entry. Last writer wins.
    pub fn put_entry(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, checksum, updated_at) VALUES (?, ?, ?, datetime('now'))",
            params![key, value, checksum(value)],
        )?;
        Ok(())
    }

    /// Read an entry, verifying its checksum.
    pub fn get_entry(&self, key: &str) -> DbResult<Option<String>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT value, checksum FROM kv_store WHERE key = ?",
                [key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((value, stored)) if checksum(&value) != stored => {
                Err(DbError::Corrupt(format!("checksum mismatch for key '{}'", key)))
            }
            Some((value, _)) => Ok(Some(value)),
            None => Ok(None),
        }
    }

    /// Remove an entry. Returns whether it existed.
    pub fn delete_entry(&self, key: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?", [key])?;
        Ok(rows_affected > 0)
    }

    /// Persist the full patient collection.
    pub fn save_mirror(&self, patients: &[Patient]) -> DbResult<()> {
        let json = serde_json::to_string(patients)?;
        self.put_entry(MIRROR_KEY, &json)
    }

    /// Load the persisted patient collection, `None` if never saved.
    pub fn load_mirror(&self) -> DbResult<Option<Vec<Patient>>> {
        self.get_entry(MIRROR_KEY)?
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(Into::into)
    }

    /// Drop the persisted patient collection.
    pub fn clear_mirror(&self) -> DbResult<bool> {
        self.delete_entry(MIRROR_KEY)
    }
}
