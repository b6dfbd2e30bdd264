//! Durable key/value store backed by SQLite.
//!
//! Every logical record persists as a JSON document under its own key, so
//! the journal and the scout profile never contend for the same slot. All
//! operations are synchronous; callers catch and log failures at their own
//! boundary rather than letting them reach the UI.

mod schema;

use anyhow::Result;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

pub use schema::{MIGRATIONS, SCHEMA};

pub struct DurableStore {
    conn: Connection,
}

impl DurableStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    /// In-memory store, primarily for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        for migration in MIGRATIONS {
            let _ = self.conn.execute(migration, []);
        }
        Ok(())
    }

    /// Fetch the JSON value stored under `key`. An absent key yields `None`;
    /// so does a row whose text no longer parses as JSON (logged and
    /// treated as absent, never fatal).
    pub fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let result = self.conn.query_row(
            "SELECT value FROM kv WHERE key = ?",
            [key],
            |row| row.get::<_, String>(0),
        );
        let text = match result {
            Ok(text) => text,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding corrupt stored value");
                Ok(None)
            }
        }
    }

    pub fn set(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.conn.execute(
            r#"
            INSERT INTO kv (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE
            SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
            rusqlite::params![key, text],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?", [key])?;
        Ok(())
    }

    /// Typed read: a stored value that fails to deserialize into `T` is
    /// treated like a corrupt row (logged, `None`).
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let value = match self.get(key)? {
            Some(value) => value,
            None => return Ok(None),
        };
        match serde_json::from_value(value) {
            Ok(typed) => Ok(Some(typed)),
            Err(e) => {
                tracing::warn!(key, error = %e, "Stored value does not match expected shape");
                Ok(None)
            }
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set(key, &serde_json::to_value(value)?)
    }
}
