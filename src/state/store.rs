//! State Store
//!
//! Persistent key-value storage for coordination state, backed by SQLite.
//! Values are stored as JSON documents.

use std::path::PathBuf;
use rusqlite::{Connection, OptionalExtension, params};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// One key of an atomic batch: written only if the current value still
/// equals `expected` (`None` meaning absent). A `new` of `None` deletes.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyChange {
    pub key: String,
    pub expected: Option<Value>,
    pub new: Option<Value>,
}

/// Persistent state store backed by SQLite
pub struct StateStore {
    /// Database connection
    conn: Mutex<Connection>,
}

impl StateStore {
    /// Create or open the state database under `data_dir`
    pub fn open(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)?;
        let conn = Connection::open(data_dir.join("state.db"))?;
        Self::with_connection(conn)
    }

    /// Create a throwaway in-memory store
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Get the raw JSON value of a key
    pub async fn get_value(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock().await;
        read_value(&conn, key)
    }

    /// Get a typed value
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_value(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Set a typed value
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let conn = self.conn.lock().await;
        write_value(&conn, key, Some(&value))
    }

    /// Remove a key
    pub async fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        write_value(&conn, key, None)
    }

    /// Set `key` to `new` only if it currently holds `expected`.
    /// Returns false when the current value differs.
    pub async fn compare_and_set<T: Serialize>(
        &self,
        key: &str,
        expected: Option<&T>,
        new: &T,
    ) -> Result<bool> {
        let change = KeyChange {
            key: key.to_string(),
            expected: expected.map(serde_json::to_value).transpose()?,
            new: Some(serde_json::to_value(new)?),
        };
        match self.apply_batch(vec![change]).await {
            Ok(()) => Ok(true),
            Err(Error::State(reason)) if reason.starts_with(CONFLICT) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Apply a set of compare-and-set changes atomically. Either every key
    /// still holds its expected value and all are written, or nothing is.
    pub async fn apply_batch(&self, changes: Vec<KeyChange>) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for change in &changes {
            let current = read_value(&tx, &change.key)?;
            if current != change.expected {
                return Err(Error::State(format!(
                    "{} on key '{}': expected {:?}, found {:?}",
                    CONFLICT, change.key, change.expected, current
                )));
            }
            write_value(&tx, &change.key, change.new.as_ref())?;
        }
        tx.commit()?;
        Ok(())
    }

    /// List every stored key with its value
    pub async fn dump(&self) -> Result<Vec<(String, Value)>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT key, value FROM kv ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (key, raw) = row?;
            entries.push((key, serde_json::from_str(&raw)?));
        }
        Ok(entries)
    }
}

const CONFLICT: &str = "Concurrent modification";

fn read_value(conn: &Connection, key: &str) -> Result<Option<Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
        .optional()?;
    match raw {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

fn write_value(conn: &Connection, key: &str, value: Option<&Value>) -> Result<()> {
    match value {
        Some(value) => {
            conn.execute(
                r#"
                INSERT INTO kv (key, value) VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = CURRENT_TIMESTAMP
                "#,
                params![key, value.to_string()],
            )?;
        }
        None => {
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        }
    }
    Ok(())
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::State(format!("SQLite error: {}", e))
    }
}
