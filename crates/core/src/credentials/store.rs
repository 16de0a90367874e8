//! Persisted credential settings.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{CredentialError, CredentialKind, CredentialPool};

/// Everything that survives between sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSettings {
    #[serde(default)]
    pub generation: CredentialPool,
    #[serde(default)]
    pub publishing: CredentialPool,
    #[serde(default)]
    pub use_simulation: bool,
}

impl CredentialSettings {
    pub fn pool(&self, kind: CredentialKind) -> &CredentialPool {
        match kind {
            CredentialKind::Generation => &self.generation,
            CredentialKind::Publishing => &self.publishing,
        }
    }

    pub fn pool_mut(&mut self, kind: CredentialKind) -> &mut CredentialPool {
        match kind {
            CredentialKind::Generation => &mut self.generation,
            CredentialKind::Publishing => &mut self.publishing,
        }
    }
}

/// Trait for settings storage backends.
pub trait CredentialStore: Send + Sync {
    /// Load settings; a store that was never written yields defaults.
    fn load(&self) -> Result<CredentialSettings, CredentialError>;

    /// Persist settings, replacing what was stored.
    fn save(&self, settings: &CredentialSettings) -> Result<(), CredentialError>;
}

const KEY_GENERATION: &str = "generation_pool";
const KEY_PUBLISHING: &str = "publishing_pool";
const KEY_SIMULATION: &str = "use_simulation";

/// SQLite-backed key/value settings store.
pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
}

impl SqliteCredentialStore {
    /// Open (or create) the settings database at `path`.
    pub fn new(path: &Path) -> Result<Self, CredentialError> {
        let conn = Connection::open(path).map_err(|e| CredentialError::Store(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, CredentialError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CredentialError::Store(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CredentialError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| CredentialError::Store(e.to_string()))
    }

    fn read_value(conn: &Connection, key: &str) -> Result<Option<String>, CredentialError> {
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| CredentialError::Store(e.to_string()))
    }

    fn read_json<T>(conn: &Connection, key: &str) -> Result<T, CredentialError>
    where
        T: for<'de> Deserialize<'de> + Default,
    {
        match Self::read_value(conn, key)? {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| CredentialError::Store(format!("corrupt {}: {}", key, e))),
            None => Ok(T::default()),
        }
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn load(&self) -> Result<CredentialSettings, CredentialError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CredentialError::Store(e.to_string()))?;

        Ok(CredentialSettings {
            generation: Self::read_json(&conn, KEY_GENERATION)?,
            publishing: Self::read_json(&conn, KEY_PUBLISHING)?,
            use_simulation: Self::read_json(&conn, KEY_SIMULATION)?,
        })
    }

    fn save(&self, settings: &CredentialSettings) -> Result<(), CredentialError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| CredentialError::Store(e.to_string()))?;
        let now = chrono::Utc::now().to_rfc3339();

        let values = [
            (KEY_GENERATION, serde_json::to_string(&settings.generation)),
            (KEY_PUBLISHING, serde_json::to_string(&settings.publishing)),
            (KEY_SIMULATION, serde_json::to_string(&settings.use_simulation)),
        ];

        let tx = conn
            .transaction()
            .map_err(|e| CredentialError::Store(e.to_string()))?;
        for (key, value) in values {
            let value = value.map_err(|e| CredentialError::Store(e.to_string()))?;
            tx.execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .map_err(|e| CredentialError::Store(e.to_string()))?;
        }
        tx.commit()
            .map_err(|e| CredentialError::Store(e.to_string()))
    }
}
