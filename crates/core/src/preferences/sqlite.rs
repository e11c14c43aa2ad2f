//! SQLite-backed preference store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use super::{GameQuestMode, PreferenceError, PreferenceStore, Preferences};

const KEY_SPEED: &str = "speed_multiplier";
const KEY_HEARTBEAT: &str = "heartbeat_interval_secs";
const KEY_POLLING: &str = "polling_interval_secs";
const KEY_GAME_MODE: &str = "game_mode";

/// Stores preferences as rows of a key/value table.
pub struct SqlitePreferenceStore {
    conn: Mutex<Connection>,
}

impl SqlitePreferenceStore {
    /// Open (or create) the database file and the preferences table.
    pub fn new(path: &Path) -> Result<Self, PreferenceError> {
        let conn = Connection::open(path).map_err(|e| PreferenceError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, PreferenceError> {
        let conn =
            Connection::open_in_memory().map_err(|e| PreferenceError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), PreferenceError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| PreferenceError::Database(e.to_string()))?;

        Ok(())
    }

    fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, PreferenceError> {
        value.parse().map_err(|_| PreferenceError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

impl PreferenceStore for SqlitePreferenceStore {
    fn load(&self) -> Result<Option<Preferences>, PreferenceError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PreferenceError::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare("SELECT key, value FROM preferences")
            .map_err(|e| PreferenceError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| PreferenceError::Database(e.to_string()))?;

        let mut values = HashMap::new();
        for row in rows {
            let (key, value) = row.map_err(|e| PreferenceError::Database(e.to_string()))?;
            values.insert(key, value);
        }

        if values.is_empty() {
            return Ok(None);
        }

        // Keys missing from older databases fall back to defaults
        let mut prefs = Preferences::default();
        if let Some(v) = values.get(KEY_SPEED) {
            prefs.speed_multiplier = Self::parse(KEY_SPEED, v)?;
        }
        if let Some(v) = values.get(KEY_HEARTBEAT) {
            prefs.heartbeat_interval_secs = Self::parse(KEY_HEARTBEAT, v)?;
        }
        if let Some(v) = values.get(KEY_POLLING) {
            prefs.polling_interval_secs = Self::parse(KEY_POLLING, v)?;
        }
        if let Some(v) = values.get(KEY_GAME_MODE) {
            prefs.game_mode =
                GameQuestMode::parse(v).ok_or_else(|| PreferenceError::InvalidValue {
                    key: KEY_GAME_MODE.to_string(),
                    value: v.clone(),
                })?;
        }

        Ok(Some(prefs))
    }

    fn save(&self, preferences: &Preferences) -> Result<(), PreferenceError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PreferenceError::Database(e.to_string()))?;
        let now = chrono::Utc::now().to_rfc3339();

        let entries = [
            (KEY_SPEED, preferences.speed_multiplier.to_string()),
            (KEY_HEARTBEAT, preferences.heartbeat_interval_secs.to_string()),
            (KEY_POLLING, preferences.polling_interval_secs.to_string()),
            (KEY_GAME_MODE, preferences.game_mode.as_str().to_string()),
        ];

        for (key, value) in entries {
            conn.execute(
                "INSERT INTO preferences (key, value, updated_at) VALUES (?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, &now],
            )
            .map_err(|e| PreferenceError::Database(e.to_string()))?;
        }

        Ok(())
    }
}
