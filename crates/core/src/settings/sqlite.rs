//! SQLite-backed settings store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{Settings, SettingsError, SettingsStore};
use crate::storage::{self, StorageError};

/// SQLite-backed settings store.
pub struct SqliteSettingsStore {
    conn: Mutex<Connection>,
}

impl SqliteSettingsStore {
    /// Create a new SQLite settings store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StorageError> {
        let conn = storage::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite settings store (useful for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = storage::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS app_settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                language_priority TEXT NOT NULL,
                auto_replace_existing INTEGER NOT NULL DEFAULT 0,
                subtitle_output_path TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn read(conn: &Connection) -> Result<Option<Settings>, StorageError> {
        let row = conn
            .query_row(
                "SELECT language_priority, auto_replace_existing, subtitle_output_path FROM app_settings WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, bool>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((priority_json, auto_replace_existing, subtitle_output_path)) => {
                let language_priority: Vec<String> = serde_json::from_str(&priority_json)?;
                Ok(Some(Settings {
                    language_priority,
                    auto_replace_existing,
                    subtitle_output_path,
                }))
            }
            None => Ok(None),
        }
    }
}

impl SettingsStore for SqliteSettingsStore {
    fn ensure_defaults(&self, subtitle_output_path: &str) -> Result<Settings, SettingsError> {
        let conn = storage::lock(&self.conn)?;
        let defaults = Settings::with_output_path(subtitle_output_path);
        let priority_json = serde_json::to_string(&defaults.language_priority)
            .map_err(StorageError::from)?;

        conn.execute(
            "INSERT INTO app_settings (id, language_priority, auto_replace_existing, subtitle_output_path, updated_at)
             VALUES (1, ?, 0, ?, ?)
             ON CONFLICT(id) DO NOTHING",
            params![
                priority_json,
                defaults.subtitle_output_path,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(StorageError::from)?;

        Ok(Self::read(&conn)?.unwrap_or(defaults))
    }

    fn get(&self) -> Result<Settings, SettingsError> {
        let conn = storage::lock(&self.conn)?;
        Self::read(&conn)?
            .ok_or_else(|| StorageError::NotFound("settings".to_string()).into())
    }

    fn update(&self, settings: Settings) -> Result<Settings, SettingsError> {
        let settings = settings.normalized()?;
        let priority_json =
            serde_json::to_string(&settings.language_priority).map_err(StorageError::from)?;

        let conn = storage::lock(&self.conn)?;
        conn.execute(
            "INSERT INTO app_settings (id, language_priority, auto_replace_existing, subtitle_output_path, updated_at)
             VALUES (1, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                language_priority = excluded.language_priority,
                auto_replace_existing = excluded.auto_replace_existing,
                subtitle_output_path = excluded.subtitle_output_path,
                updated_at = excluded.updated_at",
            params![
                priority_json,
                settings.auto_replace_existing,
                settings.subtitle_output_path,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(StorageError::from)?;

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_defaults_seeds_once() {
        let store = SqliteSettingsStore::in_memory().unwrap();

        let first = store.ensure_defaults("/subs").unwrap();
        assert_eq!(first.language_priority, vec!["bilingual", "zh-cn", "zh-tw"]);
        assert_eq!(first.subtitle_output_path, "/subs");

        // A second boot with a different configured path keeps the stored row.
        let second = store.ensure_defaults("/elsewhere").unwrap();
        assert_eq!(second.subtitle_output_path, "/subs");
    }

    #[test]
    fn test_get_without_row_is_not_found() {
        let store = SqliteSettingsStore::in_memory().unwrap();
        assert!(matches!(
            store.get(),
            Err(SettingsError::Storage(StorageError::NotFound(_)))
        ));
    }

    #[test]
    fn test_update_and_get() {
        let store = SqliteSettingsStore::in_memory().unwrap();
        store.ensure_defaults("/subs").unwrap();

        let updated = store
            .update(Settings {
                language_priority: vec!["en".to_string(), "zh-tw".to_string()],
                auto_replace_existing: true,
                subtitle_output_path: "/new".to_string(),
            })
            .unwrap();
        assert_eq!(updated.language_priority, vec!["en", "zh-tw"]);

        let stored = store.get().unwrap();
        assert_eq!(stored, updated);
    }

    #[test]
    fn test_update_rejects_empty_priority() {
        let store = SqliteSettingsStore::in_memory().unwrap();
        store.ensure_defaults("/subs").unwrap();

        let result = store.update(Settings {
            language_priority: vec![],
            auto_replace_existing: false,
            subtitle_output_path: "/subs".to_string(),
        });
        assert!(matches!(result, Err(SettingsError::Validation(_))));

        // Stored settings are untouched.
        assert_eq!(store.get().unwrap().language_priority.len(), 3);
    }
}
