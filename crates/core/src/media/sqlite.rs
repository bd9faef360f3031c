//! SQLite-backed media store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{MediaFilter, MediaItem, MediaStore, MediaType, ScannedMedia, UpsertSummary};
use crate::storage::{self, StorageError};

const SELECT_COLUMNS: &str = "id, media_type, title, year, season, episode, file_path, file_hash, has_subtitle, created_at, updated_at";

/// SQLite-backed media store.
pub struct SqliteMediaStore {
    conn: Mutex<Connection>,
}

impl SqliteMediaStore {
    /// Create a new SQLite media store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StorageError> {
        let conn = storage::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite media store (useful for testing).
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
            CREATE TABLE IF NOT EXISTS media_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                media_type TEXT NOT NULL,
                title TEXT NOT NULL,
                year INTEGER,
                season INTEGER,
                episode INTEGER,
                file_path TEXT NOT NULL UNIQUE,
                file_hash TEXT,
                has_subtitle INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_media_items_has_subtitle ON media_items(has_subtitle);
            CREATE INDEX IF NOT EXISTS idx_media_items_updated_at ON media_items(updated_at);
            "#,
        )?;
        Ok(())
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<MediaItem> {
        let media_type: String = row.get(1)?;
        let created_at: String = row.get(9)?;
        let updated_at: String = row.get(10)?;

        Ok(MediaItem {
            id: row.get(0)?,
            media_type: MediaType::from_db(&media_type),
            title: row.get(2)?,
            year: row.get(3)?,
            season: row.get(4)?,
            episode: row.get(5)?,
            file_path: row.get(6)?,
            file_hash: row.get(7)?,
            has_subtitle: row.get(8)?,
            created_at: storage::parse_timestamp(&created_at),
            updated_at: storage::parse_timestamp(&updated_at),
        })
    }
}

impl MediaStore for SqliteMediaStore {
    fn upsert_many(&self, items: &[ScannedMedia]) -> Result<UpsertSummary, StorageError> {
        let mut conn = storage::lock(&self.conn)?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut summary = UpsertSummary::default();

        {
            let mut exists_stmt = tx.prepare("SELECT id FROM media_items WHERE file_path = ?")?;
            let mut insert_stmt = tx.prepare(
                "INSERT INTO media_items (media_type, title, year, season, episode, file_path, file_hash, has_subtitle, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            let mut update_stmt = tx.prepare(
                "UPDATE media_items SET media_type = ?, title = ?, year = ?, season = ?, episode = ?,
                    file_hash = COALESCE(?, file_hash), has_subtitle = (has_subtitle OR ?), updated_at = ?
                 WHERE id = ?",
            )?;

            for item in items {
                let existing: Option<i64> = exists_stmt
                    .query_row(params![item.file_path], |row| row.get(0))
                    .optional()?;

                match existing {
                    Some(id) => {
                        update_stmt.execute(params![
                            item.media_type.as_str(),
                            item.title,
                            item.year,
                            item.season,
                            item.episode,
                            item.file_hash,
                            item.has_subtitle,
                            now,
                            id,
                        ])?;
                        summary.updated += 1;
                    }
                    None => {
                        insert_stmt.execute(params![
                            item.media_type.as_str(),
                            item.title,
                            item.year,
                            item.season,
                            item.episode,
                            item.file_path,
                            item.file_hash,
                            item.has_subtitle,
                            now,
                            now,
                        ])?;
                        summary.inserted += 1;
                    }
                }
            }
        }

        tx.commit()?;
        Ok(summary)
    }

    fn get(&self, id: i64) -> Result<Option<MediaItem>, StorageError> {
        let conn = storage::lock(&self.conn)?;
        let sql = format!("SELECT {} FROM media_items WHERE id = ?", SELECT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_item)
            .optional()?)
    }

    fn get_by_path(&self, file_path: &str) -> Result<Option<MediaItem>, StorageError> {
        let conn = storage::lock(&self.conn)?;
        let sql = format!("SELECT {} FROM media_items WHERE file_path = ?", SELECT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![file_path], Self::row_to_item)
            .optional()?)
    }

    fn list(&self, filter: &MediaFilter) -> Result<Vec<MediaItem>, StorageError> {
        let conn = storage::lock(&self.conn)?;
        let where_clause = if filter.missing_subtitle_only {
            "WHERE has_subtitle = 0"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {} FROM media_items {} ORDER BY updated_at DESC, id DESC LIMIT ?",
            SELECT_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![filter.limit], Self::row_to_item)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    fn count(&self, filter: &MediaFilter) -> Result<i64, StorageError> {
        let conn = storage::lock(&self.conn)?;
        let sql = if filter.missing_subtitle_only {
            "SELECT COUNT(*) FROM media_items WHERE has_subtitle = 0"
        } else {
            "SELECT COUNT(*) FROM media_items"
        };
        Ok(conn.query_row(sql, [], |row| row.get(0))?)
    }

    fn mark_has_subtitle(&self, id: i64) -> Result<(), StorageError> {
        let conn = storage::lock(&self.conn)?;
        let changed = conn.execute(
            "UPDATE media_items SET has_subtitle = 1, updated_at = ? WHERE id = ?",
            params![Utc::now().to_rfc3339(), id],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("media item {}", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanned(path: &str, title: &str, has_subtitle: bool) -> ScannedMedia {
        ScannedMedia {
            media_type: MediaType::Movie,
            title: title.to_string(),
            year: Some(2010),
            season: None,
            episode: None,
            file_path: path.to_string(),
            file_hash: None,
            has_subtitle,
        }
    }

    #[test]
    fn test_upsert_inserts_then_updates() {
        let store = SqliteMediaStore::in_memory().unwrap();
        let items = vec![
            scanned("/media/a.mkv", "A", false),
            scanned("/media/b.mkv", "B", true),
        ];

        let first = store.upsert_many(&items).unwrap();
        assert_eq!(first, UpsertSummary { inserted: 2, updated: 0 });

        let second = store.upsert_many(&items).unwrap();
        assert_eq!(second, UpsertSummary { inserted: 0, updated: 2 });

        let all = store.list(&MediaFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_upsert_updates_fields_in_place() {
        let store = SqliteMediaStore::in_memory().unwrap();
        store
            .upsert_many(&[scanned("/media/a.mkv", "Old Title", false)])
            .unwrap();
        let before = store.get_by_path("/media/a.mkv").unwrap().unwrap();

        let mut changed = scanned("/media/a.mkv", "New Title", true);
        changed.media_type = MediaType::Episode;
        changed.season = Some(1);
        changed.episode = Some(4);
        store.upsert_many(&[changed]).unwrap();

        let after = store.get_by_path("/media/a.mkv").unwrap().unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.title, "New Title");
        assert_eq!(after.media_type, MediaType::Episode);
        assert_eq!(after.season, Some(1));
        assert_eq!(after.episode, Some(4));
        assert!(after.has_subtitle);
        assert_eq!(after.created_at, before.created_at);
    }

    #[test]
    fn test_rescan_keeps_downloaded_subtitle_flag() {
        let store = SqliteMediaStore::in_memory().unwrap();
        store
            .upsert_many(&[scanned("/media/a.mkv", "A", false)])
            .unwrap();
        let item = store.get_by_path("/media/a.mkv").unwrap().unwrap();
        store.mark_has_subtitle(item.id).unwrap();

        // The downloaded file lives outside the video's directory, so the
        // next scan finds no sidecar.
        let summary = store
            .upsert_many(&[scanned("/media/a.mkv", "A", false)])
            .unwrap();

        assert_eq!(summary.updated, 1);
        assert!(store.get(item.id).unwrap().unwrap().has_subtitle);
    }

    #[test]
    fn test_list_missing_subtitle_only() {
        let store = SqliteMediaStore::in_memory().unwrap();
        store
            .upsert_many(&[
                scanned("/media/a.mkv", "A", false),
                scanned("/media/b.mkv", "B", true),
            ])
            .unwrap();

        let missing = store
            .list(&MediaFilter {
                missing_subtitle_only: true,
                limit: 10,
            })
            .unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].title, "A");
    }

    #[test]
    fn test_list_respects_limit() {
        let store = SqliteMediaStore::in_memory().unwrap();
        let items: Vec<_> = (0..5)
            .map(|i| scanned(&format!("/media/{}.mkv", i), "X", false))
            .collect();
        store.upsert_many(&items).unwrap();

        let listed = store
            .list(&MediaFilter {
                missing_subtitle_only: false,
                limit: 3,
            })
            .unwrap();
        assert_eq!(listed.len(), 3);

        let filter = MediaFilter {
            missing_subtitle_only: false,
            limit: 1,
        };
        assert_eq!(store.count(&filter).unwrap(), 5);
    }

    #[test]
    fn test_count_missing_subtitle_only() {
        let store = SqliteMediaStore::in_memory().unwrap();
        store
            .upsert_many(&[
                scanned("/media/a.mkv", "A", false),
                scanned("/media/b.mkv", "B", true),
                scanned("/media/c.mkv", "C", false),
            ])
            .unwrap();

        let filter = MediaFilter {
            missing_subtitle_only: true,
            ..MediaFilter::default()
        };
        assert_eq!(store.count(&filter).unwrap(), 2);
    }

    #[test]
    fn test_mark_has_subtitle() {
        let store = SqliteMediaStore::in_memory().unwrap();
        store
            .upsert_many(&[scanned("/media/a.mkv", "A", false)])
            .unwrap();
        let item = store.get_by_path("/media/a.mkv").unwrap().unwrap();

        store.mark_has_subtitle(item.id).unwrap();
        assert!(store.get(item.id).unwrap().unwrap().has_subtitle);

        let err = store.mark_has_subtitle(9999).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = SqliteMediaStore::in_memory().unwrap();
        assert!(store.get(42).unwrap().is_none());
    }

    #[test]
    fn test_store_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("media.db");

        {
            let store = SqliteMediaStore::new(&path).unwrap();
            store
                .upsert_many(&[scanned("/media/a.mkv", "A", false)])
                .unwrap();
        }

        let reopened = SqliteMediaStore::new(&path).unwrap();
        assert!(reopened.get_by_path("/media/a.mkv").unwrap().is_some());
    }
}
