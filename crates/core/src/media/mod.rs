//! Media library: filename parsing, filesystem scanning and persistence.
//!
//! A scan produces `ScannedMedia` records; `MediaStore::upsert_many` turns
//! them into `MediaItem` rows keyed by file path, so rescanning the same
//! library updates rows in place instead of duplicating them.

mod filename;
mod scanner;
mod sqlite;
mod types;

pub use filename::{parse_filename, ParsedFilename};
pub use scanner::{has_extension, FilesystemScanner, SUBTITLE_EXTENSIONS, VIDEO_EXTENSIONS};
pub use sqlite::SqliteMediaStore;
pub use types::*;

use crate::storage::StorageError;

/// Trait for media item storage.
pub trait MediaStore: Send + Sync {
    /// Insert new items and update existing ones (matched by file path)
    /// in a single transaction.
    fn upsert_many(&self, items: &[ScannedMedia]) -> Result<UpsertSummary, StorageError>;

    /// Get an item by id.
    fn get(&self, id: i64) -> Result<Option<MediaItem>, StorageError>;

    /// Get an item by its file path.
    fn get_by_path(&self, file_path: &str) -> Result<Option<MediaItem>, StorageError>;

    /// List items, most recently updated first.
    fn list(&self, filter: &MediaFilter) -> Result<Vec<MediaItem>, StorageError>;

    /// Count items matching the filter (the limit is ignored).
    fn count(&self, filter: &MediaFilter) -> Result<i64, StorageError>;

    /// Record that a subtitle now exists for the item.
    fn mark_has_subtitle(&self, id: i64) -> Result<(), StorageError>;
}
