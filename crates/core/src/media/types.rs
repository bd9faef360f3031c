//! Types for the media library.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of video a file was identified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Episode,
}

impl MediaType {
    /// Stable string form used in the database and the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Episode => "episode",
        }
    }

    /// Parse the stable string form. Unknown values read as `Movie`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "episode" => MediaType::Episode,
            _ => MediaType::Movie,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity inferred for one video file during a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedMedia {
    pub media_type: MediaType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    /// Absolute path of the video file. Unique across the library.
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    /// Whether a subtitle sidecar was found next to the video.
    pub has_subtitle: bool,
}

/// A persisted media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: i64,
    pub media_type: MediaType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    pub has_subtitle: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Output of a filesystem scan.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// One record per unique video file, sorted by path.
    pub items: Vec<ScannedMedia>,
    pub scanned_video_files: usize,
    pub missing_subtitle_files: usize,
    /// Roots that could not be walked. Their files are absent from `items`.
    pub root_errors: Vec<ScanError>,
}

/// Counts reported by a bulk upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
}

/// Filter for listing media items.
#[derive(Debug, Clone)]
pub struct MediaFilter {
    /// Only items without a subtitle.
    pub missing_subtitle_only: bool,
    pub limit: i64,
}

impl Default for MediaFilter {
    fn default() -> Self {
        Self {
            missing_subtitle_only: false,
            limit: 200,
        }
    }
}

/// Errors that can occur while scanning.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("scan path {root}: {message}")]
    Root { root: String, message: String },

    #[error("all {} scan roots failed", .0.len())]
    AllRootsFailed(Vec<ScanError>),
}
