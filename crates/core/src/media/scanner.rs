//! Filesystem scanner.
//!
//! Walks library roots, keeps video files, infers their identity from the
//! filename and checks for a subtitle sidecar next to each one. The scanner
//! never writes anything; persisting the result is the caller's job.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::filename::parse_filename;
use super::{ScanError, ScanResult, ScannedMedia};

/// Video file extensions we recognize (lowercase, without the dot).
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "flv", "m4v", "ts", "m2ts", "webm",
];

/// Subtitle file extensions that count as a sidecar.
pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa", "vtt", "sub"];

/// Scanner for video files under a set of library roots.
#[derive(Debug, Clone)]
pub struct FilesystemScanner {
    follow_links: bool,
}

impl Default for FilesystemScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl FilesystemScanner {
    pub fn new() -> Self {
        Self {
            follow_links: false,
        }
    }

    /// Follow symbolic links while walking.
    pub fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Scan every root and return one record per unique video file.
    ///
    /// Blank roots and roots that do not exist are skipped. A root that
    /// exists but is not a readable directory is reported in `root_errors`
    /// while the other roots still contribute; only when every attempted
    /// root fails does the scan return an error.
    pub fn scan<S: AsRef<str>>(&self, roots: &[S]) -> Result<ScanResult, ScanError> {
        let mut items = Vec::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut sidecars = SidecarIndex::default();
        let mut root_errors = Vec::new();
        let mut attempted = 0usize;

        for root in roots {
            let root = root.as_ref().trim();
            if root.is_empty() {
                continue;
            }
            let Ok(metadata) = std::fs::metadata(root) else {
                warn!(root = %root, "Scan root does not exist, skipping");
                continue;
            };
            attempted += 1;

            let scanned = if metadata.is_dir() {
                self.scan_root(Path::new(root), &mut seen, &mut sidecars)
            } else {
                Err("not a directory".to_string())
            };
            match scanned {
                Ok(found) => {
                    debug!(root = %root, files = found.len(), "Scanned root");
                    items.extend(found);
                }
                Err(message) => {
                    warn!(root = %root, error = %message, "Failed to scan root");
                    root_errors.push(ScanError::Root {
                        root: root.to_string(),
                        message,
                    });
                }
            }
        }

        if attempted > 0 && root_errors.len() == attempted {
            return Err(ScanError::AllRootsFailed(root_errors));
        }

        items.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        let missing = items.iter().filter(|item| !item.has_subtitle).count();

        Ok(ScanResult {
            scanned_video_files: items.len(),
            missing_subtitle_files: missing,
            items,
            root_errors,
        })
    }

    /// Walk a single root. Errors below the root are skipped; an error on
    /// the root itself fails the whole root.
    fn scan_root(
        &self,
        root: &Path,
        seen: &mut HashSet<PathBuf>,
        sidecars: &mut SidecarIndex,
    ) -> Result<Vec<ScannedMedia>, String> {
        let mut found = Vec::new();

        for entry in WalkDir::new(root).follow_links(self.follow_links) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(e.to_string()),
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }
            if !has_extension(entry.path(), VIDEO_EXTENSIONS) {
                continue;
            }

            let absolute = clean_path(entry.path());
            if !seen.insert(absolute.clone()) {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            let parsed = parse_filename(&file_name);
            let has_subtitle = sidecars.has_sidecar(&absolute);

            found.push(ScannedMedia {
                media_type: parsed.media_type,
                title: parsed.title,
                year: parsed.year,
                season: parsed.season,
                episode: parsed.episode,
                file_path: absolute.to_string_lossy().into_owned(),
                file_hash: None,
                has_subtitle,
            });
        }

        Ok(found)
    }
}

/// Check whether a path's extension (case-insensitive) is in `extensions`.
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            extensions.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Absolute form of `path` with `.` and `..` resolved lexically, so the
/// same file reached through differently spelled roots has one path.
pub fn clean_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(cleaned.components().next_back(), Some(Component::Normal(_))) {
                    cleaned.pop();
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

/// Subtitle filenames per directory, read once per directory per scan.
#[derive(Default)]
struct SidecarIndex {
    by_dir: HashMap<PathBuf, Vec<String>>,
}

impl SidecarIndex {
    /// A sidecar is any subtitle file in the same directory named
    /// `<stem>.<anything>` where the final extension is a subtitle one,
    /// e.g. `Movie.srt` or `Movie.en.forced.ass` for `Movie.mkv`.
    fn has_sidecar(&mut self, video: &Path) -> bool {
        let (Some(dir), Some(stem)) = (video.parent(), video.file_stem()) else {
            return false;
        };
        let prefix = format!("{}.", stem.to_string_lossy());

        let subtitles = self
            .by_dir
            .entry(dir.to_path_buf())
            .or_insert_with(|| list_subtitles(dir));

        subtitles.iter().any(|name| name.starts_with(&prefix))
    }
}

fn list_subtitles(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| has_extension(&entry.path(), SUBTITLE_EXTENSIONS))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect()
}
