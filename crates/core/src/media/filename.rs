//! Best-effort identity inference from release-style filenames.
//!
//! Handles the common scene layouts:
//! - `Show.Name.S02E05.1080p.WEB-DL.mkv`
//! - `Movie.Name.2010.BluRay.x264.mkv`
//! - `Show_Name_-_s1e3.mp4`

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::Path;

use super::scanner::{has_extension, SUBTITLE_EXTENSIONS, VIDEO_EXTENSIONS};
use super::MediaType;

/// Season/episode marker. Applied to the normalized name padded with spaces,
/// so the leading separator also matches at the start of the name.
static EPISODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[ ._-]s(\d{1,2})e(\d{1,2})").expect("valid episode pattern"));

/// Four-digit year between 1900 and 2099.
static YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("valid year pattern"));

/// Identity extracted from a filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    pub media_type: MediaType,
    pub title: String,
    pub year: Option<u32>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

/// Parse a bare filename (with or without extension).
///
/// Only a video or subtitle extension is stripped, so an already stripped
/// stem such as `Show.S02E05` keeps its last token.
///
/// Never fails: a name with no recognizable markers becomes a movie whose
/// title is the normalized name.
pub fn parse_filename(filename: &str) -> ParsedFilename {
    let name = strip_media_extension(filename);

    let normalized = normalize(name);
    let padded = format!(" {} ", normalized);

    let mut media_type = MediaType::Movie;
    let mut season = None;
    let mut episode = None;
    let mut title = normalized.clone();

    if let Some(caps) = EPISODE_PATTERN.captures(&padded) {
        media_type = MediaType::Episode;
        season = caps.get(1).and_then(|m| m.as_str().parse().ok());
        episode = caps.get(2).and_then(|m| m.as_str().parse().ok());

        if let Some(whole) = caps.get(0) {
            let before = padded[..whole.start()].trim();
            if !before.is_empty() {
                title = before.to_string();
            }
        }
    }

    let year: Option<u32> = YEAR_PATTERN
        .find(&normalized)
        .and_then(|m| m.as_str().parse().ok());

    if let Some(y) = year {
        title = collapse_whitespace(&title.replace(&y.to_string(), ""));
    }

    if title.is_empty() {
        title = name.to_string();
    }

    ParsedFilename {
        media_type,
        title,
        year,
        season,
        episode,
    }
}

fn strip_media_extension(filename: &str) -> &str {
    let path = Path::new(filename);
    if !has_extension(path, VIDEO_EXTENSIONS) && !has_extension(path, SUBTITLE_EXTENSIONS) {
        return filename;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
}

/// Replace scene separators with spaces and collapse runs of whitespace.
fn normalize(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| match c {
            '.' | '_' | '-' => ' ',
            other => other,
        })
        .collect();
    collapse_whitespace(&spaced)
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
