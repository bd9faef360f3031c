//! Naming and writing downloaded subtitle files.

use std::io::ErrorKind;
use std::path::Path;

use tokio::io::AsyncWriteExt;

use super::SearchError;
use crate::language::UNKNOWN;

const DEFAULT_EXTENSION: &str = "srt";

/// File name for a downloaded subtitle: `<video stem>.<language>.<ext>`.
///
/// The extension comes from the provider's suggested file name and falls
/// back to `srt`.
pub fn subtitle_file_name(video_path: &str, language: &str, suggested: &str) -> String {
    let stem = Path::new(video_path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "subtitle".to_string());

    let extension = Path::new(suggested)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

    format!("{}.{}.{}", stem, language_tag(language), extension)
}

/// Language codes from providers are free text; keep them path-safe.
fn language_tag(language: &str) -> String {
    let tag: String = language
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if tag.trim_matches('_').is_empty() {
        UNKNOWN.to_string()
    } else {
        tag
    }
}

/// Write `bytes` to a file that must not exist yet.
pub(crate) async fn write_new_file(path: &Path, bytes: &[u8]) -> Result<(), SearchError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(SearchError::AlreadyExists(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}
