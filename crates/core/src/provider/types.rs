//! Types shared by subtitle providers.

use serde::{Deserialize, Serialize};

use crate::media::{MediaItem, MediaType};
use crate::settings::Settings;

/// Default number of results requested from each provider.
pub const DEFAULT_RESULT_LIMIT: usize = 20;

/// Search input derived from a media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleQuery {
    pub media_id: i64,
    pub title: String,
    pub media_type: MediaType,
    pub year: Option<u32>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub file_path: String,
    /// Maximum number of candidates a provider may return.
    pub limit: usize,
    pub language_priority: Vec<String>,
}

impl SubtitleQuery {
    /// Build a query for a media item with the operator's settings.
    pub fn from_media(media: &MediaItem, settings: &Settings, limit: usize) -> Self {
        Self {
            media_id: media.id,
            title: media.title.trim().to_string(),
            media_type: media.media_type,
            year: media.year,
            season: media.season,
            episode: media.episode,
            file_path: media.file_path.clone(),
            limit: if limit == 0 { DEFAULT_RESULT_LIMIT } else { limit },
            language_priority: settings.language_priority.clone(),
        }
    }

    /// Free-text query: title, then `SxxEyy` for episodes, then the year
    /// when requested.
    pub fn search_text(&self, include_year: bool) -> String {
        let mut text = self.title.trim().to_string();
        if self.media_type == MediaType::Episode {
            if let (Some(season), Some(episode)) = (self.season, self.episode) {
                text = format!("{} S{:02}E{:02}", text, season, episode);
            }
        }
        if include_year {
            if let Some(year) = self.year {
                text = format!("{} {}", text, year);
            }
        }
        text.trim().to_string()
    }
}

/// Subtitle file fetched from a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedSubtitle {
    /// File name suggested by the provider (base name only).
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Provider remark such as remaining quota.
    pub note: Option<String>,
}

/// Provider capabilities and configuration state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub name: String,
    pub display_name: String,
    pub configured: bool,
    pub supports_search: bool,
    pub supports_download: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn media(media_type: MediaType, title: &str) -> MediaItem {
        MediaItem {
            id: 7,
            media_type,
            title: title.to_string(),
            year: Some(2010),
            season: Some(2),
            episode: Some(5),
            file_path: "/media/show.mkv".to_string(),
            file_hash: None,
            has_subtitle: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_search_text_episode() {
        let settings = Settings::with_output_path("/subs");
        let query = SubtitleQuery::from_media(&media(MediaType::Episode, " Show "), &settings, 0);

        assert_eq!(query.limit, DEFAULT_RESULT_LIMIT);
        assert_eq!(query.search_text(false), "Show S02E05");
        assert_eq!(query.search_text(true), "Show S02E05 2010");
    }

    #[test]
    fn test_search_text_movie_ignores_episode_numbers() {
        let settings = Settings::with_output_path("/subs");
        let query = SubtitleQuery::from_media(&media(MediaType::Movie, "Movie"), &settings, 5);

        assert_eq!(query.limit, 5);
        assert_eq!(query.search_text(true), "Movie 2010");
        assert_eq!(query.search_text(false), "Movie");
    }

    #[test]
    fn test_search_text_empty_title() {
        let settings = Settings::with_output_path("/subs");
        let mut item = media(MediaType::Movie, "  ");
        item.year = None;
        let query = SubtitleQuery::from_media(&item, &settings, 5);

        assert!(query.search_text(true).is_empty());
    }
}
