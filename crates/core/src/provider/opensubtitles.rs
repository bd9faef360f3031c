//! OpenSubtitles.com REST API client.
//!
//! Searching needs only an API key. Downloads need a user token, either
//! stored directly or obtained by logging in with username and password.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{
    base_name, ensure_success, fetch_bytes, first_non_empty, DownloadedSubtitle, ProviderError,
    SubtitleProvider, SubtitleQuery, WithRaw,
};
use crate::candidate::SubtitleCandidate;
use crate::credential::{vault::TOKEN_FIELD, Credential};
use crate::language::{normalize_language, score_by_language};
use crate::media::MediaType;

/// Provider name.
pub const OPENSUBTITLES: &str = "opensubtitles";

/// User agent sent when the credential does not name one.
pub const DEFAULT_USER_AGENT: &str = "SubScout v0.1.0";

const DEFAULT_BASE_URL: &str = "https://api.opensubtitles.com/api/v1";
const SEARCH_LANGUAGES: &str = "zh-cn,zh-tw,zh,en";
const DOWNLOADS_PER_POINT: f64 = 200.0;
const TRUSTED_BONUS: f64 = 2.0;

/// OpenSubtitles.com API client.
pub struct OpenSubtitlesProvider {
    client: Client,
    base_url: String,
}

/// Fields read from the stored credential.
struct Auth<'a> {
    api_key: &'a str,
    user_agent: &'a str,
}

impl OpenSubtitlesProvider {
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(Duration::from_secs(20)).build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at another host (used by tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn auth(credential: &Credential) -> Result<Auth<'_>, ProviderError> {
        let api_key = credential.get("api_key").ok_or_else(|| {
            ProviderError::MissingCredential(format!("{} api_key", OPENSUBTITLES))
        })?;
        Ok(Auth {
            api_key,
            user_agent: credential.get("user_agent").unwrap_or(DEFAULT_USER_AGENT),
        })
    }

    fn with_headers(request: RequestBuilder, auth: &Auth<'_>) -> RequestBuilder {
        request
            .header("Api-Key", auth.api_key)
            .header(reqwest::header::USER_AGENT, auth.user_agent)
    }

    /// Stored token, else a login token when username and password are set.
    async fn resolve_token(
        &self,
        auth: &Auth<'_>,
        credential: &Credential,
    ) -> Result<Option<String>, ProviderError> {
        if let Some(token) = credential.get(TOKEN_FIELD) {
            return Ok(Some(token.to_string()));
        }
        match (credential.get("username"), credential.get("password")) {
            (Some(username), Some(password)) => {
                self.login(auth, username, password).await.map(Some)
            }
            _ => Ok(None),
        }
    }

    async fn login(
        &self,
        auth: &Auth<'_>,
        username: &str,
        password: &str,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/login", self.base_url);

        debug!("OpenSubtitles login: username='{}'", username);

        let request = self.client.post(&url).json(&serde_json::json!({
            "username": username,
            "password": password,
        }));
        let response = Self::with_headers(request, auth).send().await?;
        let response = ensure_success(response).await?;

        let payload: LoginResponse = response.json().await.map_err(|e| {
            ProviderError::Decode(format!("Failed to parse login response: {}", e))
        })?;
        first_non_empty(&[payload.token.as_deref().unwrap_or_default()])
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Decode("empty login token".to_string()))
    }
}

#[async_trait]
impl SubtitleProvider for OpenSubtitlesProvider {
    fn name(&self) -> &str {
        OPENSUBTITLES
    }

    fn display_name(&self) -> &str {
        "OpenSubtitles.com"
    }

    fn note(&self) -> Option<&str> {
        Some("OpenSubtitles.com API only")
    }

    fn supports_download(&self) -> bool {
        true
    }

    async fn search(
        &self,
        credential: &Credential,
        query: &SubtitleQuery,
    ) -> Result<Vec<SubtitleCandidate>, ProviderError> {
        let auth = Self::auth(credential)?;
        let q = query.search_text(false);
        if q.is_empty() {
            return Err(ProviderError::EmptyQuery);
        }

        // Searching works anonymously, so a failed login only loses the token.
        let token = match self.resolve_token(&auth, credential).await {
            Ok(token) => token,
            Err(e) => {
                warn!("OpenSubtitles login failed, searching anonymously: {}", e);
                None
            }
        };

        let url = format!("{}/subtitles", self.base_url);

        debug!("OpenSubtitles search: query='{}', year={:?}", q, query.year);

        let mut params: Vec<(&str, String)> = vec![
            ("query", q.clone()),
            ("languages", SEARCH_LANGUAGES.to_string()),
            ("order_by", "download_count".to_string()),
            ("order_direction", "desc".to_string()),
        ];
        if let Some(year) = query.year {
            params.push(("year", year.to_string()));
        }
        if query.media_type == MediaType::Episode {
            if let Some(season) = query.season {
                params.push(("season_number", season.to_string()));
            }
            if let Some(episode) = query.episode {
                params.push(("episode_number", episode.to_string()));
            }
        }

        let mut request = Self::with_headers(self.client.get(&url), &auth).query(&params);
        if let Some(token) = &token {
            request = request.bearer_auth(token);
        }

        let response = ensure_success(request.send().await?).await?;
        let payload: SearchResponse = response.json().await.map_err(|e| {
            ProviderError::Decode(format!("Failed to parse search response: {}", e))
        })?;

        Ok(to_candidates(payload.data, query))
    }

    async fn download(
        &self,
        credential: &Credential,
        candidate: &SubtitleCandidate,
    ) -> Result<DownloadedSubtitle, ProviderError> {
        let auth = Self::auth(credential)?;
        let token = self.resolve_token(&auth, credential).await?.ok_or_else(|| {
            ProviderError::MissingCredential(format!(
                "{} token or username/password",
                OPENSUBTITLES
            ))
        })?;

        let file_id: i64 = candidate
            .candidate_id
            .trim()
            .parse()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| {
                ProviderError::NotFound(format!("invalid file id: {}", candidate.candidate_id))
            })?;

        let url = format!("{}/download", self.base_url);

        debug!("OpenSubtitles download: file_id={}", file_id);

        let request = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "file_id": file_id }))
            .bearer_auth(&token);
        let response = ensure_success(Self::with_headers(request, &auth).send().await?).await?;

        let payload: DownloadResponse = response.json().await.map_err(|e| {
            ProviderError::Decode(format!("Failed to parse download response: {}", e))
        })?;
        let link = payload.link()?;

        let bytes = fetch_bytes(&self.client, &link).await?;
        let filename = payload
            .file_name
            .as_deref()
            .and_then(base_name)
            .or_else(|| base_name(&candidate.release_name))
            .unwrap_or_else(|| format!("opensubtitles_{}.srt", file_id));

        Ok(DownloadedSubtitle {
            filename,
            bytes,
            note: Some(format!(
                "requests={} remaining={}",
                payload.requests.unwrap_or_default(),
                payload.remaining.unwrap_or_default()
            )),
        })
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<WithRaw<SearchItem>>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    id: String,
    #[serde(default)]
    attributes: Attributes,
}

#[derive(Debug, Default, Deserialize)]
struct Attributes {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    release: Option<String>,
    #[serde(default)]
    download_count: Option<u64>,
    #[serde(default)]
    from_trusted: Option<bool>,
    #[serde(default)]
    files: Vec<FileEntry>,
    #[serde(default)]
    feature_details: Option<FeatureDetails>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    #[serde(default)]
    file_id: i64,
    #[serde(default)]
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeatureDetails {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    year: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    remaining: Option<i64>,
    #[serde(default)]
    requests: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

impl DownloadResponse {
    fn link(&self) -> Result<String, ProviderError> {
        if let Some(link) = first_non_empty(&[self.link.as_deref().unwrap_or_default()]) {
            return Ok(link.to_string());
        }
        let message = first_non_empty(&[self.message.as_deref().unwrap_or_default()])
            .unwrap_or("download response missing link");
        Err(ProviderError::Api {
            status: 200,
            message: message.to_string(),
        })
    }
}

fn to_candidates(
    items: Vec<WithRaw<SearchItem>>,
    query: &SubtitleQuery,
) -> Vec<SubtitleCandidate> {
    let now = Utc::now();
    items
        .into_iter()
        .take(query.limit)
        .map(|WithRaw { item, raw }| {
            let attrs = &item.attributes;
            let (language, language_label) =
                normalize_language(attrs.language.as_deref().unwrap_or_default());

            let first_file = attrs.files.first();
            let candidate_id = match first_file {
                Some(file) if file.file_id > 0 => file.file_id.to_string(),
                _ => item.id.trim().to_string(),
            };

            let feature_title = attrs
                .feature_details
                .as_ref()
                .and_then(|f| f.title.as_deref())
                .unwrap_or_default();
            let title = first_non_empty(&[feature_title, query.title.as_str()])
                .unwrap_or_default()
                .to_string();

            let release_name = first_non_empty(&[
                attrs.release.as_deref().unwrap_or_default(),
                first_file
                    .and_then(|f| f.file_name.as_deref())
                    .unwrap_or_default(),
            ])
            .unwrap_or_default()
            .to_string();

            let trusted = attrs.from_trusted.unwrap_or(false);
            let downloads = attrs.download_count.unwrap_or(0);
            let mut relevance = downloads as f64 / DOWNLOADS_PER_POINT;
            if trusted {
                relevance += TRUSTED_BONUS;
            }

            SubtitleCandidate {
                media_id: query.media_id,
                provider: OPENSUBTITLES.to_string(),
                candidate_id,
                title,
                release_name,
                score: score_by_language(&query.language_priority, &language) + relevance,
                language,
                language_label,
                relevance,
                details: format!(
                    "downloads={} trusted={}",
                    downloads, trusted
                ),
                raw_payload: raw,
                expires_at: None,
                created_at: now,
            }
        })
        .collect()
}
