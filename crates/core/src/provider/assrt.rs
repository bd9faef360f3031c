//! ASSRT (assrt.net) subtitle catalog client.
//!
//! ASSRT authenticates with a per-user token passed as a query parameter.
//! The free tier allows about 20 requests per minute per token and IP.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::rate_limiter::RateLimiterPool;
use super::{
    base_name, ensure_success, fetch_bytes, first_non_empty, DownloadedSubtitle, ProviderError,
    SubtitleProvider, SubtitleQuery, WithRaw,
};
use crate::candidate::SubtitleCandidate;
use crate::credential::{vault::TOKEN_FIELD, Credential};
use crate::language::{normalize_language, score_by_language};

/// Provider name.
pub const ASSRT: &str = "assrt";

const DEFAULT_BASE_URL: &str = "https://api.assrt.net";
const NOTE: &str = "ASSRT free tier starts at 20 req/min per token+IP";

/// ASSRT API client.
pub struct AssrtProvider {
    client: Client,
    base_url: String,
    limiter: RateLimiterPool,
}

impl AssrtProvider {
    /// Create a client limited to `rate_limit_rpm` requests per minute per token.
    pub fn new(rate_limit_rpm: u32) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(Duration::from_secs(20)).build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            limiter: RateLimiterPool::new(rate_limit_rpm),
        })
    }

    /// Point the client at another host (used by tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn token(credential: &Credential) -> Result<&str, ProviderError> {
        credential
            .get(TOKEN_FIELD)
            .ok_or_else(|| ProviderError::MissingCredential(format!("{} {}", ASSRT, TOKEN_FIELD)))
    }

    async fn fetch_detail(&self, token: &str, id: &str) -> Result<DetailItem, ProviderError> {
        let url = format!("{}/v1/sub/detail", self.base_url);

        debug!("ASSRT detail: id={}", id);

        self.limiter.try_acquire(token).await?;
        let response = self
            .client
            .get(&url)
            .query(&[("token", token), ("id", id)])
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let payload: ApiResponse<DetailItem> = response.json().await.map_err(|e| {
            ProviderError::Decode(format!("Failed to parse ASSRT detail response: {}", e))
        })?;
        payload
            .into_subs()?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NotFound(format!("ASSRT subtitle {}", id)))
    }
}

#[async_trait]
impl SubtitleProvider for AssrtProvider {
    fn name(&self) -> &str {
        ASSRT
    }

    fn display_name(&self) -> &str {
        "ASSRT"
    }

    fn note(&self) -> Option<&str> {
        Some(NOTE)
    }

    fn supports_download(&self) -> bool {
        true
    }

    fn accepts_raw_token(&self) -> bool {
        true
    }

    async fn search(
        &self,
        credential: &Credential,
        query: &SubtitleQuery,
    ) -> Result<Vec<SubtitleCandidate>, ProviderError> {
        let token = Self::token(credential)?;
        let q = query.search_text(true);
        if q.is_empty() {
            return Err(ProviderError::EmptyQuery);
        }

        let url = format!("{}/v1/sub/search", self.base_url);

        debug!("ASSRT search: query='{}', limit={}", q, query.limit);

        let cnt = query.limit.to_string();
        self.limiter.try_acquire(token).await?;
        let response = self
            .client
            .get(&url)
            .query(&[("token", token), ("q", q.as_str()), ("cnt", cnt.as_str())])
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let payload: ApiResponse<WithRaw<SubItem>> = response.json().await.map_err(|e| {
            ProviderError::Decode(format!("Failed to parse ASSRT search response: {}", e))
        })?;

        Ok(to_candidates(payload.into_subs()?, query))
    }

    async fn download(
        &self,
        credential: &Credential,
        candidate: &SubtitleCandidate,
    ) -> Result<DownloadedSubtitle, ProviderError> {
        let token = Self::token(credential)?;
        let id = candidate.candidate_id.trim();
        if id.is_empty() {
            return Err(ProviderError::NotFound("empty ASSRT candidate id".to_string()));
        }

        let detail = self.fetch_detail(token, id).await?;
        let (url, filename) = detail.download_target().ok_or_else(|| {
            ProviderError::NotFound(format!("ASSRT subtitle {} has no download url", id))
        })?;

        let bytes = fetch_bytes(&self.client, &url).await?;
        let filename = filename
            .as_deref()
            .and_then(base_name)
            .unwrap_or_else(|| format!("assrt_{}.srt", id));

        Ok(DownloadedSubtitle {
            filename,
            bytes,
            note: Some("assrt detail download".to_string()),
        })
    }
}

/// Envelope shared by the search and detail endpoints.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: i64,
    #[serde(default)]
    errmsg: Option<String>,
    #[serde(default = "SubList::empty")]
    sub: SubList<T>,
}

impl<T> ApiResponse<T> {
    /// ASSRT reports failures in-band with a non-zero `status`.
    fn into_subs(self) -> Result<Vec<T>, ProviderError> {
        if self.status != 0 {
            return Err(ProviderError::Api {
                status: 200,
                message: format!(
                    "assrt status {}: {}",
                    self.status,
                    self.errmsg.unwrap_or_default()
                ),
            });
        }
        Ok(self.sub.subs)
    }
}

#[derive(Debug, Deserialize)]
struct SubList<T> {
    #[serde(default = "Vec::new")]
    subs: Vec<T>,
}

impl<T> SubList<T> {
    fn empty() -> Self {
        Self { subs: Vec::new() }
    }
}

#[derive(Debug, Default, Deserialize)]
struct LangDesc {
    #[serde(default)]
    desc: String,
}

#[derive(Debug, Deserialize)]
struct SubItem {
    id: i64,
    #[serde(default)]
    native_name: Option<String>,
    #[serde(default)]
    videoname: Option<String>,
    #[serde(default)]
    lang: Option<LangDesc>,
    #[serde(default)]
    vote_score: Option<f64>,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailFile {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    f: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailItem {
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    filelist: Vec<DetailFile>,
}

impl DetailItem {
    /// First file-list entry with a URL, else the archive URL.
    fn download_target(&self) -> Option<(String, Option<String>)> {
        for file in &self.filelist {
            if let Some(url) = first_non_empty(&[file.url.as_deref().unwrap_or_default()]) {
                let name = file
                    .f
                    .as_deref()
                    .and_then(|f| first_non_empty(&[f]))
                    .or_else(|| self.filename.as_deref())
                    .map(str::to_string);
                return Some((url.to_string(), name));
            }
        }

        first_non_empty(&[self.url.as_deref().unwrap_or_default()])
            .map(|url| (url.to_string(), self.filename.clone()))
    }
}

fn to_candidates(
    items: Vec<WithRaw<SubItem>>,
    query: &SubtitleQuery,
) -> Vec<SubtitleCandidate> {
    let now = Utc::now();
    items
        .into_iter()
        .take(query.limit)
        .map(|WithRaw { item, raw }| {
            let lang_desc = item.lang.as_ref().map(|l| l.desc.as_str()).unwrap_or_default();
            let (language, language_label) = normalize_language(lang_desc);
            let native_name = item.native_name.as_deref().unwrap_or_default();
            let videoname = item.videoname.as_deref().unwrap_or_default();
            let title = first_non_empty(&[native_name, videoname, query.title.as_str()])
                .unwrap_or_default()
                .to_string();
            let relevance = item.vote_score.unwrap_or(0.0);

            SubtitleCandidate {
                media_id: query.media_id,
                provider: ASSRT.to_string(),
                candidate_id: item.id.to_string(),
                title,
                release_name: videoname.to_string(),
                score: score_by_language(&query.language_priority, &language) + relevance,
                language,
                language_label,
                relevance,
                details: item.detail.clone().unwrap_or_default(),
                raw_payload: raw,
                expires_at: None,
                created_at: now,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaType;

    fn query() -> SubtitleQuery {
        SubtitleQuery {
            media_id: 3,
            title: "Show".to_string(),
            media_type: MediaType::Episode,
            year: None,
            season: Some(1),
            episode: Some(2),
            file_path: "/media/Show.S01E02.mkv".to_string(),
            limit: 2,
            language_priority: vec!["bilingual".to_string(), "zh-cn".to_string()],
        }
    }

    const SEARCH_BODY: &str = r#"{
        "status": 0,
        "sub": {
            "subs": [
                {"id": 101, "native_name": "节目", "videoname": "Show.S01E02.WEB", "lang": {"desc": "简英"}, "vote_score": 4.5, "detail": "good"},
                {"id": 102, "native_name": "", "videoname": "Show.S01E02.HDTV", "lang": {"desc": "简体"}, "vote_score": null, "upload_time": "2024-01-02"},
                {"id": 103, "videoname": "extra"}
            ]
        }
    }"#;

    #[test]
    fn test_search_response_to_candidates() {
        let payload: ApiResponse<WithRaw<SubItem>> = serde_json::from_str(SEARCH_BODY).unwrap();
        let candidates = to_candidates(payload.into_subs().unwrap(), &query());

        // Capped at the query limit.
        assert_eq!(candidates.len(), 2);

        let first = &candidates[0];
        assert_eq!(first.candidate_id, "101");
        assert_eq!(first.title, "节目");
        assert_eq!(first.language, "bilingual");
        assert_eq!(first.language_label, "简英");
        assert_eq!(first.relevance, 4.5);
        assert_eq!(first.score, 24.5);
        assert_eq!(first.details, "good");
        assert_eq!(first.media_id, 3);

        let second = &candidates[1];
        assert_eq!(second.title, "Show.S01E02.HDTV");
        assert_eq!(second.language, "zh-cn");
        assert_eq!(second.score, 10.0);
        assert_eq!(second.relevance, 0.0);
        assert!(second.raw_payload.contains(r#""id": 102"#));
        assert!(second.raw_payload.contains(r#""upload_time": "2024-01-02""#));
    }

    #[test]
    fn test_nonzero_status_is_api_error() {
        let payload: ApiResponse<WithRaw<SubItem>> =
            serde_json::from_str(r#"{"status": 101, "errmsg": "invalid token"}"#).unwrap();
        match payload.into_subs() {
            Err(ProviderError::Api { message, .. }) => assert!(message.contains("invalid token")),
            other => panic!("Expected Api error, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_detail_prefers_file_list() {
        let detail: ApiResponse<DetailItem> = serde_json::from_str(
            r#"{"status":0,"sub":{"subs":[{"id":1,"filename":"pack.zip","url":"http://x/pack.zip",
                "filelist":[{"url":"","f":"skip.srt"},{"url":"http://x/a.ass","f":"a.ass"}]}]}}"#,
        )
        .unwrap();
        let item = detail.into_subs().unwrap().into_iter().next().unwrap();

        let (url, name) = item.download_target().unwrap();
        assert_eq!(url, "http://x/a.ass");
        assert_eq!(name.as_deref(), Some("a.ass"));
    }

    #[test]
    fn test_detail_falls_back_to_archive_url() {
        let item: DetailItem =
            serde_json::from_str(r#"{"filename":"pack.zip","url":"http://x/pack.zip"}"#).unwrap();
        let (url, name) = item.download_target().unwrap();
        assert_eq!(url, "http://x/pack.zip");
        assert_eq!(name.as_deref(), Some("pack.zip"));

        let empty: DetailItem = serde_json::from_str(r#"{}"#).unwrap();
        assert!(empty.download_target().is_none());
    }

    #[tokio::test]
    async fn test_search_requires_token() {
        let provider = AssrtProvider::new(20).unwrap();
        let err = provider.search(&Credential::new(), &query()).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredential(_)));
    }

    #[tokio::test]
    async fn test_search_rejects_empty_query() {
        let provider = AssrtProvider::new(20).unwrap();
        let mut q = query();
        q.title = " ".to_string();
        q.media_type = MediaType::Movie;

        let err = provider
            .search(&Credential::new().with("token", "t"), &q)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EmptyQuery));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let provider = AssrtProvider::new(20)
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        let err = provider
            .search(&Credential::new().with("token", "t"), &query())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
    }
}
