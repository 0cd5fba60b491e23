//! YouTube Data API v3 client
//!
//! Lists top-level comments through `commentThreads.list` and rejects
//! comments through `comments.setModerationStatus`. Responses are decoded
//! into explicit structs; missing or malformed fields become typed defaults.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use commentguard_core::{
    CommentSource, Error, RemoteComment, RemoteModerationStatus, RemoteModerator, Result,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::settings::YoutubeSettings;

/// Largest `maxResults` the API accepts
pub const MAX_PAGE_SIZE: usize = 100;

/// `commentThreads.list` response body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadListResponse {
    #[serde(default)]
    pub items: Vec<CommentThread>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThread {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub snippet: Option<ThreadSnippet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSnippet {
    #[serde(default)]
    pub top_level_comment: Option<TopLevelComment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopLevelComment {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub snippet: Option<CommentSnippet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentSnippet {
    #[serde(default)]
    pub text_display: Option<String>,

    #[serde(default)]
    pub text_original: Option<String>,

    #[serde(default)]
    pub author_display_name: Option<String>,

    #[serde(default)]
    pub like_count: Option<i64>,

    #[serde(default)]
    pub published_at: Option<String>,
}

impl CommentThread {
    /// Convert to a remote comment, or `None` when no id is present
    pub fn into_remote(self) -> Option<RemoteComment> {
        let top = self.snippet.and_then(|s| s.top_level_comment);
        let (top_id, snippet) = match top {
            Some(top) => (top.id, top.snippet.unwrap_or_default()),
            None => (None, CommentSnippet::default()),
        };

        let id = top_id.or(self.id).filter(|id| !id.is_empty())?;
        let published_at = snippet.published_at.as_deref().and_then(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| warn!(comment_id = %id, published_at = %raw, error = %e, "Malformed publish time"))
                .ok()
        });

        Some(RemoteComment {
            id,
            author: snippet.author_display_name.unwrap_or_default(),
            text: snippet
                .text_display
                .or(snippet.text_original)
                .unwrap_or_default(),
            like_count: snippet.like_count.unwrap_or(0).max(0),
            published_at,
        })
    }
}

/// Decode a `commentThreads.list` body, skipping items without an id
pub fn parse_comment_threads(video_id: &str, body: &str) -> Result<Vec<RemoteComment>> {
    let response: CommentThreadListResponse = serde_json::from_str(body)?;
    let total = response.items.len();
    let comments: Vec<RemoteComment> = response
        .items
        .into_iter()
        .filter_map(CommentThread::into_remote)
        .collect();

    if comments.len() < total {
        warn!(
            video_id = %video_id,
            skipped = total - comments.len(),
            "Skipped comment threads without an id"
        );
    }
    Ok(comments)
}

/// Client for the YouTube Data API
pub struct YoutubeClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    access_token: Option<String>,
}

impl YoutubeClient {
    pub fn new(settings: &YoutubeSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
            access_token: settings.access_token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Whether moderation actions can be attempted
    pub fn can_moderate(&self) -> bool {
        self.access_token.is_some()
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        match (&self.access_token, &self.api_key) {
            (Some(token), _) => Ok(request.bearer_auth(token)),
            (None, Some(key)) => Ok(request.query(&[("key", key.as_str())])),
            (None, None) => Err(Error::remote_unavailable(
                "no YouTube API key or access token configured",
            )),
        }
    }
}

/// Map transport failures to service unavailability
fn transport_error(e: reqwest::Error) -> Error {
    Error::remote_unavailable(format!("YouTube API unreachable: {}", e))
}

/// A moderation request that timed out after connecting may have been
/// applied, so it fails the action rather than the service
fn moderation_transport_error(comment_id: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() && !e.is_connect() {
        Error::remote_action(
            comment_id,
            format!("setModerationStatus timed out: {}", e),
        )
    } else {
        transport_error(e)
    }
}

#[async_trait]
impl CommentSource for YoutubeClient {
    async fn list_comments(&self, video_id: &str, page_size: usize) -> Result<Vec<RemoteComment>> {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE).to_string();
        let request = self
            .http
            .get(format!("{}/commentThreads", self.base_url))
            .query(&[
                ("part", "snippet"),
                ("videoId", video_id),
                ("maxResults", page_size.as_str()),
            ]);

        let response = self
            .authorize(request)?
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if status == StatusCode::NOT_FOUND {
            return Err(Error::not_found(format!("video {}", video_id)));
        }
        if !status.is_success() {
            return Err(Error::remote_unavailable(format!(
                "commentThreads.list for {} returned {}: {}",
                video_id, status, body
            )));
        }

        let comments = parse_comment_threads(video_id, &body)?;
        debug!(video_id = %video_id, count = comments.len(), "Fetched comments");
        Ok(comments)
    }

    fn name(&self) -> &str {
        "youtube"
    }
}

#[async_trait]
impl RemoteModerator for YoutubeClient {
    async fn set_moderation_status(
        &self,
        comment_id: &str,
        status: RemoteModerationStatus,
    ) -> Result<()> {
        let Some(token) = &self.access_token else {
            return Err(Error::remote_unavailable(
                "moderation requires an OAuth access token",
            ));
        };

        let response = self
            .http
            .post(format!("{}/comments/setModerationStatus", self.base_url))
            .bearer_auth(token)
            .query(&[("id", comment_id), ("moderationStatus", status.as_str())])
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(|e| moderation_transport_error(comment_id, e))?;

        match response.status() {
            s if s.is_success() => {
                debug!(comment_id = %comment_id, status = status.as_str(), "Remote moderation applied");
                Ok(())
            }
            StatusCode::UNAUTHORIZED => Err(Error::remote_unavailable(
                "access token rejected by YouTube API",
            )),
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::remote_action(
                    comment_id,
                    format!("setModerationStatus returned {}: {}", s, body),
                ))
            }
        }
    }
}
