//! YouTube adapter (Data API v3)

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use social_gateway_domain::{
    AnalyticsReport, Capability, Cursor, DateRange, HistoryPage, MediaKind, PageStatus, Platform,
    PlatformError, PlatformOperations, PostContent, PostStatus, PublishOptions, PublishResult,
    PublishedPost, SocialAccount, SocialPage, TokenStore, Visibility,
};

use crate::common::{
    fetch_media_bytes, http_client, store_page_token, transport, vendor_failure, OAuthApp,
};

const API_BASE: &str = "https://www.googleapis.com";
const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// YouTube adapter. A "page" is a channel. Publishing is a two-step resumable
/// upload: metadata first, which yields a session URI in the `Location`
/// header, then the video bytes are PUT to that URI.
pub struct YouTubeAdapter {
    client: Client,
    oauth: OAuthApp,
    tokens: Arc<dyn TokenStore>,
    base_url: String,
}

impl YouTubeAdapter {
    pub fn new(oauth: OAuthApp, tokens: Arc<dyn TokenStore>) -> Self {
        Self::with_base_url(oauth, tokens, API_BASE.to_string())
    }

    pub fn with_base_url(oauth: OAuthApp, tokens: Arc<dyn TokenStore>, base_url: String) -> Self {
        Self {
            client: http_client(),
            oauth,
            tokens,
            base_url,
        }
    }

    async fn page_token(&self, page: &SocialPage) -> Result<String, PlatformError> {
        let token = self.tokens.get_secure_token(&page.id).await?;
        Ok(token.expose_secret().to_string())
    }

    /// Resolve the channel's uploads playlist for history listing
    async fn uploads_playlist(
        &self,
        token: &str,
        channel_id: &str,
    ) -> Result<String, PlatformError> {
        let url = format!("{}/youtube/v3/channels", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("part", "contentDetails"), ("id", channel_id)])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }

        let body: ChannelListResponse = response.json().await.map_err(transport)?;
        body.items
            .into_iter()
            .next()
            .and_then(|c| c.content_details)
            .map(|d| d.related_playlists.uploads)
            .ok_or_else(|| {
                PlatformError::upstream(404, format!("channel '{}' not found", channel_id))
            })
    }
}

#[derive(Serialize)]
struct VideoInsertRequest {
    snippet: VideoSnippet,
    status: VideoStatusBody,
}

#[derive(Serialize)]
struct VideoSnippet {
    title: String,
    description: String,
}

#[derive(Serialize)]
struct VideoStatusBody {
    #[serde(rename = "privacyStatus")]
    privacy_status: &'static str,
    #[serde(rename = "selfDeclaredMadeForKids", skip_serializing_if = "Option::is_none")]
    made_for_kids: Option<bool>,
    #[serde(rename = "publishAt", skip_serializing_if = "Option::is_none")]
    publish_at: Option<String>,
}

#[derive(Deserialize)]
struct VideoResource {
    id: String,
}

#[derive(Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelResource>,
}

#[derive(Deserialize)]
struct ChannelResource {
    id: String,
    #[serde(default)]
    snippet: Option<ChannelSnippet>,
    #[serde(default, rename = "contentDetails")]
    content_details: Option<ChannelContentDetails>,
}

#[derive(Deserialize)]
struct ChannelSnippet {
    title: String,
}

#[derive(Deserialize)]
struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists")]
    related_playlists: RelatedPlaylists,
}

#[derive(Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Deserialize)]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    #[serde(default, rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistItem {
    snippet: PlaylistItemSnippet,
}

#[derive(Deserialize)]
struct PlaylistItemSnippet {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(rename = "resourceId")]
    resource_id: ResourceId,
}

#[derive(Deserialize)]
struct ResourceId {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[derive(Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoStats>,
}

#[derive(Deserialize)]
struct VideoStats {
    statistics: Statistics,
}

/// YouTube reports counters as decimal strings
#[derive(Deserialize)]
struct Statistics {
    #[serde(default, rename = "viewCount")]
    view_count: Option<String>,
    #[serde(default, rename = "likeCount")]
    like_count: Option<String>,
    #[serde(default, rename = "commentCount")]
    comment_count: Option<String>,
}

fn parse_count(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.parse().ok())
}

#[async_trait]
impl PlatformOperations for YouTubeAdapter {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[
            Capability::AuthUrl,
            Capability::ConnectPage,
            Capability::PublishPost,
            Capability::PostHistory,
            Capability::PostAnalytics,
            Capability::DeletePost,
            Capability::PageStatus,
        ]
    }

    fn auth_url(&self, state: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&state={}&scope={}&access_type=offline&prompt=consent",
            AUTHORIZE_URL,
            urlencoding::encode(&self.oauth.client_id),
            urlencoding::encode(&self.oauth.redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode("https://www.googleapis.com/auth/youtube.upload https://www.googleapis.com/auth/youtube.readonly"),
        )
    }

    async fn connect_page(
        &self,
        account: &SocialAccount,
        selector: &str,
    ) -> Result<SocialPage, PlatformError> {
        let url = format!("{}/youtube/v3/channels", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&account.auth_token)
            .query(&[("part", "snippet"), ("id", selector)])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }

        let body: ChannelListResponse = response.json().await.map_err(transport)?;
        let channel = body.items.into_iter().next().ok_or_else(|| {
            PlatformError::upstream(404, format!("channel '{}' not found", selector))
        })?;

        let page = SocialPage {
            id: format!("yt_{}", channel.id),
            platform: Platform::YouTube,
            vendor_page_id: channel.id,
            name: channel
                .snippet
                .map(|s| s.title)
                .unwrap_or_else(|| account.name.clone()),
            auth_token: account.auth_token.clone(),
            connection_method: None,
        };
        store_page_token(
            self.tokens.as_ref(),
            &self.oauth,
            &page.id,
            &page.auth_token,
            "https://oauth2.googleapis.com/token",
        )
        .await?;
        Ok(page)
    }

    async fn publish_post(
        &self,
        page: &SocialPage,
        content: &PostContent,
        options: &PublishOptions,
    ) -> Result<PublishResult, PlatformError> {
        let is_video = content
            .media
            .as_ref()
            .is_some_and(|m| m.kind == MediaKind::Video);
        let video_url = if is_video {
            content.media_urls().first().cloned()
        } else {
            None
        };
        let video_url = video_url.ok_or_else(|| {
            PlatformError::validation("media", "YouTube posts require a video")
        })?;

        let token = self.page_token(page).await?;
        tracing::info!(platform = %self.platform(), channel = %page.vendor_page_id, "Uploading video");

        let scheduled = match content.scheduled_at {
            Some(at) => Some(
                at.format(&time::format_description::well_known::Rfc3339)
                    .map_err(|e| PlatformError::validation("scheduled_at", e.to_string()))?,
            ),
            None => None,
        };

        let metadata = VideoInsertRequest {
            snippet: VideoSnippet {
                title: options
                    .title
                    .clone()
                    .unwrap_or_else(|| content.text.clone()),
                description: options
                    .description
                    .clone()
                    .unwrap_or_else(|| content.text.clone()),
            },
            status: VideoStatusBody {
                // Scheduled videos must sit private until publishAt
                privacy_status: if scheduled.is_some() {
                    "private"
                } else {
                    match options.visibility {
                        Some(Visibility::Private) => "private",
                        Some(Visibility::Unlisted) => "unlisted",
                        _ => "public",
                    }
                },
                made_for_kids: options.made_for_kids,
                publish_at: scheduled.clone(),
            },
        };

        let url = format!("{}/upload/youtube/v3/videos", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .json(&metadata)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }

        let session_uri = response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                PlatformError::upstream(200, "upload session created without a Location header")
            })?;

        let bytes = fetch_media_bytes(&self.client, &video_url).await?;
        let upload = self
            .client
            .put(&session_uri)
            .bearer_auth(&token)
            .header("Content-Type", "video/*")
            .body(bytes)
            .send()
            .await
            .map_err(transport)?;

        if !upload.status().is_success() {
            return Err(vendor_failure(upload).await);
        }

        let video: VideoResource = upload.json().await.map_err(transport)?;
        Ok(PublishResult {
            post_id: video.id,
            status: if scheduled.is_some() {
                PostStatus::Scheduled
            } else {
                PostStatus::Published
            },
        })
    }

    async fn post_history(
        &self,
        page: &SocialPage,
        limit: u32,
        cursor: Option<&Cursor>,
    ) -> Result<HistoryPage, PlatformError> {
        let token = self.page_token(page).await?;
        let playlist = self.uploads_playlist(&token, &page.vendor_page_id).await?;

        let mut query = vec![
            ("part", "snippet".to_string()),
            ("playlistId", playlist),
            ("maxResults", limit.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("pageToken", cursor.as_str().to_string()));
        }

        let url = format!("{}/youtube/v3/playlistItems", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&query)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }

        let body: PlaylistItemsResponse = response.json().await.map_err(transport)?;
        Ok(HistoryPage {
            posts: body
                .items
                .into_iter()
                .map(|item| {
                    let video_id = item.snippet.resource_id.video_id;
                    PublishedPost {
                        permalink: Some(format!("https://www.youtube.com/watch?v={}", video_id)),
                        id: video_id,
                        text: item.snippet.title,
                        created_at: item.snippet.published_at.as_deref().and_then(|raw| {
                            time::OffsetDateTime::parse(
                                raw,
                                &time::format_description::well_known::Rfc3339,
                            )
                            .ok()
                        }),
                        media_url: None,
                    }
                })
                .collect(),
            next_cursor: body.next_page_token.map(Cursor),
        })
    }

    async fn post_analytics(
        &self,
        page: &SocialPage,
        post_id: &str,
        _range: Option<&DateRange>,
    ) -> Result<AnalyticsReport, PlatformError> {
        let token = self.page_token(page).await?;
        let url = format!("{}/youtube/v3/videos", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[("part", "statistics"), ("id", post_id)])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }

        let body: VideoListResponse = response.json().await.map_err(transport)?;
        let mut report = AnalyticsReport::new(post_id);
        if let Some(video) = body.items.into_iter().next() {
            if let Some(views) = parse_count(video.statistics.view_count.as_deref()) {
                report.metrics.insert("views".to_string(), views);
            }
            if let Some(likes) = parse_count(video.statistics.like_count.as_deref()) {
                report.metrics.insert("likes".to_string(), likes);
            }
            if let Some(comments) = parse_count(video.statistics.comment_count.as_deref()) {
                report.metrics.insert("comments".to_string(), comments);
            }
        }
        Ok(report)
    }

    async fn delete_post(&self, page: &SocialPage, post_id: &str) -> Result<(), PlatformError> {
        let token = self.page_token(page).await?;
        let url = format!("{}/youtube/v3/videos", self.base_url);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&token)
            .query(&[("id", post_id)])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }
        Ok(())
    }

    async fn check_page_status(&self, page: &SocialPage) -> Result<PageStatus, PlatformError> {
        let token = self.page_token(page).await?;
        let url = format!("{}/youtube/v3/channels", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[("part", "id"), ("mine", "true")])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            let err = vendor_failure(response).await;
            return Ok(PageStatus::broken(err.to_string()));
        }
        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }
        Ok(PageStatus::healthy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_memory::InMemoryTokenStore;
    use secrecy::SecretString;
    use social_gateway_domain::MediaBundle;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> YouTubeAdapter {
        let tokens = Arc::new(InMemoryTokenStore::with_token("yt_UC123", "yt-token"));
        YouTubeAdapter::with_base_url(
            OAuthApp::new("cid", SecretString::new("sec".into()), "https://app.example/cb"),
            tokens,
            server.uri(),
        )
    }

    fn sample_page() -> SocialPage {
        SocialPage {
            id: "yt_UC123".to_string(),
            platform: Platform::YouTube,
            vendor_page_id: "UC123".to_string(),
            name: "My Channel".to_string(),
            auth_token: "yt-token".to_string(),
            connection_method: None,
        }
    }

    #[tokio::test]
    async fn publish_without_video_fails_before_any_request() {
        let server = MockServer::start().await;

        let err = adapter(&server)
            .publish_post(
                &sample_page(),
                &PostContent::text("text only"),
                &PublishOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::Validation { ref field, .. } if field == "media"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_runs_resumable_upload() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/media/v.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3, 4]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload/youtube/v3/videos"))
            .and(query_param("uploadType", "resumable"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Location", format!("{}/upload/session/1", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/upload/session/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "vid_abc", "kind": "youtube#video"})),
            )
            .mount(&server)
            .await;

        let content = PostContent {
            text: "launch video".to_string(),
            media: Some(MediaBundle {
                kind: MediaKind::Video,
                urls: vec![format!("{}/media/v.mp4", server.uri())],
            }),
            scheduled_at: None,
        };

        let result = adapter(&server)
            .publish_post(&sample_page(), &content, &PublishOptions::default())
            .await
            .unwrap();

        assert_eq!(result.post_id, "vid_abc");
        assert_eq!(result.status, PostStatus::Published);
    }

    #[tokio::test]
    async fn scheduled_upload_is_private_until_publish_at() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/media/v.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![9]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload/youtube/v3/videos"))
            .and(wiremock::matchers::body_string_contains(
                "\"privacyStatus\":\"private\"",
            ))
            .and(wiremock::matchers::body_string_contains("publishAt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Location", format!("{}/upload/session/2", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/upload/session/2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "vid_sched"})),
            )
            .mount(&server)
            .await;

        let content = PostContent {
            text: "later".to_string(),
            media: Some(MediaBundle {
                kind: MediaKind::Video,
                urls: vec![format!("{}/media/v.mp4", server.uri())],
            }),
            scheduled_at: Some(time::macros::datetime!(2026-10-01 12:00 UTC)),
        };

        let result = adapter(&server)
            .publish_post(&sample_page(), &content, &PublishOptions::default())
            .await
            .unwrap();

        assert_eq!(result.status, PostStatus::Scheduled);
    }

    #[tokio::test]
    async fn history_walks_the_uploads_playlist() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/youtube/v3/channels"))
            .and(query_param("part", "contentDetails"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{
                    "id": "UC123",
                    "contentDetails": {"relatedPlaylists": {"uploads": "UU123"}}
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/youtube/v3/playlistItems"))
            .and(query_param("playlistId", "UU123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{
                    "snippet": {
                        "title": "first upload",
                        "publishedAt": "2026-01-15T10:00:00Z",
                        "resourceId": {"videoId": "vid_1"}
                    }
                }],
                "nextPageToken": "PAGE2"
            })))
            .mount(&server)
            .await;

        let history = adapter(&server)
            .post_history(&sample_page(), 10, None)
            .await
            .unwrap();

        assert_eq!(history.posts[0].id, "vid_1");
        assert_eq!(
            history.posts[0].permalink.as_deref(),
            Some("https://www.youtube.com/watch?v=vid_1")
        );
        assert_eq!(history.next_cursor, Some(Cursor("PAGE2".to_string())));
    }

    #[tokio::test]
    async fn analytics_parses_string_counters() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/youtube/v3/videos"))
            .and(query_param("part", "statistics"))
            .and(query_param("id", "vid_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{
                    "statistics": {
                        "viewCount": "1024",
                        "likeCount": "99",
                        "commentCount": "7"
                    }
                }]
            })))
            .mount(&server)
            .await;

        let report = adapter(&server)
            .post_analytics(&sample_page(), "vid_1", None)
            .await
            .unwrap();

        assert_eq!(report.metrics.get("views"), Some(&1024.0));
        assert_eq!(report.metrics.get("likes"), Some(&99.0));
        assert_eq!(report.metrics.get("comments"), Some(&7.0));
    }

    #[tokio::test]
    async fn revoked_grant_reports_broken_channel() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/youtube/v3/channels"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"code": 401, "message": "Invalid Credentials"}
            })))
            .mount(&server)
            .await;

        let status = adapter(&server)
            .check_page_status(&sample_page())
            .await
            .unwrap();

        assert!(!status.ok);
    }
}
