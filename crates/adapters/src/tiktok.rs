//! TikTok adapter (Content Posting API v2)

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use social_gateway_domain::{
    AnalyticsReport, Capability, CreatorInfo, Cursor, DateRange, HistoryPage, MediaKind,
    PageStatus, Platform, PlatformError, PlatformOperations, PostContent, PostStatus,
    PublishOptions, PublishResult, PublishedPost, SocialAccount, SocialPage, TokenStore,
    Visibility,
};

use crate::common::{http_client, store_page_token, transport, vendor_failure, OAuthApp};

const API_BASE: &str = "https://open.tiktokapis.com";
const AUTHORIZE_URL: &str = "https://www.tiktok.com/v2/auth/authorize/";

/// TikTok adapter. Videos only: the vendor pulls the file from a public URL
/// (`PULL_FROM_URL`) and transcodes asynchronously, so a successful publish
/// comes back as [`PostStatus::Processing`] with the vendor's publish id.
///
/// There is no post deletion endpoint; `delete_post` reports the capability
/// as unsupported and it is omitted from [`capabilities`](Self::capabilities).
pub struct TikTokAdapter {
    client: Client,
    oauth: OAuthApp,
    tokens: Arc<dyn TokenStore>,
    base_url: String,
}

impl TikTokAdapter {
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

    fn video_url(content: &PostContent) -> Result<&str, PlatformError> {
        let is_video = content
            .media
            .as_ref()
            .is_some_and(|m| m.kind == MediaKind::Video);
        if !is_video {
            return Err(PlatformError::validation(
                "media",
                "TikTok posts require a video",
            ));
        }
        content
            .media_urls()
            .first()
            .map(String::as_str)
            .ok_or_else(|| PlatformError::validation("media", "TikTok posts require a video URL"))
    }
}

#[derive(Serialize)]
struct VideoInitRequest {
    post_info: PostInfo,
    source_info: SourceInfo,
}

#[derive(Serialize)]
struct PostInfo {
    title: String,
    privacy_level: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    disable_comment: Option<bool>,
}

#[derive(Serialize)]
struct SourceInfo {
    source: &'static str,
    video_url: String,
}

#[derive(Deserialize)]
struct VideoInitResponse {
    data: VideoInitData,
}

#[derive(Deserialize)]
struct VideoInitData {
    publish_id: String,
}

#[derive(Serialize)]
struct VideoListRequest {
    max_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<i64>,
}

#[derive(Deserialize)]
struct VideoListResponse {
    data: VideoListData,
}

#[derive(Deserialize)]
struct VideoListData {
    #[serde(default)]
    videos: Vec<TikTokVideo>,
    #[serde(default)]
    cursor: i64,
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
struct TikTokVideo {
    id: String,
    #[serde(default)]
    video_description: Option<String>,
    #[serde(default)]
    create_time: Option<i64>,
    #[serde(default)]
    share_url: Option<String>,
    #[serde(default)]
    cover_image_url: Option<String>,
    #[serde(default)]
    like_count: Option<f64>,
    #[serde(default)]
    comment_count: Option<f64>,
    #[serde(default)]
    share_count: Option<f64>,
    #[serde(default)]
    view_count: Option<f64>,
}

#[derive(Serialize)]
struct VideoQueryRequest {
    filters: VideoQueryFilters,
}

#[derive(Serialize)]
struct VideoQueryFilters {
    video_ids: Vec<String>,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    data: UserInfoData,
}

#[derive(Deserialize)]
struct UserInfoData {
    user: TikTokUser,
}

#[derive(Deserialize)]
struct TikTokUser {
    open_id: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct CreatorInfoResponse {
    data: CreatorInfoData,
}

#[derive(Deserialize)]
struct CreatorInfoData {
    creator_username: String,
    #[serde(default)]
    creator_nickname: Option<String>,
    #[serde(default)]
    follower_count: Option<u64>,
    #[serde(default)]
    max_video_post_duration_sec: Option<u64>,
    #[serde(default)]
    privacy_level_options: Vec<String>,
}

#[async_trait]
impl PlatformOperations for TikTokAdapter {
    fn platform(&self) -> Platform {
        Platform::TikTok
    }

    fn capabilities(&self) -> &'static [Capability] {
        // No DeletePost: the vendor offers no deletion endpoint
        &[
            Capability::AuthUrl,
            Capability::ConnectPage,
            Capability::PublishPost,
            Capability::PostHistory,
            Capability::PostAnalytics,
            Capability::CreatorInfo,
            Capability::PageStatus,
        ]
    }

    fn auth_url(&self, state: &str) -> String {
        // TikTok names the client credential "client_key"
        format!(
            "{}?client_key={}&response_type=code&scope={}&redirect_uri={}&state={}",
            AUTHORIZE_URL,
            urlencoding::encode(&self.oauth.client_id),
            urlencoding::encode("user.info.basic,video.list,video.publish"),
            urlencoding::encode(&self.oauth.redirect_uri),
            urlencoding::encode(state),
        )
    }

    async fn connect_page(
        &self,
        account: &SocialAccount,
        _selector: &str,
    ) -> Result<SocialPage, PlatformError> {
        let url = format!("{}/v2/user/info/", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&account.auth_token)
            .query(&[("fields", "open_id,display_name")])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }

        let info: UserInfoResponse = response.json().await.map_err(transport)?;
        let user = info.data.user;
        let page = SocialPage {
            id: format!("tt_{}", user.open_id),
            platform: Platform::TikTok,
            vendor_page_id: user.open_id,
            name: user.display_name.unwrap_or_else(|| account.name.clone()),
            // TikTok has no page-scoped tokens; the user token is the page token
            auth_token: account.auth_token.clone(),
            connection_method: None,
        };
        store_page_token(
            self.tokens.as_ref(),
            &self.oauth,
            &page.id,
            &page.auth_token,
            "https://open.tiktokapis.com/v2/oauth/token/",
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
        let video_url = Self::video_url(content)?;
        let token = self.page_token(page).await?;
        tracing::info!(platform = %self.platform(), page = %page.vendor_page_id, "Publishing video");

        let request = VideoInitRequest {
            post_info: PostInfo {
                title: content.text.clone(),
                privacy_level: match options.visibility {
                    Some(Visibility::Private) => "SELF_ONLY",
                    _ => "PUBLIC_TO_EVERYONE",
                },
                disable_comment: options.disable_comments,
            },
            source_info: SourceInfo {
                source: "PULL_FROM_URL",
                video_url: video_url.to_string(),
            },
        };

        let url = format!("{}/v2/post/publish/video/init/", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }

        let body: VideoInitResponse = response.json().await.map_err(transport)?;
        Ok(PublishResult {
            post_id: body.data.publish_id,
            status: PostStatus::Processing,
        })
    }

    async fn post_history(
        &self,
        page: &SocialPage,
        limit: u32,
        cursor: Option<&Cursor>,
    ) -> Result<HistoryPage, PlatformError> {
        let token = self.page_token(page).await?;

        let cursor = match cursor {
            Some(cursor) => Some(cursor.as_str().parse::<i64>().map_err(|_| {
                PlatformError::validation("cursor", "TikTok cursor must be numeric")
            })?),
            None => None,
        };

        let url = format!("{}/v2/video/list/", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .query(&[(
                "fields",
                "id,video_description,create_time,share_url,cover_image_url",
            )])
            .json(&VideoListRequest {
                max_count: limit,
                cursor,
            })
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }

        let body: VideoListResponse = response.json().await.map_err(transport)?;
        let next_cursor = body
            .data
            .has_more
            .then(|| Cursor(body.data.cursor.to_string()));

        Ok(HistoryPage {
            posts: body
                .data
                .videos
                .into_iter()
                .map(|v| PublishedPost {
                    id: v.id,
                    text: v.video_description,
                    created_at: v
                        .create_time
                        .and_then(|secs| time::OffsetDateTime::from_unix_timestamp(secs).ok()),
                    permalink: v.share_url,
                    media_url: v.cover_image_url,
                })
                .collect(),
            next_cursor,
        })
    }

    async fn post_analytics(
        &self,
        page: &SocialPage,
        post_id: &str,
        _range: Option<&DateRange>,
    ) -> Result<AnalyticsReport, PlatformError> {
        let token = self.page_token(page).await?;

        let url = format!("{}/v2/video/query/", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .query(&[("fields", "id,like_count,comment_count,share_count,view_count")])
            .json(&VideoQueryRequest {
                filters: VideoQueryFilters {
                    video_ids: vec![post_id.to_string()],
                },
            })
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }

        let body: VideoListResponse = response.json().await.map_err(transport)?;
        let mut report = AnalyticsReport::new(post_id);
        if let Some(video) = body.data.videos.into_iter().next() {
            if let Some(likes) = video.like_count {
                report.metrics.insert("likes".to_string(), likes);
            }
            if let Some(comments) = video.comment_count {
                report.metrics.insert("comments".to_string(), comments);
            }
            if let Some(shares) = video.share_count {
                report.metrics.insert("shares".to_string(), shares);
            }
            if let Some(views) = video.view_count {
                report.metrics.insert("views".to_string(), views);
            }
        }
        Ok(report)
    }

    async fn delete_post(&self, _page: &SocialPage, _post_id: &str) -> Result<(), PlatformError> {
        Err(PlatformError::UnsupportedCapability(Capability::DeletePost))
    }

    async fn check_page_status(&self, page: &SocialPage) -> Result<PageStatus, PlatformError> {
        let token = self.page_token(page).await?;
        let url = format!("{}/v2/user/info/", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[("fields", "open_id")])
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

    async fn creator_info(&self, page: &SocialPage) -> Result<CreatorInfo, PlatformError> {
        let token = self.page_token(page).await?;
        let url = format!("{}/v2/post/publish/creator_info/query/", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }

        let body: CreatorInfoResponse = response.json().await.map_err(transport)?;
        Ok(CreatorInfo {
            username: body.data.creator_username,
            nickname: body.data.creator_nickname,
            follower_count: body.data.follower_count,
            max_video_duration_secs: body.data.max_video_post_duration_sec,
            privacy_options: body.data.privacy_level_options,
        })
    }
}
