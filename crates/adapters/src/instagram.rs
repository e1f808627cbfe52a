//! Instagram adapter (container-based publish flow)
//!
//! Instagram has two integration paths: business accounts via the Facebook
//! Graph API and creator accounts via the direct Instagram API. Both share
//! the same container publish flow; only the base/authorize URLs differ.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use social_gateway_domain::{
    AnalyticsReport, Capability, ConnectionMethod, Cursor, DateRange, HistoryPage, MediaKind,
    PageStatus, Platform, PlatformError, PlatformOperations, PostContent, PostStatus,
    PublishOptions, PublishResult, PublishedPost, SocialAccount, SocialPage, StoryPage, StoryPost,
    TokenStore,
};

use crate::common::{graph_failure, http_client, store_page_token, transport, OAuthApp};

const FACEBOOK_GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";
const DIRECT_GRAPH_BASE: &str = "https://graph.instagram.com";
const FACEBOOK_DIALOG: &str = "https://www.facebook.com/v19.0/dialog/oauth";
const DIRECT_DIALOG: &str = "https://api.instagram.com/oauth/authorize";
const FACEBOOK_TOKEN_URL: &str = "https://graph.facebook.com/v19.0/oauth/access_token";
const DIRECT_TOKEN_URL: &str = "https://api.instagram.com/oauth/access_token";

/// Which Instagram integration path this adapter instance speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstagramApi {
    FacebookGraph,
    Direct,
}

impl InstagramApi {
    fn connection_method(self) -> ConnectionMethod {
        match self {
            InstagramApi::FacebookGraph => ConnectionMethod::FacebookGraph,
            InstagramApi::Direct => ConnectionMethod::Direct,
        }
    }
}

pub struct InstagramAdapter {
    client: Client,
    oauth: OAuthApp,
    tokens: Arc<dyn TokenStore>,
    api: InstagramApi,
    base_url: String,
    dialog_url: String,
}

impl InstagramAdapter {
    pub fn new(oauth: OAuthApp, tokens: Arc<dyn TokenStore>, api: InstagramApi) -> Self {
        let (base, dialog) = match api {
            InstagramApi::FacebookGraph => (FACEBOOK_GRAPH_BASE, FACEBOOK_DIALOG),
            InstagramApi::Direct => (DIRECT_GRAPH_BASE, DIRECT_DIALOG),
        };
        Self::with_base_url(oauth, tokens, api, base.to_string(), dialog.to_string())
    }

    pub fn with_base_url(
        oauth: OAuthApp,
        tokens: Arc<dyn TokenStore>,
        api: InstagramApi,
        base_url: String,
        dialog_url: String,
    ) -> Self {
        Self {
            client: http_client(),
            oauth,
            tokens,
            api,
            base_url,
            dialog_url,
        }
    }

    async fn page_token(&self, page: &SocialPage) -> Result<String, PlatformError> {
        let token = self.tokens.get_secure_token(&page.id).await?;
        Ok(token.expose_secret().to_string())
    }

    /// Create one media container, returning its creation id
    async fn create_container(
        &self,
        page: &SocialPage,
        token: &str,
        body: &ContainerRequest,
    ) -> Result<String, PlatformError> {
        let url = format!("{}/{}/media", self.base_url, page.vendor_page_id);
        let response = self
            .client
            .post(&url)
            .query(&[("access_token", token)])
            .json(body)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(graph_failure(response).await);
        }
        let id: IdResponse = response.json().await.map_err(transport)?;
        Ok(id.id)
    }

    /// Build the container for the given content; carousels create child
    /// containers first, preserving media URL order
    async fn build_publish_container(
        &self,
        page: &SocialPage,
        token: &str,
        content: &PostContent,
    ) -> Result<String, PlatformError> {
        let media = content
            .media
            .as_ref()
            .ok_or_else(|| PlatformError::validation("media", "Instagram requires media"))?;
        if media.urls.is_empty() {
            return Err(PlatformError::validation(
                "media",
                "Instagram requires at least one media URL",
            ));
        }

        match media.kind {
            MediaKind::Image => {
                self.create_container(
                    page,
                    token,
                    &ContainerRequest {
                        image_url: Some(media.urls[0].clone()),
                        caption: Some(content.text.clone()),
                        ..Default::default()
                    },
                )
                .await
            }
            MediaKind::Video => {
                self.create_container(
                    page,
                    token,
                    &ContainerRequest {
                        video_url: Some(media.urls[0].clone()),
                        media_type: Some("REELS".to_string()),
                        caption: Some(content.text.clone()),
                        ..Default::default()
                    },
                )
                .await
            }
            MediaKind::Carousel => {
                let mut children = Vec::with_capacity(media.urls.len());
                for url in &media.urls {
                    let child = self
                        .create_container(
                            page,
                            token,
                            &ContainerRequest {
                                image_url: Some(url.clone()),
                                is_carousel_item: Some(true),
                                ..Default::default()
                            },
                        )
                        .await?;
                    children.push(child);
                }
                self.create_container(
                    page,
                    token,
                    &ContainerRequest {
                        media_type: Some("CAROUSEL".to_string()),
                        children: Some(children.join(",")),
                        caption: Some(content.text.clone()),
                        ..Default::default()
                    },
                )
                .await
            }
        }
    }
}

#[derive(Serialize, Default)]
struct ContainerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_carousel_item: Option<bool>,
    /// Comma-joined child container ids, in carousel order
    #[serde(skip_serializing_if = "Option::is_none")]
    children: Option<String>,
}

#[derive(Serialize)]
struct PublishRequest {
    creation_id: String,
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
struct MediaListResponse {
    #[serde(default)]
    data: Vec<IgMedia>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Deserialize)]
struct IgMedia {
    id: String,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    media_url: Option<String>,
}

#[derive(Deserialize)]
struct Paging {
    #[serde(default)]
    cursors: Option<PagingCursors>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
struct PagingCursors {
    #[serde(default)]
    after: Option<String>,
}

#[derive(Deserialize)]
struct InsightsResponse {
    #[serde(default)]
    data: Vec<InsightMetric>,
}

#[derive(Deserialize)]
struct InsightMetric {
    name: String,
    #[serde(default)]
    values: Vec<InsightValue>,
}

#[derive(Deserialize)]
struct InsightValue {
    #[serde(default)]
    value: Option<f64>,
}

fn parse_ig_time(raw: &Option<String>) -> Option<time::OffsetDateTime> {
    raw.as_deref().and_then(|s| {
        time::OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339).ok()
    })
}

fn next_cursor(paging: &Option<Paging>) -> Option<Cursor> {
    let paging = paging.as_ref()?;
    paging.next.as_ref()?;
    paging.cursors.as_ref()?.after.clone().map(Cursor)
}

#[async_trait]
impl PlatformOperations for InstagramAdapter {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[
            Capability::AuthUrl,
            Capability::ConnectPage,
            Capability::PublishPost,
            Capability::PostHistory,
            Capability::PostAnalytics,
            Capability::PageAnalytics,
            Capability::StoryHistory,
            Capability::DeletePost,
            Capability::PageStatus,
        ]
    }

    fn auth_url(&self, state: &str) -> String {
        let scope = match self.api {
            InstagramApi::FacebookGraph => "instagram_basic,instagram_content_publish,pages_show_list",
            InstagramApi::Direct => "instagram_business_basic,instagram_business_content_publish",
        };
        format!(
            "{}?client_id={}&redirect_uri={}&state={}&response_type=code&scope={}",
            self.dialog_url,
            urlencoding::encode(&self.oauth.client_id),
            urlencoding::encode(&self.oauth.redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(scope),
        )
    }

    async fn connect_page(
        &self,
        account: &SocialAccount,
        selector: &str,
    ) -> Result<SocialPage, PlatformError> {
        let url = format!("{}/{}", self.base_url, selector);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("fields", "id,username"),
                ("access_token", &account.auth_token),
            ])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(graph_failure(response).await);
        }

        #[derive(Deserialize)]
        struct IgUser {
            id: String,
            username: String,
        }
        let user: IgUser = response.json().await.map_err(transport)?;

        let page = SocialPage {
            id: format!("ig_{}", user.id),
            platform: Platform::Instagram,
            vendor_page_id: user.id,
            name: user.username,
            // Instagram scopes the publishing token to the user, not the
            // account list; the connect token carries over
            auth_token: account.auth_token.clone(),
            connection_method: Some(self.api.connection_method()),
        };
        let token_url = match self.api {
            InstagramApi::FacebookGraph => FACEBOOK_TOKEN_URL,
            InstagramApi::Direct => DIRECT_TOKEN_URL,
        };
        store_page_token(
            self.tokens.as_ref(),
            &self.oauth,
            &page.id,
            &page.auth_token,
            token_url,
        )
        .await?;
        Ok(page)
    }

    async fn publish_post(
        &self,
        page: &SocialPage,
        content: &PostContent,
        _options: &PublishOptions,
    ) -> Result<PublishResult, PlatformError> {
        // Validated before any outbound call
        if content.media_urls().is_empty() {
            return Err(PlatformError::validation(
                "media",
                "Instagram requires at least one media URL",
            ));
        }

        let token = self.page_token(page).await?;
        tracing::info!(platform = %self.platform(), page = %page.vendor_page_id, "Publishing post");

        let creation_id = self.build_publish_container(page, &token, content).await?;

        let url = format!("{}/{}/media_publish", self.base_url, page.vendor_page_id);
        let response = self
            .client
            .post(&url)
            .query(&[("access_token", token.as_str())])
            .json(&PublishRequest { creation_id })
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(graph_failure(response).await);
        }
        let id: IdResponse = response.json().await.map_err(transport)?;

        Ok(PublishResult {
            post_id: id.id,
            status: PostStatus::Published,
        })
    }

    async fn post_history(
        &self,
        page: &SocialPage,
        limit: u32,
        cursor: Option<&Cursor>,
    ) -> Result<HistoryPage, PlatformError> {
        let token = self.page_token(page).await?;
        let url = format!("{}/{}/media", self.base_url, page.vendor_page_id);

        let limit = limit.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("fields", "id,caption,timestamp,permalink,media_url"),
            ("limit", &limit),
            ("access_token", &token),
        ];
        if let Some(cursor) = cursor {
            query.push(("after", cursor.as_str()));
        }

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(graph_failure(response).await);
        }

        let media: MediaListResponse = response.json().await.map_err(transport)?;
        let cursor = next_cursor(&media.paging);

        Ok(HistoryPage {
            posts: media
                .data
                .into_iter()
                .map(|m| PublishedPost {
                    created_at: parse_ig_time(&m.timestamp),
                    id: m.id,
                    text: m.caption,
                    permalink: m.permalink,
                    media_url: m.media_url,
                })
                .collect(),
            next_cursor: cursor,
        })
    }

    async fn post_analytics(
        &self,
        page: &SocialPage,
        post_id: &str,
        _range: Option<&DateRange>,
    ) -> Result<AnalyticsReport, PlatformError> {
        let token = self.page_token(page).await?;
        let url = format!("{}/{}/insights", self.base_url, post_id);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("metric", "impressions,reach,likes,comments,saved"),
                ("access_token", &token),
            ])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(graph_failure(response).await);
        }

        let insights: InsightsResponse = response.json().await.map_err(transport)?;
        let mut report = AnalyticsReport::new(post_id);
        for metric in insights.data {
            let value = metric
                .values
                .first()
                .and_then(|v| v.value)
                .unwrap_or_default();
            report.metrics.insert(metric.name, value);
        }
        Ok(report)
    }

    async fn page_analytics(
        &self,
        page: &SocialPage,
        range: Option<&DateRange>,
    ) -> Result<AnalyticsReport, PlatformError> {
        let token = self.page_token(page).await?;
        let url = format!("{}/{}/insights", self.base_url, page.vendor_page_id);

        let mut query: Vec<(String, String)> = vec![
            ("metric".to_string(), "impressions,reach,follower_count".to_string()),
            ("period".to_string(), "day".to_string()),
            ("access_token".to_string(), token),
        ];
        if let Some(range) = range {
            query.push(("since".to_string(), range.since.unix_timestamp().to_string()));
            query.push(("until".to_string(), range.until.unix_timestamp().to_string()));
        }

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(graph_failure(response).await);
        }

        let insights: InsightsResponse = response.json().await.map_err(transport)?;
        let mut report = AnalyticsReport::new(&page.vendor_page_id);
        for metric in insights.data {
            let value = metric
                .values
                .first()
                .and_then(|v| v.value)
                .unwrap_or_default();
            report.metrics.insert(metric.name, value);
        }
        Ok(report)
    }

    async fn story_history(
        &self,
        page: &SocialPage,
        limit: u32,
        cursor: Option<&Cursor>,
    ) -> Result<StoryPage, PlatformError> {
        let token = self.page_token(page).await?;
        let url = format!("{}/{}/stories", self.base_url, page.vendor_page_id);

        let limit = limit.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("fields", "id,media_url,timestamp"),
            ("limit", &limit),
            ("access_token", &token),
        ];
        if let Some(cursor) = cursor {
            query.push(("after", cursor.as_str()));
        }

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(graph_failure(response).await);
        }

        let media: MediaListResponse = response.json().await.map_err(transport)?;
        let cursor = next_cursor(&media.paging);

        Ok(StoryPage {
            stories: media
                .data
                .into_iter()
                .map(|m| StoryPost {
                    created_at: parse_ig_time(&m.timestamp),
                    id: m.id,
                    media_url: m.media_url,
                })
                .collect(),
            next_cursor: cursor,
        })
    }

    async fn delete_post(&self, page: &SocialPage, post_id: &str) -> Result<(), PlatformError> {
        let token = self.page_token(page).await?;
        let url = format!("{}/{}", self.base_url, post_id);
        let response = self
            .client
            .delete(&url)
            .query(&[("access_token", &token)])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(graph_failure(response).await);
        }
        Ok(())
    }

    async fn check_page_status(&self, page: &SocialPage) -> Result<PageStatus, PlatformError> {
        let token = self.page_token(page).await?;
        let url = format!("{}/{}", self.base_url, page.vendor_page_id);
        let response = self
            .client
            .get(&url)
            .query(&[("fields", "id,username"), ("access_token", &token)])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            let err = graph_failure(response).await;
            return Ok(PageStatus::broken(err.to_string()));
        }
        if !response.status().is_success() {
            return Err(graph_failure(response).await);
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
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> InstagramAdapter {
        let tokens = Arc::new(InMemoryTokenStore::with_token("ig_777", "ig-token"));
        InstagramAdapter::with_base_url(
            OAuthApp::new("cid", SecretString::new("sec".into()), "https://app.example/cb"),
            tokens,
            InstagramApi::FacebookGraph,
            server.uri(),
            server.uri(),
        )
    }

    fn sample_page() -> SocialPage {
        SocialPage {
            id: "ig_777".to_string(),
            platform: Platform::Instagram,
            vendor_page_id: "777".to_string(),
            name: "creator".to_string(),
            auth_token: "ig-token".to_string(),
            connection_method: Some(ConnectionMethod::FacebookGraph),
        }
    }

    #[tokio::test]
    async fn publish_without_media_fails_before_any_request() {
        // No mocks mounted: any outbound call would 404 and fail differently
        let server = MockServer::start().await;

        let err = adapter(&server)
            .publish_post(&sample_page(), &PostContent::text("no media"), &PublishOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::Validation { ref field, .. } if field == "media"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_single_image_uses_container_flow() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/777/media"))
            .and(body_json(serde_json::json!({
                "image_url": "https://x/a.jpg",
                "caption": "hi"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "cont_1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/777/media_publish"))
            .and(body_json(serde_json::json!({"creation_id": "cont_1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "ig_post_1"})))
            .mount(&server)
            .await;

        let content = PostContent {
            text: "hi".to_string(),
            media: Some(MediaBundle {
                kind: MediaKind::Image,
                urls: vec!["https://x/a.jpg".to_string()],
            }),
            scheduled_at: None,
        };

        let result = adapter(&server)
            .publish_post(&sample_page(), &content, &PublishOptions::default())
            .await
            .unwrap();

        assert_eq!(result.post_id, "ig_post_1");
    }

    #[tokio::test]
    async fn carousel_children_keep_url_order() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/777/media"))
            .and(body_json(serde_json::json!({
                "image_url": "https://x/a.jpg", "is_carousel_item": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "child_a"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/777/media"))
            .and(body_json(serde_json::json!({
                "image_url": "https://x/b.jpg", "is_carousel_item": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "child_b"})))
            .mount(&server)
            .await;
        // Parent container must list children in media order
        Mock::given(method("POST"))
            .and(path("/777/media"))
            .and(body_json(serde_json::json!({
                "media_type": "CAROUSEL",
                "children": "child_a,child_b",
                "caption": "pair"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "cont_c"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/777/media_publish"))
            .and(body_json(serde_json::json!({"creation_id": "cont_c"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "ig_post_2"})))
            .mount(&server)
            .await;

        let content = PostContent {
            text: "pair".to_string(),
            media: Some(MediaBundle {
                kind: MediaKind::Carousel,
                urls: vec!["https://x/a.jpg".to_string(), "https://x/b.jpg".to_string()],
            }),
            scheduled_at: None,
        };

        let result = adapter(&server)
            .publish_post(&sample_page(), &content, &PublishOptions::default())
            .await
            .unwrap();

        assert_eq!(result.post_id, "ig_post_2");
    }

    #[tokio::test]
    async fn story_history_maps_stories() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/777/stories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"id": "st_1", "media_url": "https://cdn/st1.jpg", "timestamp": "2024-03-01T10:00:00+00:00"}
                ],
                "paging": {"cursors": {"after": "A2"}, "next": "https://next"}
            })))
            .mount(&server)
            .await;

        let stories = adapter(&server)
            .story_history(&sample_page(), 10, None)
            .await
            .unwrap();

        assert_eq!(stories.stories.len(), 1);
        assert_eq!(stories.stories[0].id, "st_1");
        assert_eq!(stories.next_cursor, Some(Cursor("A2".to_string())));
    }

    #[test]
    fn direct_and_graph_auth_urls_differ() {
        let tokens: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
        let oauth = OAuthApp::new("cid", SecretString::new("sec".into()), "https://app.example/cb");

        let graph = InstagramAdapter::new(oauth.clone(), Arc::clone(&tokens), InstagramApi::FacebookGraph);
        let direct = InstagramAdapter::new(oauth, tokens, InstagramApi::Direct);

        assert!(graph.auth_url("s").starts_with("https://www.facebook.com/"));
        assert!(direct.auth_url("s").starts_with("https://api.instagram.com/"));
    }

    #[tokio::test]
    async fn creator_info_is_unsupported() {
        let server = MockServer::start().await;
        let err = adapter(&server)
            .creator_info(&sample_page())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlatformError::UnsupportedCapability(Capability::CreatorInfo)
        ));
    }
}
