//! LinkedIn adapter (versioned REST API)

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use social_gateway_domain::{
    AnalyticsReport, Capability, Cursor, DateRange, HistoryPage, PageStatus, Platform,
    PlatformError, PlatformOperations, PostContent, PostStatus, PublishOptions, PublishResult,
    PublishedPost, SocialAccount, SocialPage, TokenStore,
};

use crate::common::{
    fetch_media_bytes, http_client, store_page_token, transport, vendor_failure, OAuthApp,
};

const API_BASE: &str = "https://api.linkedin.com";
const AUTHORIZE_URL: &str = "https://www.linkedin.com/oauth/v2/authorization";
const API_VERSION: &str = "202401";

/// LinkedIn adapter. A "page" is an organization; posts are authored under
/// its URN. Images go through the initialize-upload flow: LinkedIn hands out
/// an upload URL, the media bytes are PUT there, and the resulting image URN
/// is referenced from the post.
pub struct LinkedInAdapter {
    client: Client,
    oauth: OAuthApp,
    tokens: Arc<dyn TokenStore>,
    base_url: String,
}

impl LinkedInAdapter {
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

    fn author_urn(page: &SocialPage) -> String {
        if page.vendor_page_id.starts_with("urn:") {
            page.vendor_page_id.clone()
        } else {
            format!("urn:li:organization:{}", page.vendor_page_id)
        }
    }

    /// Initialize an image upload, PUT the bytes, return the image URN
    async fn upload_image(
        &self,
        token: &str,
        owner: &str,
        media_url: &str,
    ) -> Result<String, PlatformError> {
        let url = format!("{}/rest/images?action=initializeUpload", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("LinkedIn-Version", API_VERSION)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&InitializeUploadRequest {
                initialize_upload_request: UploadOwner {
                    owner: owner.to_string(),
                },
            })
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }
        let init: InitializeUploadResponse = response.json().await.map_err(transport)?;

        let bytes = fetch_media_bytes(&self.client, media_url).await?;
        let upload = self
            .client
            .put(&init.value.upload_url)
            .bearer_auth(token)
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(transport)?;

        if !upload.status().is_success() {
            return Err(vendor_failure(upload).await);
        }
        Ok(init.value.image)
    }
}

#[derive(Serialize)]
struct InitializeUploadRequest {
    #[serde(rename = "initializeUploadRequest")]
    initialize_upload_request: UploadOwner,
}

#[derive(Serialize)]
struct UploadOwner {
    owner: String,
}

#[derive(Deserialize)]
struct InitializeUploadResponse {
    value: UploadValue,
}

#[derive(Deserialize)]
struct UploadValue {
    #[serde(rename = "uploadUrl")]
    upload_url: String,
    image: String,
}

#[derive(Serialize)]
struct CreatePostRequest {
    author: String,
    commentary: String,
    visibility: &'static str,
    distribution: Distribution,
    #[serde(rename = "lifecycleState")]
    lifecycle_state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<PostMedia>,
}

#[derive(Serialize)]
struct Distribution {
    #[serde(rename = "feedDistribution")]
    feed_distribution: &'static str,
}

#[derive(Serialize)]
struct PostMedia {
    media: MediaRef,
}

#[derive(Serialize)]
struct MediaRef {
    id: String,
}

#[derive(Deserialize)]
struct CreatePostBody {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize)]
struct PostsPage {
    #[serde(default)]
    elements: Vec<LiPost>,
    #[serde(default)]
    paging: Option<LiPaging>,
}

#[derive(Deserialize)]
struct LiPost {
    id: String,
    #[serde(default)]
    commentary: Option<String>,
    #[serde(default, rename = "createdAt")]
    created_at: Option<i64>,
}

#[derive(Deserialize)]
struct LiPaging {
    start: u32,
    count: u32,
    total: u32,
}

#[derive(Deserialize)]
struct SocialActions {
    #[serde(default, rename = "likesSummary")]
    likes: Option<LikesSummary>,
    #[serde(default, rename = "commentsSummary")]
    comments: Option<CommentsSummary>,
}

#[derive(Deserialize)]
struct LikesSummary {
    #[serde(default, rename = "totalLikes")]
    total_likes: f64,
}

#[derive(Deserialize)]
struct CommentsSummary {
    #[serde(default, rename = "aggregatedTotalComments")]
    total_comments: f64,
}

#[derive(Deserialize)]
struct Organization {
    #[serde(rename = "localizedName")]
    localized_name: String,
}

#[async_trait]
impl PlatformOperations for LinkedInAdapter {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
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
            "{}?response_type=code&client_id={}&redirect_uri={}&state={}&scope={}",
            AUTHORIZE_URL,
            urlencoding::encode(&self.oauth.client_id),
            urlencoding::encode(&self.oauth.redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode("w_organization_social,r_organization_social,rw_organization_admin"),
        )
    }

    async fn connect_page(
        &self,
        account: &SocialAccount,
        selector: &str,
    ) -> Result<SocialPage, PlatformError> {
        let url = format!("{}/rest/organizations/{}", self.base_url, selector);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&account.auth_token)
            .header("LinkedIn-Version", API_VERSION)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }

        let org: Organization = response.json().await.map_err(transport)?;
        let page = SocialPage {
            id: format!("li_{}", selector),
            platform: Platform::LinkedIn,
            vendor_page_id: selector.to_string(),
            name: org.localized_name,
            // LinkedIn authorizes organization posting on the member token
            auth_token: account.auth_token.clone(),
            connection_method: None,
        };
        store_page_token(
            self.tokens.as_ref(),
            &self.oauth,
            &page.id,
            &page.auth_token,
            "https://www.linkedin.com/oauth/v2/accessToken",
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
        let token = self.page_token(page).await?;
        let author = Self::author_urn(page);
        tracing::info!(platform = %self.platform(), page = %author, "Publishing post");

        let media = match content.media_urls().first() {
            Some(media_url) => {
                let urn = self.upload_image(&token, &author, media_url).await?;
                Some(PostMedia {
                    media: MediaRef { id: urn },
                })
            }
            None => None,
        };

        let request = CreatePostRequest {
            author,
            commentary: content.text.clone(),
            visibility: match options.visibility {
                Some(social_gateway_domain::Visibility::Private) => "CONNECTIONS",
                _ => "PUBLIC",
            },
            distribution: Distribution {
                feed_distribution: "MAIN_FEED",
            },
            lifecycle_state: "PUBLISHED",
            content: media,
        };

        let url = format!("{}/rest/posts", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .header("LinkedIn-Version", API_VERSION)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }

        // The post URN arrives in the x-restli-id header; fall back to the
        // body for vendors/mocks that put it there
        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let post_id = match header_id {
            Some(id) => id,
            None => {
                let body: CreatePostBody = response.json().await.map_err(transport)?;
                body.id.ok_or_else(|| {
                    PlatformError::upstream(201, "post created but no id returned".to_string())
                })?
            }
        };

        Ok(PublishResult {
            post_id,
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
        let author = Self::author_urn(page);

        // LinkedIn pages with a numeric offset rather than a token
        let start: u32 = match cursor {
            Some(cursor) => cursor.as_str().parse().map_err(|_| {
                PlatformError::validation("cursor", "LinkedIn cursor must be a numeric offset")
            })?,
            None => 0,
        };

        let url = format!("{}/rest/posts", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .header("LinkedIn-Version", API_VERSION)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .query(&[
                ("q", "author"),
                ("author", &author),
                ("count", &limit.to_string()),
                ("start", &start.to_string()),
            ])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }

        let posts: PostsPage = response.json().await.map_err(transport)?;
        let next_cursor = posts.paging.as_ref().and_then(|p| {
            let next = p.start + p.count;
            (next < p.total).then(|| Cursor(next.to_string()))
        });

        Ok(HistoryPage {
            posts: posts
                .elements
                .into_iter()
                .map(|p| PublishedPost {
                    created_at: p
                        .created_at
                        .and_then(|ms| time::OffsetDateTime::from_unix_timestamp(ms / 1000).ok()),
                    id: p.id,
                    text: p.commentary,
                    permalink: None,
                    media_url: None,
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
        let url = format!(
            "{}/rest/socialActions/{}",
            self.base_url,
            urlencoding::encode(post_id)
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .header("LinkedIn-Version", API_VERSION)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }

        let actions: SocialActions = response.json().await.map_err(transport)?;
        let mut report = AnalyticsReport::new(post_id);
        if let Some(likes) = actions.likes {
            report.metrics.insert("likes".to_string(), likes.total_likes);
        }
        if let Some(comments) = actions.comments {
            report
                .metrics
                .insert("comments".to_string(), comments.total_comments);
        }
        Ok(report)
    }

    async fn delete_post(&self, page: &SocialPage, post_id: &str) -> Result<(), PlatformError> {
        let token = self.page_token(page).await?;
        let url = format!(
            "{}/rest/posts/{}",
            self.base_url,
            urlencoding::encode(post_id)
        );
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&token)
            .header("LinkedIn-Version", API_VERSION)
            .header("X-Restli-Protocol-Version", "2.0.0")
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
        let url = format!(
            "{}/rest/organizations/{}",
            self.base_url, page.vendor_page_id
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .header("LinkedIn-Version", API_VERSION)
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
    use social_gateway_domain::{MediaBundle, MediaKind};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> LinkedInAdapter {
        let tokens = Arc::new(InMemoryTokenStore::with_token("li_2048", "li-token"));
        LinkedInAdapter::with_base_url(
            OAuthApp::new("cid", SecretString::new("sec".into()), "https://app.example/cb"),
            tokens,
            server.uri(),
        )
    }

    fn sample_page() -> SocialPage {
        SocialPage {
            id: "li_2048".to_string(),
            platform: Platform::LinkedIn,
            vendor_page_id: "2048".to_string(),
            name: "Acme Corp".to_string(),
            auth_token: "li-token".to_string(),
            connection_method: None,
        }
    }

    #[tokio::test]
    async fn publish_text_post_reads_restli_id_header() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/posts"))
            .and(header("Authorization", "Bearer li-token"))
            .and(body_json(serde_json::json!({
                "author": "urn:li:organization:2048",
                "commentary": "hello network",
                "visibility": "PUBLIC",
                "distribution": {"feedDistribution": "MAIN_FEED"},
                "lifecycleState": "PUBLISHED"
            })))
            .respond_with(
                ResponseTemplate::new(201).insert_header("x-restli-id", "urn:li:share:555"),
            )
            .mount(&server)
            .await;

        let result = adapter(&server)
            .publish_post(
                &sample_page(),
                &PostContent::text("hello network"),
                &PublishOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.post_id, "urn:li:share:555");
    }

    #[tokio::test]
    async fn publish_image_goes_through_upload_flow() {
        let server = MockServer::start().await;

        // Media file served from the same mock server
        Mock::given(method("GET"))
            .and(path("/media/a.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/images"))
            .and(query_param("action", "initializeUpload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": {
                    "uploadUrl": format!("{}/upload/slot1", server.uri()),
                    "image": "urn:li:image:abc"
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/upload/slot1"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/posts"))
            .and(body_json(serde_json::json!({
                "author": "urn:li:organization:2048",
                "commentary": "with image",
                "visibility": "PUBLIC",
                "distribution": {"feedDistribution": "MAIN_FEED"},
                "lifecycleState": "PUBLISHED",
                "content": {"media": {"id": "urn:li:image:abc"}}
            })))
            .respond_with(
                ResponseTemplate::new(201).insert_header("x-restli-id", "urn:li:share:556"),
            )
            .mount(&server)
            .await;

        let content = PostContent {
            text: "with image".to_string(),
            media: Some(MediaBundle {
                kind: MediaKind::Image,
                urls: vec![format!("{}/media/a.jpg", server.uri())],
            }),
            scheduled_at: None,
        };

        let result = adapter(&server)
            .publish_post(&sample_page(), &content, &PublishOptions::default())
            .await
            .unwrap();

        assert_eq!(result.post_id, "urn:li:share:556");
    }

    #[tokio::test]
    async fn history_uses_numeric_offset_cursor() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/posts"))
            .and(query_param("start", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "elements": [
                    {"id": "urn:li:share:1", "commentary": "one"},
                    {"id": "urn:li:share:2", "commentary": "two"}
                ],
                "paging": {"start": 0, "count": 2, "total": 3}
            })))
            .mount(&server)
            .await;

        let history = adapter(&server)
            .post_history(&sample_page(), 2, None)
            .await
            .unwrap();

        assert_eq!(history.posts.len(), 2);
        assert_eq!(history.next_cursor, Some(Cursor("2".to_string())));
    }

    #[tokio::test]
    async fn malformed_cursor_is_a_validation_error() {
        let server = MockServer::start().await;

        let err = adapter(&server)
            .post_history(&sample_page(), 10, Some(&Cursor("not-a-number".to_string())))
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::Validation { ref field, .. } if field == "cursor"));
    }

    #[tokio::test]
    async fn analytics_maps_social_actions() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/socialActions/urn%3Ali%3Ashare%3A555"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "likesSummary": {"totalLikes": 17},
                "commentsSummary": {"aggregatedTotalComments": 3}
            })))
            .mount(&server)
            .await;

        let report = adapter(&server)
            .post_analytics(&sample_page(), "urn:li:share:555", None)
            .await
            .unwrap();

        assert_eq!(report.metrics.get("likes"), Some(&17.0));
        assert_eq!(report.metrics.get("comments"), Some(&3.0));
    }
}
