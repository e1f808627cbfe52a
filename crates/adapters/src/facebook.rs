//! Facebook Pages adapter (Graph API)

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use social_gateway_domain::{
    AnalyticsReport, Capability, Cursor, DateRange, HistoryPage, MediaKind, PageStatus, Platform,
    PlatformError, PlatformOperations, PostContent, PostStatus, PublishOptions, PublishResult,
    PublishedPost, SocialAccount, SocialPage, TokenStore,
};

use crate::common::{graph_failure, http_client, store_page_token, transport, OAuthApp};

const GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";
const DIALOG_BASE: &str = "https://www.facebook.com/v19.0";
const TOKEN_URL: &str = "https://graph.facebook.com/v19.0/oauth/access_token";

/// Facebook Pages adapter.
///
/// Publishing follows the Graph flows: `/feed` for text, `/photos` and
/// `/videos` for single media, and unpublished photo containers attached to a
/// feed post for carousels.
pub struct FacebookAdapter {
    client: Client,
    oauth: OAuthApp,
    tokens: Arc<dyn TokenStore>,
    base_url: String,
    dialog_url: String,
}

impl FacebookAdapter {
    pub fn new(oauth: OAuthApp, tokens: Arc<dyn TokenStore>) -> Self {
        Self::with_base_url(oauth, tokens, GRAPH_BASE.to_string(), DIALOG_BASE.to_string())
    }

    pub fn with_base_url(
        oauth: OAuthApp,
        tokens: Arc<dyn TokenStore>,
        base_url: String,
        dialog_url: String,
    ) -> Self {
        Self {
            client: http_client(),
            oauth,
            tokens,
            base_url,
            dialog_url,
        }
    }

    async fn page_token(&self, page: &SocialPage) -> Result<String, PlatformError> {
        let token = self.tokens.get_secure_token(&page.id).await?;
        Ok(token.expose_secret().to_string())
    }

    async fn post_json(
        &self,
        url: &str,
        token: &str,
        body: &impl Serialize,
    ) -> Result<serde_json::Value, PlatformError> {
        let response = self
            .client
            .post(url)
            .query(&[("access_token", token)])
            .json(body)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(graph_failure(response).await);
        }
        response.json().await.map_err(transport)
    }

    /// Upload one unpublished photo container, returning its media fbid
    async fn upload_unpublished_photo(
        &self,
        page: &SocialPage,
        token: &str,
        url: &str,
    ) -> Result<String, PlatformError> {
        let endpoint = format!("{}/{}/photos", self.base_url, page.vendor_page_id);
        let body = PhotoRequest {
            url: url.to_string(),
            caption: None,
            published: Some(false),
        };
        let value = self.post_json(&endpoint, token, &body).await?;
        let id: IdResponse = serde_json::from_value(value)
            .map_err(|e| PlatformError::upstream(200, e.to_string()))?;
        Ok(id.id)
    }
}

#[derive(Serialize)]
struct FeedRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    published: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scheduled_publish_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attached_media: Option<Vec<AttachedMedia>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<String>,
}

#[derive(Serialize)]
struct AttachedMedia {
    media_fbid: String,
}

#[derive(Serialize)]
struct PhotoRequest {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    published: Option<bool>,
}

#[derive(Serialize)]
struct VideoRequest {
    file_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
struct PostsResponse {
    #[serde(default)]
    data: Vec<GraphPost>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Deserialize)]
struct GraphPost {
    id: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    created_time: Option<String>,
    #[serde(default)]
    permalink_url: Option<String>,
    #[serde(default)]
    full_picture: Option<String>,
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

#[derive(Deserialize)]
struct ConnectedPage {
    id: String,
    name: String,
    access_token: String,
}

fn parse_graph_time(raw: &Option<String>) -> Option<time::OffsetDateTime> {
    raw.as_deref().and_then(|s| {
        time::OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339).ok()
    })
}

fn insights_report(subject: &str, insights: InsightsResponse) -> AnalyticsReport {
    let mut report = AnalyticsReport::new(subject);
    for metric in insights.data {
        let value = metric
            .values
            .first()
            .and_then(|v| v.value)
            .unwrap_or_default();
        report.metrics.insert(metric.name, value);
    }
    report
}

#[async_trait]
impl PlatformOperations for FacebookAdapter {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[
            Capability::AuthUrl,
            Capability::ConnectPage,
            Capability::PublishPost,
            Capability::PostHistory,
            Capability::PostAnalytics,
            Capability::PageAnalytics,
            Capability::DeletePost,
            Capability::PageStatus,
        ]
    }

    fn auth_url(&self, state: &str) -> String {
        format!(
            "{}/dialog/oauth?client_id={}&redirect_uri={}&state={}&scope={}",
            self.dialog_url,
            urlencoding::encode(&self.oauth.client_id),
            urlencoding::encode(&self.oauth.redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode("pages_manage_posts,pages_read_engagement,read_insights"),
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
                ("fields", "id,name,access_token"),
                ("access_token", &account.auth_token),
            ])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(graph_failure(response).await);
        }

        let page: ConnectedPage = response.json().await.map_err(transport)?;
        let page = SocialPage {
            id: format!("fb_{}", page.id),
            platform: Platform::Facebook,
            vendor_page_id: page.id,
            name: page.name,
            auth_token: page.access_token,
            connection_method: None,
        };
        store_page_token(
            self.tokens.as_ref(),
            &self.oauth,
            &page.id,
            &page.auth_token,
            TOKEN_URL,
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
        tracing::info!(platform = %self.platform(), page = %page.vendor_page_id, "Publishing post");

        let scheduled = content.scheduled_at.map(|t| t.unix_timestamp());

        let value = match content.media.as_ref() {
            None => {
                let url = format!("{}/{}/feed", self.base_url, page.vendor_page_id);
                let body = FeedRequest {
                    message: Some(content.text.clone()),
                    published: scheduled.map(|_| false),
                    scheduled_publish_time: scheduled,
                    attached_media: None,
                    link: options.link.clone(),
                };
                self.post_json(&url, &token, &body).await?
            }
            Some(media) if media.kind == MediaKind::Video => {
                let file_url = media.urls.first().ok_or_else(|| {
                    PlatformError::validation("media", "video post requires a media URL")
                })?;
                let url = format!("{}/{}/videos", self.base_url, page.vendor_page_id);
                let body = VideoRequest {
                    file_url: file_url.clone(),
                    description: Some(content.text.clone()),
                };
                self.post_json(&url, &token, &body).await?
            }
            Some(media) if media.urls.len() <= 1 => {
                let image_url = media.urls.first().ok_or_else(|| {
                    PlatformError::validation("media", "image post requires a media URL")
                })?;
                let url = format!("{}/{}/photos", self.base_url, page.vendor_page_id);
                let body = PhotoRequest {
                    url: image_url.clone(),
                    caption: Some(content.text.clone()),
                    published: None,
                };
                self.post_json(&url, &token, &body).await?
            }
            Some(media) => {
                // Carousel: upload each photo unpublished, then attach in order
                let mut attached = Vec::with_capacity(media.urls.len());
                for media_url in &media.urls {
                    let fbid = self.upload_unpublished_photo(page, &token, media_url).await?;
                    attached.push(AttachedMedia { media_fbid: fbid });
                }
                let url = format!("{}/{}/feed", self.base_url, page.vendor_page_id);
                let body = FeedRequest {
                    message: Some(content.text.clone()),
                    published: scheduled.map(|_| false),
                    scheduled_publish_time: scheduled,
                    attached_media: Some(attached),
                    link: None,
                };
                self.post_json(&url, &token, &body).await?
            }
        };

        let id: IdResponse = serde_json::from_value(value)
            .map_err(|e| PlatformError::upstream(200, e.to_string()))?;

        Ok(PublishResult {
            post_id: id.id,
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
        let url = format!("{}/{}/posts", self.base_url, page.vendor_page_id);

        let limit = limit.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("fields", "id,message,created_time,permalink_url,full_picture"),
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

        let posts: PostsResponse = response.json().await.map_err(transport)?;
        let next_cursor = posts.paging.as_ref().and_then(|p| {
            // Graph returns an `after` cursor even on the last page; only
            // treat it as a continuation when `next` is present
            p.next.as_ref()?;
            p.cursors.as_ref()?.after.clone().map(Cursor)
        });

        Ok(HistoryPage {
            posts: posts
                .data
                .into_iter()
                .map(|p| PublishedPost {
                    created_at: parse_graph_time(&p.created_time),
                    id: p.id,
                    text: p.message,
                    permalink: p.permalink_url,
                    media_url: p.full_picture,
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
        let url = format!("{}/{}/insights", self.base_url, post_id);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("metric", "post_impressions,post_clicks,post_reactions_like_total"),
                ("access_token", &token),
            ])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(graph_failure(response).await);
        }

        let insights: InsightsResponse = response.json().await.map_err(transport)?;
        Ok(insights_report(post_id, insights))
    }

    async fn page_analytics(
        &self,
        page: &SocialPage,
        range: Option<&DateRange>,
    ) -> Result<AnalyticsReport, PlatformError> {
        let token = self.page_token(page).await?;
        let url = format!("{}/{}/insights", self.base_url, page.vendor_page_id);

        let mut query: Vec<(String, String)> = vec![
            (
                "metric".to_string(),
                "page_impressions,page_post_engagements,page_fans".to_string(),
            ),
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
        Ok(insights_report(&page.vendor_page_id, insights))
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
            .query(&[("fields", "id,name"), ("access_token", &token)])
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
