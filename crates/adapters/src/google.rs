//! Google Business Profile adapter (My Business v4 local posts)

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

use crate::common::{http_client, store_page_token, transport, vendor_failure, OAuthApp};

const API_BASE: &str = "https://mybusiness.googleapis.com";
const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google Business Profile adapter. A "page" is a business location; its
/// vendor id is the full resource name (`accounts/{a}/locations/{l}`) and
/// post ids are local-post resource names under that parent.
pub struct GoogleBusinessAdapter {
    client: Client,
    oauth: OAuthApp,
    tokens: Arc<dyn TokenStore>,
    base_url: String,
}

impl GoogleBusinessAdapter {
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
}

#[derive(Serialize)]
struct LocalPostRequest {
    #[serde(rename = "languageCode")]
    language_code: &'static str,
    summary: String,
    #[serde(rename = "topicType")]
    topic_type: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    media: Vec<LocalPostMedia>,
    #[serde(rename = "callToAction", skip_serializing_if = "Option::is_none")]
    call_to_action: Option<CallToAction>,
}

#[derive(Serialize)]
struct LocalPostMedia {
    #[serde(rename = "mediaFormat")]
    media_format: &'static str,
    #[serde(rename = "sourceUrl")]
    source_url: String,
}

#[derive(Serialize)]
struct CallToAction {
    #[serde(rename = "actionType")]
    action_type: &'static str,
    url: String,
}

#[derive(Deserialize)]
struct LocalPost {
    name: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default, rename = "createTime")]
    create_time: Option<String>,
    #[serde(default, rename = "searchUrl")]
    search_url: Option<String>,
}

#[derive(Deserialize)]
struct LocalPostList {
    #[serde(default, rename = "localPosts")]
    local_posts: Vec<LocalPost>,
    #[serde(default, rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Serialize)]
struct InsightsRequest {
    #[serde(rename = "localPostNames")]
    local_post_names: Vec<String>,
    #[serde(rename = "basicRequest")]
    basic_request: BasicMetricsRequest,
}

#[derive(Serialize)]
struct BasicMetricsRequest {
    #[serde(rename = "metricRequests")]
    metric_requests: Vec<MetricRequest>,
}

#[derive(Serialize)]
struct MetricRequest {
    metric: &'static str,
}

#[derive(Deserialize)]
struct InsightsResponse {
    #[serde(default, rename = "localPostMetrics")]
    local_post_metrics: Vec<LocalPostMetrics>,
}

#[derive(Deserialize)]
struct LocalPostMetrics {
    #[serde(default, rename = "metricValues")]
    metric_values: Vec<MetricValue>,
}

#[derive(Deserialize)]
struct MetricValue {
    metric: String,
    #[serde(default, rename = "totalValue")]
    total_value: Option<TotalValue>,
}

/// Insight counters come back as decimal strings
#[derive(Deserialize)]
struct TotalValue {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Deserialize)]
struct Location {
    #[serde(rename = "locationName")]
    location_name: String,
}

fn parse_create_time(raw: Option<&str>) -> Option<time::OffsetDateTime> {
    raw.and_then(|s| {
        time::OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339).ok()
    })
}

#[async_trait]
impl PlatformOperations for GoogleBusinessAdapter {
    fn platform(&self) -> Platform {
        Platform::Google
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
            urlencoding::encode("https://www.googleapis.com/auth/business.manage"),
        )
    }

    async fn connect_page(
        &self,
        account: &SocialAccount,
        selector: &str,
    ) -> Result<SocialPage, PlatformError> {
        // Selector is the full location resource name
        let url = format!("{}/v4/{}", self.base_url, selector);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&account.auth_token)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }

        let location: Location = response.json().await.map_err(transport)?;
        let page = SocialPage {
            id: format!("gb_{}", selector.replace('/', "_")),
            platform: Platform::Google,
            vendor_page_id: selector.to_string(),
            name: location.location_name,
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
        let token = self.page_token(page).await?;
        tracing::info!(platform = %self.platform(), location = %page.vendor_page_id, "Publishing local post");

        let request = LocalPostRequest {
            language_code: "en",
            summary: content.text.clone(),
            topic_type: "STANDARD",
            media: content
                .media_urls()
                .iter()
                .map(|url| LocalPostMedia {
                    media_format: "PHOTO",
                    source_url: url.clone(),
                })
                .collect(),
            call_to_action: options.link.clone().map(|url| CallToAction {
                action_type: "LEARN_MORE",
                url,
            }),
        };

        let url = format!("{}/v4/{}/localPosts", self.base_url, page.vendor_page_id);
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

        let post: LocalPost = response.json().await.map_err(transport)?;
        Ok(PublishResult {
            post_id: post.name,
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

        let mut query = vec![("pageSize", limit.to_string())];
        if let Some(cursor) = cursor {
            query.push(("pageToken", cursor.as_str().to_string()));
        }

        let url = format!("{}/v4/{}/localPosts", self.base_url, page.vendor_page_id);
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

        let body: LocalPostList = response.json().await.map_err(transport)?;
        Ok(HistoryPage {
            posts: body
                .local_posts
                .into_iter()
                .map(|post| PublishedPost {
                    id: post.name,
                    text: post.summary,
                    created_at: parse_create_time(post.create_time.as_deref()),
                    permalink: post.search_url,
                    media_url: None,
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

        let url = format!(
            "{}/v4/{}/localPosts:reportInsights",
            self.base_url, page.vendor_page_id
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&InsightsRequest {
                local_post_names: vec![post_id.to_string()],
                basic_request: BasicMetricsRequest {
                    metric_requests: vec![MetricRequest { metric: "ALL" }],
                },
            })
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }

        let body: InsightsResponse = response.json().await.map_err(transport)?;
        let mut report = AnalyticsReport::new(post_id);
        if let Some(metrics) = body.local_post_metrics.into_iter().next() {
            for value in metrics.metric_values {
                let count = value
                    .total_value
                    .and_then(|t| t.value)
                    .and_then(|raw| raw.parse::<f64>().ok());
                if let Some(count) = count {
                    report.metrics.insert(value.metric.to_lowercase(), count);
                }
            }
        }
        Ok(report)
    }

    async fn delete_post(&self, page: &SocialPage, post_id: &str) -> Result<(), PlatformError> {
        let token = self.page_token(page).await?;
        // Post id is already a full resource name
        let url = format!("{}/v4/{}", self.base_url, post_id);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&token)
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
        let url = format!("{}/v4/{}", self.base_url, page.vendor_page_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
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
