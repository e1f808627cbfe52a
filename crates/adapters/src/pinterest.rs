//! Pinterest adapter (v5 API)

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

use crate::common::{http_client, store_page_token, transport, vendor_failure, OAuthApp};

const API_BASE: &str = "https://api.pinterest.com";
const AUTHORIZE_URL: &str = "https://www.pinterest.com/oauth/";

/// Pinterest adapter. A "page" is a board; pins are created against it.
pub struct PinterestAdapter {
    client: Client,
    oauth: OAuthApp,
    tokens: Arc<dyn TokenStore>,
    base_url: String,
}

impl PinterestAdapter {
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
struct CreatePinRequest {
    board_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    board_section_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_source: Option<MediaSource>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MediaSource {
    Single {
        source_type: &'static str,
        url: String,
    },
    MultipleImages {
        source_type: &'static str,
        items: Vec<MediaItem>,
    },
}

#[derive(Serialize)]
struct MediaItem {
    url: String,
}

#[derive(Deserialize)]
struct PinResponse {
    id: String,
}

#[derive(Deserialize)]
struct PinListResponse {
    #[serde(default)]
    items: Vec<PinItem>,
    #[serde(default)]
    bookmark: Option<String>,
}

#[derive(Deserialize)]
struct PinItem {
    id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    media: Option<PinMedia>,
}

#[derive(Deserialize)]
struct PinMedia {
    #[serde(default)]
    images: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct AnalyticsResponse {
    #[serde(default)]
    all: Option<AnalyticsBucket>,
}

#[derive(Deserialize)]
struct AnalyticsBucket {
    #[serde(default)]
    summary_metrics: std::collections::BTreeMap<String, f64>,
}

#[derive(Deserialize)]
struct BoardResponse {
    id: String,
    name: String,
}

const DATE_FMT: &[time::format_description::BorrowedFormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day]");

fn media_source(content: &PostContent) -> Option<MediaSource> {
    let media = content.media.as_ref()?;
    match media.kind {
        MediaKind::Video => media.urls.first().map(|url| MediaSource::Single {
            source_type: "video_url",
            url: url.clone(),
        }),
        MediaKind::Carousel if media.urls.len() > 1 => Some(MediaSource::MultipleImages {
            source_type: "multiple_image_urls",
            items: media
                .urls
                .iter()
                .map(|url| MediaItem { url: url.clone() })
                .collect(),
        }),
        _ => media.urls.first().map(|url| MediaSource::Single {
            source_type: "image_url",
            url: url.clone(),
        }),
    }
}

#[async_trait]
impl PlatformOperations for PinterestAdapter {
    fn platform(&self) -> Platform {
        Platform::Pinterest
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
            urlencoding::encode("boards:read,pins:read,pins:write,user_accounts:read"),
        )
    }

    async fn connect_page(
        &self,
        account: &SocialAccount,
        selector: &str,
    ) -> Result<SocialPage, PlatformError> {
        let url = format!("{}/v5/boards/{}", self.base_url, selector);
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

        let board: BoardResponse = response.json().await.map_err(transport)?;
        let page = SocialPage {
            id: format!("pin_{}", board.id),
            platform: Platform::Pinterest,
            vendor_page_id: board.id,
            name: board.name,
            // Pinterest issues account-wide tokens; the board record carries
            // a copy so the store stays page-keyed
            auth_token: account.auth_token.clone(),
            connection_method: None,
        };
        store_page_token(
            self.tokens.as_ref(),
            &self.oauth,
            &page.id,
            &page.auth_token,
            "https://api.pinterest.com/v5/oauth/token",
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
        tracing::info!(platform = %self.platform(), page = %page.vendor_page_id, "Publishing pin");

        let request = CreatePinRequest {
            board_id: page.vendor_page_id.clone(),
            board_section_id: options.board_section.clone(),
            title: options.title.clone(),
            description: options
                .description
                .clone()
                .unwrap_or_else(|| content.text.clone()),
            link: options.link.clone(),
            media_source: media_source(content),
        };

        let url = format!("{}/v5/pins", self.base_url);
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

        let pin: PinResponse = response.json().await.map_err(transport)?;
        Ok(PublishResult {
            post_id: pin.id,
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
        let url = format!("{}/v5/boards/{}/pins", self.base_url, page.vendor_page_id);

        let limit = limit.to_string();
        let mut query: Vec<(&str, &str)> = vec![("page_size", &limit)];
        if let Some(cursor) = cursor {
            query.push(("bookmark", cursor.as_str()));
        }

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

        let pins: PinListResponse = response.json().await.map_err(transport)?;
        Ok(HistoryPage {
            posts: pins
                .items
                .into_iter()
                .map(|p| PublishedPost {
                    created_at: p.created_at.as_deref().and_then(|s| {
                        time::OffsetDateTime::parse(
                            s,
                            &time::format_description::well_known::Rfc3339,
                        )
                        .ok()
                    }),
                    media_url: p.media.and_then(|m| {
                        m.images
                            .as_ref()
                            .and_then(|i| i.pointer("/originals/url"))
                            .and_then(|u| u.as_str())
                            .map(str::to_string)
                    }),
                    id: p.id,
                    text: p.description,
                    permalink: p.link,
                })
                .collect(),
            next_cursor: pins.bookmark.map(Cursor),
        })
    }

    async fn post_analytics(
        &self,
        page: &SocialPage,
        post_id: &str,
        range: Option<&DateRange>,
    ) -> Result<AnalyticsReport, PlatformError> {
        // Pinterest analytics is range-scoped; the vendor rejects requests
        // without one, so fail fast here
        let range = range.ok_or_else(|| {
            PlatformError::validation("range", "Pinterest analytics requires a date range")
        })?;

        let token = self.page_token(page).await?;
        let start = range
            .since
            .format(DATE_FMT)
            .map_err(|e| PlatformError::validation("range", e.to_string()))?;
        let end = range
            .until
            .format(DATE_FMT)
            .map_err(|e| PlatformError::validation("range", e.to_string()))?;

        let url = format!("{}/v5/pins/{}/analytics", self.base_url, post_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[
                ("start_date", start.as_str()),
                ("end_date", end.as_str()),
                ("metric_types", "IMPRESSION,PIN_CLICK,SAVE"),
            ])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(vendor_failure(response).await);
        }

        let analytics: AnalyticsResponse = response.json().await.map_err(transport)?;
        let mut report = AnalyticsReport::new(post_id);
        if let Some(bucket) = analytics.all {
            report.metrics = bucket.summary_metrics;
        }
        Ok(report)
    }

    async fn delete_post(&self, page: &SocialPage, post_id: &str) -> Result<(), PlatformError> {
        let token = self.page_token(page).await?;
        let url = format!("{}/v5/pins/{}", self.base_url, post_id);
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
        let url = format!("{}/v5/user_account", self.base_url);
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
