//! Request schemas for the API routes
//!
//! Field-level validation happens once here, at the boundary; handlers and
//! adapters receive already-checked values.

use serde::Deserialize;

use social_gateway_domain::{
    ConnectionMethod, Cursor, DateRange, Platform, PostContent, PublishOptions, SocialAccount,
    SocialPage,
};

use crate::error::ApiErr;

const MAX_HISTORY_LIMIT: u32 = 100;
const DEFAULT_HISTORY_LIMIT: u32 = 25;

/// Parse a platform tag, rejecting anything outside the closed set
pub fn parse_platform(tag: &str) -> Result<Platform, ApiErr> {
    Platform::parse(tag)
        .ok_or_else(|| ApiErr::bad_request(format!("unknown platform '{}'", tag)))
}

pub fn parse_method(method: Option<&str>) -> Result<Option<ConnectionMethod>, ApiErr> {
    match method {
        Some(raw) => ConnectionMethod::parse(raw)
            .map(Some)
            .ok_or_else(|| ApiErr::bad_request(format!("unknown connection method '{}'", raw))),
        None => Ok(None),
    }
}

fn check_page(page: &SocialPage) -> Result<(), ApiErr> {
    if page.id.is_empty() {
        return Err(ApiErr::bad_request("field 'page.id' must not be empty"));
    }
    if page.vendor_page_id.is_empty() {
        return Err(ApiErr::bad_request(
            "field 'page.vendor_page_id' must not be empty",
        ));
    }
    Ok(())
}

fn check_limit(limit: Option<u32>) -> Result<u32, ApiErr> {
    let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 || limit > MAX_HISTORY_LIMIT {
        return Err(ApiErr::bad_request(format!(
            "field 'limit' must be between 1 and {}",
            MAX_HISTORY_LIMIT
        )));
    }
    Ok(limit)
}

fn check_range(range: Option<&DateRange>) -> Result<(), ApiErr> {
    if let Some(range) = range {
        if range.since > range.until {
            return Err(ApiErr::bad_request(
                "field 'range' must have since <= until",
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub platform: String,
    #[serde(default)]
    pub method: Option<String>,
    pub page: SocialPage,
    pub content: PostContent,
    #[serde(default)]
    pub options: Option<PublishOptions>,
}

impl PublishRequest {
    pub fn validate(&self) -> Result<(Platform, Option<ConnectionMethod>), ApiErr> {
        let platform = parse_platform(&self.platform)?;
        let method = parse_method(self.method.as_deref())?;
        check_page(&self.page)?;
        if self.content.text.is_empty() && self.content.media_urls().is_empty() {
            return Err(ApiErr::bad_request(
                "field 'content' must carry text or media",
            ));
        }
        Ok((platform, method))
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryRequest {
    pub platform: String,
    #[serde(default)]
    pub method: Option<String>,
    pub page: SocialPage,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub cursor: Option<Cursor>,
}

impl HistoryRequest {
    pub fn validate(&self) -> Result<(Platform, Option<ConnectionMethod>, u32), ApiErr> {
        let platform = parse_platform(&self.platform)?;
        let method = parse_method(self.method.as_deref())?;
        check_page(&self.page)?;
        let limit = check_limit(self.limit)?;
        Ok((platform, method, limit))
    }
}

#[derive(Debug, Deserialize)]
pub struct PostAnalyticsRequest {
    pub platform: String,
    pub page: SocialPage,
    pub post_id: String,
    #[serde(default)]
    pub range: Option<DateRange>,
}

impl PostAnalyticsRequest {
    pub fn validate(&self) -> Result<Platform, ApiErr> {
        let platform = parse_platform(&self.platform)?;
        check_page(&self.page)?;
        if self.post_id.is_empty() {
            return Err(ApiErr::bad_request("field 'post_id' must not be empty"));
        }
        check_range(self.range.as_ref())?;
        Ok(platform)
    }
}

#[derive(Debug, Deserialize)]
pub struct PageAnalyticsRequest {
    pub platform: String,
    pub page: SocialPage,
    #[serde(default)]
    pub range: Option<DateRange>,
}

impl PageAnalyticsRequest {
    pub fn validate(&self) -> Result<Platform, ApiErr> {
        let platform = parse_platform(&self.platform)?;
        check_page(&self.page)?;
        check_range(self.range.as_ref())?;
        Ok(platform)
    }
}

#[derive(Debug, Deserialize)]
pub struct StoriesRequest {
    pub platform: String,
    pub page: SocialPage,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub cursor: Option<Cursor>,
}

impl StoriesRequest {
    pub fn validate(&self) -> Result<(Platform, u32), ApiErr> {
        let platform = parse_platform(&self.platform)?;
        check_page(&self.page)?;
        let limit = check_limit(self.limit)?;
        Ok((platform, limit))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatorInfoRequest {
    pub platform: String,
    pub page: SocialPage,
}

impl CreatorInfoRequest {
    pub fn validate(&self) -> Result<Platform, ApiErr> {
        let platform = parse_platform(&self.platform)?;
        check_page(&self.page)?;
        Ok(platform)
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub platform: String,
    #[serde(default)]
    pub method: Option<String>,
    pub account: SocialAccount,
    pub selector: String,
}

impl ConnectRequest {
    pub fn validate(&self) -> Result<(Platform, Option<ConnectionMethod>), ApiErr> {
        let platform = parse_platform(&self.platform)?;
        let method = parse_method(self.method.as_deref())?;
        if self.account.auth_token.is_empty() {
            return Err(ApiErr::bad_request(
                "field 'account.auth_token' must not be empty",
            ));
        }
        if self.selector.is_empty() {
            return Err(ApiErr::bad_request("field 'selector' must not be empty"));
        }
        Ok((platform, method))
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub platform: String,
    pub page: SocialPage,
}

impl StatusRequest {
    pub fn validate(&self) -> Result<Platform, ApiErr> {
        let platform = parse_platform(&self.platform)?;
        check_page(&self.page)?;
        Ok(platform)
    }
}

#[derive(Debug, Deserialize)]
pub struct DeletePostRequest {
    pub platform: String,
    pub page: SocialPage,
    pub post_id: String,
}

impl DeletePostRequest {
    pub fn validate(&self) -> Result<Platform, ApiErr> {
        let platform = parse_platform(&self.platform)?;
        check_page(&self.page)?;
        if self.post_id.is_empty() {
            return Err(ApiErr::bad_request("field 'post_id' must not be empty"));
        }
        Ok(platform)
    }
}
