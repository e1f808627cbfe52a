//! Domain models and value objects

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Supported social platforms (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    LinkedIn,
    Pinterest,
    TikTok,
    YouTube,
    Google,
}

impl Platform {
    /// All supported platforms, in registry order
    pub const ALL: [Platform; 7] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::LinkedIn,
        Platform::Pinterest,
        Platform::TikTok,
        Platform::YouTube,
        Platform::Google,
    ];

    /// Parse a platform tag; returns `None` for anything outside the closed set
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "facebook" => Some(Platform::Facebook),
            "instagram" => Some(Platform::Instagram),
            "linkedin" => Some(Platform::LinkedIn),
            "pinterest" => Some(Platform::Pinterest),
            "tiktok" => Some(Platform::TikTok),
            "youtube" => Some(Platform::YouTube),
            "google" => Some(Platform::Google),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::LinkedIn => "linkedin",
            Platform::Pinterest => "pinterest",
            Platform::TikTok => "tiktok",
            Platform::YouTube => "youtube",
            Platform::Google => "google",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integration path for platforms with more than one (currently only Instagram)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMethod {
    /// Via the Facebook Graph API (business accounts)
    FacebookGraph,
    /// Via the platform's own API (e.g. Instagram Login)
    Direct,
}

impl ConnectionMethod {
    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "facebook_graph" | "facebook" => Some(ConnectionMethod::FacebookGraph),
            "direct" => Some(ConnectionMethod::Direct),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionMethod::FacebookGraph => "facebook_graph",
            ConnectionMethod::Direct => "direct",
        }
    }
}

impl std::fmt::Display for ConnectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection state of an account or page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Connected,
    Expired,
    Revoked,
}

/// An authenticated connection to one vendor.
///
/// Created on OAuth completion, updated on token refresh, deleted on
/// disconnect. Persistence is the route layer's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialAccount {
    /// Internal account ID
    pub id: String,
    pub platform: Platform,
    /// Display name at the vendor
    pub name: String,
    /// Account-level access token from the OAuth exchange
    pub auth_token: String,
    #[serde(default)]
    pub status: ConnectionStatus,
}

/// A publishable unit under an account (a Page, Board, Channel, location...).
///
/// Vendors issue page-scoped tokens; every adapter operation on a page must
/// authenticate with the page token resolved through the token store, never
/// the parent account's token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialPage {
    /// Internal page ID (token store key)
    pub id: String,
    pub platform: Platform,
    /// Vendor-side identifier (page id, board id, channel id...)
    pub vendor_page_id: String,
    pub name: String,
    /// Page-scoped token as returned by the connect exchange
    pub auth_token: String,
    /// Integration path, where the platform has more than one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_method: Option<ConnectionMethod>,
}

/// Media attachment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Carousel,
}

/// Media attached to a post. URL order is significant and must be preserved
/// into vendor payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaBundle {
    pub kind: MediaKind,
    pub urls: Vec<String>,
}

/// Platform-agnostic post payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostContent {
    /// Text body (caption, summary, description — vendor-dependent)
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaBundle>,
    /// Desired publish time for platforms that accept scheduling
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub scheduled_at: Option<OffsetDateTime>,
}

impl PostContent {
    /// Text-only post
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media: None,
            scheduled_at: None,
        }
    }

    /// Media URLs, empty when no media is attached
    pub fn media_urls(&self) -> &[String] {
        self.media.as_ref().map(|m| m.urls.as_slice()).unwrap_or(&[])
    }
}

/// Post visibility at the vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
    Unlisted,
}

/// Per-platform publish-time flags. A sparse object: each adapter reads only
/// the fields it recognizes and ignores the rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub made_for_kids: Option<bool>,
    /// Title override (YouTube, Pinterest)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Description override, used instead of the post text where a vendor
    /// distinguishes the two
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Pinterest board section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_section: Option<String>,
    /// Disable comments where the vendor supports it (TikTok)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_comments: Option<bool>,
    /// Destination link (Pinterest pins, Google Business call-to-action)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Normalized status of a publish call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Live at the vendor
    Published,
    /// Accepted for a future publish time
    Scheduled,
    /// Accepted, vendor-side processing pending (e.g. video transcode)
    Processing,
}

/// Vendor-assigned identifier plus normalized status, returned uniformly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResult {
    pub post_id: String,
    pub status: PostStatus,
}

/// Opaque pagination cursor.
///
/// Shape is vendor-specific (numeric offset or string token); callers pass it
/// back unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub String);

impl Cursor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A past post as reported by the vendor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedPost {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

/// One page of post history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    pub posts: Vec<PublishedPost>,
    /// Cursor for the next page; absent when exhausted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// A story as reported by the vendor (Instagram)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryPost {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

/// One page of story history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryPage {
    pub stories: Vec<StoryPost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// Inclusive date range for analytics queries. Some vendors require one,
/// others ignore it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(with = "time::serde::rfc3339")]
    pub since: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub until: OffsetDateTime,
}

/// Named engagement metrics for one post or page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsReport {
    /// Post ID or page ID the metrics refer to
    pub subject: String,
    pub metrics: BTreeMap<String, f64>,
}

impl AnalyticsReport {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

/// Result of a page liveness/permission check. Used to detect revoked tokens
/// before a scheduled publish attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageStatus {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl PageStatus {
    pub fn healthy() -> Self {
        Self {
            ok: true,
            detail: None,
        }
    }

    pub fn broken(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

/// Creator metadata (TikTok)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorInfo {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follower_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_video_duration_secs: Option<u64>,
    /// Privacy levels the creator may publish under
    #[serde(default)]
    pub privacy_options: Vec<String>,
}
