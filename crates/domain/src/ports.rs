//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real vendor APIs.

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{
    AnalyticsReport, CreatorInfo, Cursor, DateRange, HistoryPage, PageStatus, Platform,
    PostContent, PublishOptions, PublishResult, SocialAccount, SocialPage, StoryPage,
};

/// One operation in the adapter contract.
///
/// Not every adapter implements every capability; callers check
/// [`PlatformOperations::capabilities`] before invoking the optional ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    AuthUrl,
    ConnectPage,
    PublishPost,
    PostHistory,
    PostAnalytics,
    PageAnalytics,
    StoryHistory,
    CreatorInfo,
    DeletePost,
    PageStatus,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::AuthUrl => "auth_url",
            Capability::ConnectPage => "connect_page",
            Capability::PublishPost => "publish_post",
            Capability::PostHistory => "post_history",
            Capability::PostAnalytics => "post_analytics",
            Capability::PageAnalytics => "page_analytics",
            Capability::StoryHistory => "story_history",
            Capability::CreatorInfo => "creator_info",
            Capability::DeletePost => "delete_post",
            Capability::PageStatus => "page_status",
        }
    }

    /// The operations every adapter must implement
    pub const REQUIRED: [Capability; 7] = [
        Capability::AuthUrl,
        Capability::ConnectPage,
        Capability::PublishPost,
        Capability::PostHistory,
        Capability::PostAnalytics,
        Capability::DeletePost,
        Capability::PageStatus,
    ];
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error taxonomy for adapter operations.
///
/// No retries happen anywhere in this layer: a transient vendor failure is
/// surfaced immediately and the caller decides whether to try again.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Content violates a vendor constraint; raised before any outbound call
    #[error("validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    /// Vendor rejected the credentials
    #[error("vendor rejected credentials: {0}")]
    UpstreamAuth(String),

    /// Vendor call failed for any other reason; message passed through verbatim
    #[error("vendor API error ({status}): {message}")]
    UpstreamApi {
        /// HTTP status from the vendor; 0 when the call failed before any
        /// status was received (connect error, timeout)
        status: u16,
        message: String,
    },

    /// Adapter does not implement this optional operation
    #[error("operation '{0}' is not supported by this platform")]
    UnsupportedCapability(Capability),
}

impl PlatformError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::UpstreamApi {
            status,
            message: message.into(),
        }
    }
}

/// The uniform operation set each vendor adapter implements.
///
/// Adapters are stateless apart from immutable configuration captured at
/// construction and are shared behind `Arc`. All operations except
/// [`auth_url`](Self::auth_url) perform outbound HTTP to the vendor; none
/// mutate local persistent state.
#[async_trait]
pub trait PlatformOperations: Send + Sync {
    fn platform(&self) -> Platform;

    /// The operations this adapter actually implements
    fn capabilities(&self) -> &'static [Capability];

    /// Build the vendor's OAuth authorize URL. Pure, no I/O.
    fn auth_url(&self, state: &str) -> String;

    /// Exchange a page selector (board id, channel id...) plus the account
    /// token for a page-scoped record
    async fn connect_page(
        &self,
        account: &SocialAccount,
        selector: &str,
    ) -> Result<SocialPage, PlatformError>;

    /// Translate the normalized content into the vendor's publish flow
    async fn publish_post(
        &self,
        page: &SocialPage,
        content: &PostContent,
        options: &PublishOptions,
    ) -> Result<PublishResult, PlatformError>;

    /// One page of past posts plus an opaque continuation cursor
    async fn post_history(
        &self,
        page: &SocialPage,
        limit: u32,
        cursor: Option<&Cursor>,
    ) -> Result<HistoryPage, PlatformError>;

    /// Engagement metrics for one post. Pinterest requires a date range;
    /// other vendors ignore it.
    async fn post_analytics(
        &self,
        page: &SocialPage,
        post_id: &str,
        range: Option<&DateRange>,
    ) -> Result<AnalyticsReport, PlatformError>;

    /// Delete one post. Idempotent from the caller's perspective.
    async fn delete_post(&self, page: &SocialPage, post_id: &str) -> Result<(), PlatformError>;

    /// Liveness/permission check, used to detect revoked tokens
    async fn check_page_status(&self, page: &SocialPage) -> Result<PageStatus, PlatformError>;

    /// Page-level analytics (Facebook, Instagram)
    async fn page_analytics(
        &self,
        _page: &SocialPage,
        _range: Option<&DateRange>,
    ) -> Result<AnalyticsReport, PlatformError> {
        Err(PlatformError::UnsupportedCapability(
            Capability::PageAnalytics,
        ))
    }

    /// Story history (Instagram)
    async fn story_history(
        &self,
        _page: &SocialPage,
        _limit: u32,
        _cursor: Option<&Cursor>,
    ) -> Result<StoryPage, PlatformError> {
        Err(PlatformError::UnsupportedCapability(
            Capability::StoryHistory,
        ))
    }

    /// Creator metadata (TikTok)
    async fn creator_info(&self, _page: &SocialPage) -> Result<CreatorInfo, PlatformError> {
        Err(PlatformError::UnsupportedCapability(Capability::CreatorInfo))
    }
}

/// Error type for token store operations
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("no token stored for page '{0}'")]
    NotFound(String),
    #[error("token refresh failed: {0}")]
    Refresh(String),
    #[error("token store error: {0}")]
    Store(String),
}

impl From<TokenError> for PlatformError {
    fn from(err: TokenError) -> Self {
        PlatformError::UpstreamAuth(err.to_string())
    }
}

/// A stored page-scoped credential with everything needed to refresh it
#[derive(Debug, Clone)]
pub struct StoredToken {
    /// Page ID the token is scoped to
    pub page_id: String,
    pub access_token: String,
    /// Absent for vendors issuing non-expiring page tokens
    pub expires_at: Option<OffsetDateTime>,
    pub refresh_token: Option<String>,
    /// Vendor token endpoint used for the refresh grant
    pub token_url: Option<String>,
    /// Client credentials sent with the refresh grant where the vendor
    /// requires them
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Port for resolving page-scoped vendor tokens.
///
/// Implementations own refresh-before-expiry; adapters call
/// [`get_secure_token`](Self::get_secure_token) once per operation and never
/// cache the result beyond that operation's lifetime.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Resolve a fresh token for the page, refreshing first if it is about
    /// to expire
    async fn get_secure_token(&self, page_id: &str) -> Result<SecretString, TokenError>;

    /// Store or replace the credential for a page (connect / OAuth callback)
    async fn put_token(&self, token: &StoredToken) -> Result<(), TokenError>;

    /// Drop the credential for a page (disconnect)
    async fn remove_token(&self, page_id: &str) -> Result<(), TokenError>;
}
