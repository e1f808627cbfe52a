//! Stub adapter for wiring tests without a vendor behind it

use async_trait::async_trait;
use std::sync::Mutex;

use social_gateway_domain::{
    AnalyticsReport, Capability, Cursor, DateRange, HistoryPage, PageStatus, Platform,
    PlatformError, PlatformOperations, PostContent, PostStatus, PublishOptions, PublishResult,
    SocialAccount, SocialPage,
};

/// Records every call and answers with canned results. Useful for exercising
/// the registry and route layer without HTTP mocks.
pub struct StubPlatform {
    platform: Platform,
    calls: Mutex<Vec<String>>,
    fail_with: Mutex<Option<PlatformError>>,
}

impl StubPlatform {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            calls: Mutex::new(Vec::new()),
            fail_with: Mutex::new(None),
        }
    }

    /// Make every subsequent operation fail with the given error
    pub fn fail_with(self, error: PlatformError) -> Self {
        *self.fail_with.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
        self
    }

    /// Operation names in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, op: &str) -> Result<(), PlatformError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(op.to_string());
        let failure = self.fail_with.lock().unwrap_or_else(|e| e.into_inner());
        match failure.as_ref() {
            Some(PlatformError::Validation { field, message }) => Err(PlatformError::Validation {
                field: field.clone(),
                message: message.clone(),
            }),
            Some(PlatformError::UpstreamAuth(msg)) => Err(PlatformError::UpstreamAuth(msg.clone())),
            Some(PlatformError::UpstreamApi { status, message }) => Err(PlatformError::UpstreamApi {
                status: *status,
                message: message.clone(),
            }),
            Some(PlatformError::UnsupportedCapability(cap)) => {
                Err(PlatformError::UnsupportedCapability(*cap))
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PlatformOperations for StubPlatform {
    fn platform(&self) -> Platform {
        self.platform
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
        format!("https://stub.example/oauth?state={}", state)
    }

    async fn connect_page(
        &self,
        account: &SocialAccount,
        selector: &str,
    ) -> Result<SocialPage, PlatformError> {
        self.record("connect_page")?;
        Ok(SocialPage {
            id: format!("stub_{}", selector),
            platform: self.platform,
            vendor_page_id: selector.to_string(),
            name: format!("{} page", account.name),
            auth_token: account.auth_token.clone(),
            connection_method: None,
        })
    }

    async fn publish_post(
        &self,
        _page: &SocialPage,
        _content: &PostContent,
        _options: &PublishOptions,
    ) -> Result<PublishResult, PlatformError> {
        self.record("publish_post")?;
        Ok(PublishResult {
            post_id: "stub_post_1".to_string(),
            status: PostStatus::Published,
        })
    }

    async fn post_history(
        &self,
        _page: &SocialPage,
        _limit: u32,
        _cursor: Option<&Cursor>,
    ) -> Result<HistoryPage, PlatformError> {
        self.record("post_history")?;
        Ok(HistoryPage {
            posts: Vec::new(),
            next_cursor: None,
        })
    }

    async fn post_analytics(
        &self,
        _page: &SocialPage,
        post_id: &str,
        _range: Option<&DateRange>,
    ) -> Result<AnalyticsReport, PlatformError> {
        self.record("post_analytics")?;
        Ok(AnalyticsReport::new(post_id).with_metric("impressions", 1.0))
    }

    async fn delete_post(&self, _page: &SocialPage, _post_id: &str) -> Result<(), PlatformError> {
        self.record("delete_post")?;
        Ok(())
    }

    async fn check_page_status(&self, _page: &SocialPage) -> Result<PageStatus, PlatformError> {
        self.record("check_page_status")?;
        Ok(PageStatus::healthy())
    }
}
