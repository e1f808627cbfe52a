//! Platform registry: (platform, connection method) → adapter
//!
//! Dispatch is over the closed [`Platform`] enum rather than free-form
//! strings; unknown tags fail at request parsing, and `resolve` itself never
//! errors. Registries are built explicitly at startup and handed to route
//! handlers, so there is no process-wide singleton state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{ConnectionMethod, Platform};
use crate::ports::PlatformOperations;

/// Maps a platform (and optional connection-method variant) to an adapter
#[derive(Default)]
pub struct PlatformRegistry {
    entries: HashMap<(Platform, Option<ConnectionMethod>), Arc<dyn PlatformOperations>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the default adapter for its platform
    pub fn register(&mut self, adapter: Arc<dyn PlatformOperations>) {
        self.entries.insert((adapter.platform(), None), adapter);
    }

    /// Register an adapter for a specific connection method (e.g. Instagram
    /// via the Facebook Graph API vs. direct)
    pub fn register_for_method(
        &mut self,
        method: ConnectionMethod,
        adapter: Arc<dyn PlatformOperations>,
    ) {
        self.entries
            .insert((adapter.platform(), Some(method)), adapter);
    }

    /// Look up an adapter. Falls back to the platform's default entry when no
    /// adapter is registered for the requested method. Returns `None` for
    /// unregistered platforms; never errors.
    pub fn resolve(
        &self,
        platform: Platform,
        method: Option<ConnectionMethod>,
    ) -> Option<Arc<dyn PlatformOperations>> {
        if let Some(method) = method {
            if let Some(adapter) = self.entries.get(&(platform, Some(method))) {
                return Some(Arc::clone(adapter));
            }
        }
        self.entries.get(&(platform, None)).map(Arc::clone)
    }

    /// Platforms with at least one registered adapter. Filtering over
    /// [`Platform::ALL`] keeps the result ordered and free of duplicates even
    /// when a platform has both a default and a method-specific entry.
    pub fn platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.entries.keys().any(|(entry, _)| entry == p))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::ports::*;
    use async_trait::async_trait;

    struct FakeAdapter {
        platform: Platform,
        label: &'static str,
    }

    #[async_trait]
    impl PlatformOperations for FakeAdapter {
        fn platform(&self) -> Platform {
            self.platform
        }

        fn capabilities(&self) -> &'static [Capability] {
            &Capability::REQUIRED
        }

        fn auth_url(&self, state: &str) -> String {
            format!("https://example.com/{}/oauth?state={state}", self.label)
        }

        async fn connect_page(
            &self,
            _account: &SocialAccount,
            selector: &str,
        ) -> Result<SocialPage, PlatformError> {
            Ok(SocialPage {
                id: format!("{}:{selector}", self.label),
                platform: self.platform,
                vendor_page_id: selector.to_string(),
                name: self.label.to_string(),
                auth_token: "page-token".to_string(),
                connection_method: None,
            })
        }

        async fn publish_post(
            &self,
            _page: &SocialPage,
            _content: &PostContent,
            _options: &PublishOptions,
        ) -> Result<PublishResult, PlatformError> {
            Ok(PublishResult {
                post_id: format!("{}_post", self.label),
                status: PostStatus::Published,
            })
        }

        async fn post_history(
            &self,
            _page: &SocialPage,
            _limit: u32,
            _cursor: Option<&Cursor>,
        ) -> Result<HistoryPage, PlatformError> {
            Ok(HistoryPage {
                posts: vec![],
                next_cursor: None,
            })
        }

        async fn post_analytics(
            &self,
            _page: &SocialPage,
            post_id: &str,
            _range: Option<&DateRange>,
        ) -> Result<AnalyticsReport, PlatformError> {
            Ok(AnalyticsReport::new(post_id))
        }

        async fn delete_post(
            &self,
            _page: &SocialPage,
            _post_id: &str,
        ) -> Result<(), PlatformError> {
            Ok(())
        }

        async fn check_page_status(&self, _page: &SocialPage) -> Result<PageStatus, PlatformError> {
            Ok(PageStatus::healthy())
        }
    }

    fn fake(platform: Platform, label: &'static str) -> Arc<dyn PlatformOperations> {
        Arc::new(FakeAdapter { platform, label })
    }

    #[test]
    fn resolve_returns_registered_adapter() {
        let mut registry = PlatformRegistry::new();
        registry.register(fake(Platform::Pinterest, "pinterest"));

        assert!(registry.resolve(Platform::Pinterest, None).is_some());
        assert!(registry.resolve(Platform::YouTube, None).is_none());
    }

    #[test]
    fn platforms_lists_each_platform_once() {
        let mut registry = PlatformRegistry::new();
        registry.register(fake(Platform::Instagram, "ig-direct"));
        registry.register_for_method(
            ConnectionMethod::FacebookGraph,
            fake(Platform::Instagram, "ig-graph"),
        );
        registry.register(fake(Platform::Pinterest, "pinterest"));

        assert_eq!(
            registry.platforms(),
            vec![Platform::Instagram, Platform::Pinterest]
        );
    }

    #[test]
    fn resolve_covers_every_platform_when_all_registered() {
        let mut registry = PlatformRegistry::new();
        for platform in Platform::ALL {
            registry.register(fake(platform, "fake"));
        }

        for platform in Platform::ALL {
            let adapter = registry.resolve(platform, None).unwrap();
            assert_eq!(adapter.platform(), platform);
        }
    }

    #[test]
    fn resolve_prefers_method_specific_entry() {
        let mut registry = PlatformRegistry::new();
        registry.register(fake(Platform::Instagram, "ig-direct"));
        registry.register_for_method(
            ConnectionMethod::FacebookGraph,
            fake(Platform::Instagram, "ig-graph"),
        );

        let graph = registry
            .resolve(Platform::Instagram, Some(ConnectionMethod::FacebookGraph))
            .unwrap();
        assert!(graph.auth_url("s").contains("ig-graph"));

        let default = registry.resolve(Platform::Instagram, None).unwrap();
        assert!(default.auth_url("s").contains("ig-direct"));
    }

    #[test]
    fn resolve_falls_back_to_default_for_unknown_method() {
        let mut registry = PlatformRegistry::new();
        registry.register(fake(Platform::Facebook, "facebook"));

        let adapter = registry
            .resolve(Platform::Facebook, Some(ConnectionMethod::Direct))
            .unwrap();
        assert_eq!(adapter.platform(), Platform::Facebook);
    }

    #[tokio::test]
    async fn optional_operations_default_to_unsupported() {
        let adapter = fake(Platform::Pinterest, "pinterest");
        let page = SocialPage {
            id: "p1".to_string(),
            platform: Platform::Pinterest,
            vendor_page_id: "board1".to_string(),
            name: "Board".to_string(),
            auth_token: "t".to_string(),
            connection_method: None,
        };

        let err = adapter.creator_info(&page).await.unwrap_err();
        assert!(matches!(
            err,
            PlatformError::UnsupportedCapability(Capability::CreatorInfo)
        ));

        let err = adapter.story_history(&page, 10, None).await.unwrap_err();
        assert!(matches!(
            err,
            PlatformError::UnsupportedCapability(Capability::StoryHistory)
        ));

        let err = adapter.page_analytics(&page, None).await.unwrap_err();
        assert!(matches!(
            err,
            PlatformError::UnsupportedCapability(Capability::PageAnalytics)
        ));
    }

    #[test]
    fn platforms_lists_registered_only() {
        let mut registry = PlatformRegistry::new();
        registry.register(fake(Platform::Facebook, "facebook"));
        registry.register(fake(Platform::YouTube, "youtube"));

        let platforms = registry.platforms();
        assert_eq!(platforms, vec![Platform::Facebook, Platform::YouTube]);
    }
}
