//! Application state and router assembly

use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{delete, get, post},
};
use secrecy::SecretString;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use social_gateway_adapters::{
    FacebookAdapter, GoogleBusinessAdapter, InstagramAdapter, InstagramApi, LinkedInAdapter,
    OAuthApp, PinterestAdapter, TikTokAdapter, YouTubeAdapter, tokens::SqliteTokenStore,
};
use social_gateway_domain::{ConnectionMethod, PlatformRegistry, TokenStore};

use crate::config::{AppConfig, PlatformConfig};
use crate::routes;

/// Shared state handed to every route handler
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<PlatformRegistry>,
    /// Bearer token API clients must present; `None` rejects all guarded
    /// routes
    pub api_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(registry: PlatformRegistry, api_token: Option<String>) -> Self {
        Self {
            registry: Arc::new(registry),
            api_token: api_token.map(Arc::from),
        }
    }
}

/// Build the full router: JSON routes under `/api/social` plus `/health`
pub fn build_router(state: AppState) -> Router {
    let social = Router::new()
        .route("/publish", post(routes::social::publish))
        .route("/history", post(routes::social::history))
        .route("/analytics/post", post(routes::social::post_analytics))
        .route("/analytics/page", post(routes::social::page_analytics))
        .route("/stories", post(routes::social::stories))
        .route("/creator-info", post(routes::social::creator_info))
        .route("/connect", post(routes::social::connect))
        .route("/status", post(routes::social::status))
        .route("/post", delete(routes::social::delete_post))
        .route("/oauth/{platform}", get(routes::oauth::redirect));

    Router::new()
        .nest("/api/social", social)
        .route("/health", get(routes::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

fn oauth_app(section: &PlatformConfig) -> Option<OAuthApp> {
    let secret = std::env::var(&section.client_secret_env)
        .ok()
        .filter(|s| !s.is_empty())?;
    Some(OAuthApp::new(
        section.client_id.clone(),
        SecretString::new(secret.into()),
        section.redirect_uri.clone(),
    ))
}

fn register_enabled(
    registry: &mut PlatformRegistry,
    name: &str,
    section: &PlatformConfig,
    register: impl FnOnce(&mut PlatformRegistry, OAuthApp),
) {
    if !section.enabled {
        return;
    }
    match oauth_app(section) {
        Some(app) => {
            tracing::info!(platform = name, "Platform enabled");
            register(registry, app);
        }
        None => {
            tracing::warn!(
                platform = name,
                env = %section.client_secret_env,
                "Platform enabled but client secret env var is unset; skipping"
            );
        }
    }
}

/// Build the platform registry from the enabled config sections.
///
/// Instagram registers the configured default path under the bare platform
/// key and both variants under their method keys, so callers can pin either.
pub fn build_registry(config: &AppConfig, tokens: Arc<dyn TokenStore>) -> PlatformRegistry {
    let mut registry = PlatformRegistry::new();

    register_enabled(&mut registry, "facebook", &config.facebook, |r, app| {
        r.register(Arc::new(FacebookAdapter::new(app, Arc::clone(&tokens))));
    });

    register_enabled(&mut registry, "instagram", &config.instagram.app, |r, app| {
        let graph = Arc::new(InstagramAdapter::new(
            app.clone(),
            Arc::clone(&tokens),
            InstagramApi::FacebookGraph,
        ));
        let direct = Arc::new(InstagramAdapter::new(
            app,
            Arc::clone(&tokens),
            InstagramApi::Direct,
        ));
        r.register_for_method(ConnectionMethod::FacebookGraph, Arc::clone(&graph) as _);
        r.register_for_method(ConnectionMethod::Direct, Arc::clone(&direct) as _);
        if config.instagram.api == "direct" {
            r.register(direct);
        } else {
            r.register(graph);
        }
    });

    register_enabled(&mut registry, "linkedin", &config.linkedin, |r, app| {
        r.register(Arc::new(LinkedInAdapter::new(app, Arc::clone(&tokens))));
    });

    register_enabled(&mut registry, "pinterest", &config.pinterest, |r, app| {
        r.register(Arc::new(PinterestAdapter::new(app, Arc::clone(&tokens))));
    });

    register_enabled(&mut registry, "tiktok", &config.tiktok, |r, app| {
        r.register(Arc::new(TikTokAdapter::new(app, Arc::clone(&tokens))));
    });

    register_enabled(&mut registry, "youtube", &config.youtube, |r, app| {
        r.register(Arc::new(YouTubeAdapter::new(app, Arc::clone(&tokens))));
    });

    register_enabled(&mut registry, "google", &config.google, |r, app| {
        r.register(Arc::new(GoogleBusinessAdapter::new(app, Arc::clone(&tokens))));
    });

    registry
}

/// Build the full application state from configuration: open the token store,
/// construct adapters for enabled platforms, read the API token from its env
pub async fn build_state(config: &AppConfig) -> Result<AppState> {
    let tokens: Arc<dyn TokenStore> = Arc::new(
        SqliteTokenStore::new(&config.tokens.db_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to open token store at {}",
                    config.tokens.db_path.display()
                )
            })?,
    );

    let registry = build_registry(config, tokens);
    if registry.is_empty() {
        tracing::warn!("No platforms enabled; all publish routes will return errors");
    }

    let api_token = std::env::var(&config.server.api_token_env)
        .ok()
        .filter(|s| !s.is_empty());
    if api_token.is_none() {
        tracing::warn!(
            env = %config.server.api_token_env,
            "API token env var is unset; guarded routes will reject all requests"
        );
    }

    Ok(AppState::new(registry, api_token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use social_gateway_adapters::tokens::InMemoryTokenStore;
    use social_gateway_domain::Platform;

    #[test]
    fn disabled_sections_register_nothing() {
        let config = AppConfig::default();
        let tokens: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::default());
        let registry = build_registry(&config, tokens);
        assert!(registry.is_empty());
    }

    #[test]
    fn enabled_section_without_secret_is_skipped() {
        let mut config = AppConfig::default();
        config.pinterest.enabled = true;
        config.pinterest.client_secret_env = "SOCIAL_GATEWAY_TEST_UNSET_SECRET".to_string();
        let tokens: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::default());
        let registry = build_registry(&config, tokens);
        assert!(registry.resolve(Platform::Pinterest, None).is_none());
    }
}
