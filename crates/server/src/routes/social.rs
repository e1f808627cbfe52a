//! JSON routes for the platform operations

use axum::{Json, extract::State};
use std::sync::Arc;

use social_gateway_domain::{
    AnalyticsReport, ConnectionMethod, CreatorInfo, HistoryPage, PageStatus, Platform,
    PlatformOperations, PublishResult, SocialPage, StoryPage,
};

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::ApiErr;
use crate::requests::{
    ConnectRequest, CreatorInfoRequest, DeletePostRequest, HistoryRequest, PageAnalyticsRequest,
    PostAnalyticsRequest, PublishRequest, StatusRequest, StoriesRequest,
};

pub(crate) fn resolve(
    state: &AppState,
    platform: Platform,
    method: Option<ConnectionMethod>,
) -> Result<Arc<dyn PlatformOperations>, ApiErr> {
    state
        .registry
        .resolve(platform, method)
        .ok_or_else(|| ApiErr::bad_request(format!("platform '{}' is not enabled", platform)))
}

/// POST /api/social/publish
pub async fn publish(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<PublishRequest>,
) -> Result<Json<PublishResult>, ApiErr> {
    let (platform, method) = request.validate()?;
    let adapter = resolve(&state, platform, method)?;

    tracing::info!(platform = %platform, page = %request.page.id, "Publish request");
    let options = request.options.unwrap_or_default();
    let result = adapter
        .publish_post(&request.page, &request.content, &options)
        .await?;
    Ok(Json(result))
}

/// POST /api/social/history
pub async fn history(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<HistoryRequest>,
) -> Result<Json<HistoryPage>, ApiErr> {
    let (platform, method, limit) = request.validate()?;
    let adapter = resolve(&state, platform, method)?;

    let page = adapter
        .post_history(&request.page, limit, request.cursor.as_ref())
        .await?;
    Ok(Json(page))
}

/// POST /api/social/analytics/post
pub async fn post_analytics(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<PostAnalyticsRequest>,
) -> Result<Json<AnalyticsReport>, ApiErr> {
    let platform = request.validate()?;
    let adapter = resolve(&state, platform, request.page.connection_method)?;

    let report = adapter
        .post_analytics(&request.page, &request.post_id, request.range.as_ref())
        .await?;
    Ok(Json(report))
}

/// POST /api/social/analytics/page
pub async fn page_analytics(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<PageAnalyticsRequest>,
) -> Result<Json<AnalyticsReport>, ApiErr> {
    let platform = request.validate()?;
    let adapter = resolve(&state, platform, request.page.connection_method)?;

    let report = adapter
        .page_analytics(&request.page, request.range.as_ref())
        .await?;
    Ok(Json(report))
}

/// POST /api/social/stories
pub async fn stories(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<StoriesRequest>,
) -> Result<Json<StoryPage>, ApiErr> {
    let (platform, limit) = request.validate()?;
    let adapter = resolve(&state, platform, request.page.connection_method)?;

    let page = adapter
        .story_history(&request.page, limit, request.cursor.as_ref())
        .await?;
    Ok(Json(page))
}

/// POST /api/social/creator-info
pub async fn creator_info(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<CreatorInfoRequest>,
) -> Result<Json<CreatorInfo>, ApiErr> {
    let platform = request.validate()?;
    let adapter = resolve(&state, platform, request.page.connection_method)?;

    let info = adapter.creator_info(&request.page).await?;
    Ok(Json(info))
}

/// POST /api/social/connect
pub async fn connect(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<SocialPage>, ApiErr> {
    let (platform, method) = request.validate()?;
    let adapter = resolve(&state, platform, method)?;

    tracing::info!(platform = %platform, selector = %request.selector, "Connect request");
    let page = adapter
        .connect_page(&request.account, &request.selector)
        .await?;
    Ok(Json(page))
}

/// POST /api/social/status
pub async fn status(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<StatusRequest>,
) -> Result<Json<PageStatus>, ApiErr> {
    let platform = request.validate()?;
    let adapter = resolve(&state, platform, request.page.connection_method)?;

    let status = adapter.check_page_status(&request.page).await?;
    Ok(Json(status))
}

/// DELETE /api/social/post
pub async fn delete_post(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<DeletePostRequest>,
) -> Result<Json<serde_json::Value>, ApiErr> {
    let platform = request.validate()?;
    let adapter = resolve(&state, platform, request.page.connection_method)?;

    tracing::info!(platform = %platform, post_id = %request.post_id, "Delete request");
    adapter.delete_post(&request.page, &request.post_id).await?;
    Ok(Json(serde_json::json!({"deleted": true})))
}
