//! OAuth authorize redirect

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::error::ApiErr;
use crate::requests::{parse_method, parse_platform};
use crate::routes::social::resolve;

#[derive(Debug, Deserialize)]
pub struct OAuthQuery {
    #[serde(rename = "workspaceId")]
    pub workspace_id: String,
    #[serde(default)]
    pub method: Option<String>,
}

/// GET /api/social/oauth/{platform}?workspaceId=&method=
///
/// 302 to the vendor's authorize page. The workspace id (and connection
/// method, when given) are packed into the OAuth `state` parameter so the
/// callback can route the grant back to the right workspace.
pub async fn redirect(
    Path(platform): Path<String>,
    Query(query): Query<OAuthQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiErr> {
    let platform = parse_platform(&platform)?;
    let method = parse_method(query.method.as_deref())?;
    if query.workspace_id.is_empty() {
        return Err(ApiErr::bad_request("query 'workspaceId' must not be empty"));
    }
    let adapter = resolve(&state, platform, method)?;

    let oauth_state = match method {
        Some(method) => format!("{}|{}", query.workspace_id, method),
        None => query.workspace_id.clone(),
    };
    let url = adapter.auth_url(&oauth_state);

    tracing::info!(platform = %platform, workspace = %query.workspace_id, "OAuth redirect");
    Ok((StatusCode::FOUND, [(header::LOCATION, url)]))
}
