//! Bearer-token guard for the API routes

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::app::AppState;
use crate::error::ApiErr;

/// Extractor that rejects with 401 before the handler body runs unless the
/// request carries the configured bearer token.
pub struct AuthUser;

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiErr;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state
            .api_token
            .as_deref()
            .ok_or_else(|| ApiErr::unauthorized("server API token is not configured"))?;

        let presented = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ApiErr::unauthorized("missing bearer token"))?;

        if presented != expected {
            return Err(ApiErr::unauthorized("invalid bearer token"));
        }
        Ok(AuthUser)
    }
}
