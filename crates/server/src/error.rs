//! Unified API error type

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use social_gateway_domain::PlatformError;

/// Produces `{"error": "<message>"}` JSON responses.
#[derive(Debug)]
pub struct ApiErr {
    status: StatusCode,
    message: String,
}

impl ApiErr {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

/// Adapter error taxonomy to HTTP status mapping. Vendor messages pass
/// through verbatim; no rewriting happens on the way out.
impl From<PlatformError> for ApiErr {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Validation { .. } => ApiErr::bad_request(err.to_string()),
            PlatformError::UpstreamAuth(_) => ApiErr::unauthorized(err.to_string()),
            PlatformError::UpstreamApi { .. } => ApiErr::internal(err.to_string()),
            PlatformError::UnsupportedCapability(_) => ApiErr::internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({"error": self.message})),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use social_gateway_domain::Capability;

    #[test]
    fn validation_maps_to_400() {
        let err: ApiErr = PlatformError::validation("media", "required").into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("media"));
    }

    #[test]
    fn upstream_auth_maps_to_401() {
        let err: ApiErr = PlatformError::UpstreamAuth("revoked".to_string()).into();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn upstream_api_keeps_vendor_message() {
        let err: ApiErr = PlatformError::upstream(403, "Not authorized to access board.").into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("Not authorized to access board."));
    }

    #[test]
    fn unsupported_capability_maps_to_500() {
        let err: ApiErr = PlatformError::UnsupportedCapability(Capability::StoryHistory).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("story_history"));
    }
}
