//! Shared plumbing for the vendor adapters

use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use social_gateway_domain::{PlatformError, StoredToken, TokenStore};
use std::time::Duration;

/// OAuth application credentials, sourced from process configuration at
/// adapter construction
#[derive(Clone)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
}

impl OAuthApp {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: SecretString,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
        }
    }
}

/// HTTP client with the default per-call timeout used by all adapters
pub(crate) fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build HTTP client")
}

/// Map a transport-level failure (connect error, timeout) to the taxonomy
pub(crate) fn transport(err: reqwest::Error) -> PlatformError {
    PlatformError::UpstreamApi {
        status: 0,
        message: err.to_string(),
    }
}

/// Map a non-success vendor response to the taxonomy.
///
/// 401 becomes `UpstreamAuth`; everything else (403 included, since vendors
/// use it for permission problems that are not credential failures) is
/// `UpstreamApi` with the vendor body passed through verbatim.
pub(crate) async fn vendor_failure(response: Response) -> PlatformError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    if status == 401 {
        PlatformError::UpstreamAuth(body)
    } else {
        PlatformError::UpstreamApi {
            status,
            message: body,
        }
    }
}

/// Extract the human-readable message from a Graph API error body
/// (`{"error": {"message": ...}}`), falling back to the raw body
pub(crate) fn graph_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Graph API variant of [`vendor_failure`]
pub(crate) async fn graph_failure(response: Response) -> PlatformError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = graph_message(&body);
    if status == 401 {
        PlatformError::UpstreamAuth(message)
    } else {
        PlatformError::UpstreamApi { status, message }
    }
}

/// Persist the page-scoped token produced by a connect flow, together with
/// the client credentials and token endpoint a later refresh grant needs
pub(crate) async fn store_page_token(
    tokens: &dyn TokenStore,
    oauth: &OAuthApp,
    page_id: &str,
    access_token: &str,
    token_url: &str,
) -> Result<(), PlatformError> {
    tokens
        .put_token(&StoredToken {
            page_id: page_id.to_string(),
            access_token: access_token.to_string(),
            expires_at: None,
            refresh_token: None,
            token_url: Some(token_url.to_string()),
            client_id: Some(oauth.client_id.clone()),
            client_secret: Some(oauth.client_secret.expose_secret().to_string()),
        })
        .await?;
    Ok(())
}

/// Download media bytes for vendors that require uploading the binary rather
/// than accepting a source URL (LinkedIn, YouTube)
pub(crate) async fn fetch_media_bytes(
    client: &Client,
    url: &str,
) -> Result<Vec<u8>, PlatformError> {
    let response = client.get(url).send().await.map_err(transport)?;
    if !response.status().is_success() {
        return Err(PlatformError::UpstreamApi {
            status: response.status().as_u16(),
            message: format!("failed to fetch media from {url}"),
        });
    }
    let bytes = response.bytes().await.map_err(transport)?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_message_prefers_nested_error() {
        let body = r#"{"error":{"message":"Invalid OAuth access token","code":190}}"#;
        assert_eq!(graph_message(body), "Invalid OAuth access token");
    }

    #[test]
    fn graph_message_falls_back_to_raw_body() {
        assert_eq!(graph_message("gateway timeout"), "gateway timeout");
    }
}
