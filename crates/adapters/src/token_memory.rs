//! In-memory token store (for testing)

use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::Mutex;
use time::OffsetDateTime;

use social_gateway_domain::{StoredToken, TokenError, TokenStore};

/// In-memory token store. Honors expiry but has no refresh path, so an
/// expired token is an error.
#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: Mutex<HashMap<String, StoredToken>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with a non-expiring token for one page
    pub fn with_token(page_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        let page_id = page_id.into();
        let mut tokens = HashMap::new();
        tokens.insert(
            page_id.clone(),
            StoredToken {
                page_id,
                access_token: access_token.into(),
                expires_at: None,
                refresh_token: None,
                token_url: None,
                client_id: None,
                client_secret: None,
            },
        );
        Self {
            tokens: Mutex::new(tokens),
        }
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get_secure_token(&self, page_id: &str) -> Result<SecretString, TokenError> {
        let tokens = self
            .tokens
            .lock()
            .map_err(|e| TokenError::Store(e.to_string()))?;
        let token = tokens
            .get(page_id)
            .ok_or_else(|| TokenError::NotFound(page_id.to_string()))?;

        if let Some(expires_at) = token.expires_at {
            if expires_at <= OffsetDateTime::now_utc() {
                return Err(TokenError::Refresh(format!(
                    "token for page '{page_id}' has expired"
                )));
            }
        }

        Ok(SecretString::new(token.access_token.clone().into()))
    }

    async fn put_token(&self, token: &StoredToken) -> Result<(), TokenError> {
        self.tokens
            .lock()
            .map_err(|e| TokenError::Store(e.to_string()))?
            .insert(token.page_id.clone(), token.clone());
        Ok(())
    }

    async fn remove_token(&self, page_id: &str) -> Result<(), TokenError> {
        self.tokens
            .lock()
            .map_err(|e| TokenError::Store(e.to_string()))?
            .remove(page_id);
        Ok(())
    }
}
