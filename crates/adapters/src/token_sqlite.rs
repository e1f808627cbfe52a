//! SQLite token store with refresh-before-expiry

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;
use time::OffsetDateTime;

use social_gateway_domain::{StoredToken, TokenError, TokenStore};

use crate::common::http_client;

/// Tokens expiring within this window are refreshed before being handed out
const REFRESH_MARGIN: time::Duration = time::Duration::seconds(60);

/// SQLite-backed token store.
///
/// Stores one credential row per page. A token close to expiry is refreshed
/// with a `refresh_token` grant against the stored vendor token endpoint
/// before being returned; the refreshed credential replaces the row.
pub struct SqliteTokenStore {
    pool: SqlitePool,
    http: reqwest::Client,
}

impl SqliteTokenStore {
    /// Open (and initialize if needed) a token database at the given path
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, TokenError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TokenError::Store(format!("Failed to create directory: {}", e)))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| TokenError::Store(e.to_string()))?;

        let store = Self {
            pool,
            http: http_client(),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub async fn in_memory() -> Result<Self, TokenError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| TokenError::Store(e.to_string()))?;

        let store = Self {
            pool,
            http: http_client(),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), TokenError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS page_tokens (
                page_id TEXT PRIMARY KEY,
                access_token TEXT NOT NULL,
                expires_at TEXT,
                refresh_token TEXT,
                token_url TEXT,
                client_id TEXT,
                client_secret TEXT,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| TokenError::Store(e.to_string()))?;

        Ok(())
    }

    async fn load(&self, page_id: &str) -> Result<StoredToken, TokenError> {
        type Row = (
            String,
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
        );
        let row: Option<Row> = sqlx::query_as(
            r#"
            SELECT page_id, access_token, expires_at, refresh_token, token_url,
                   client_id, client_secret
            FROM page_tokens WHERE page_id = ?
            "#,
        )
        .bind(page_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TokenError::Store(e.to_string()))?;

        let (page_id, access_token, expires_at, refresh_token, token_url, client_id, client_secret) =
            row.ok_or_else(|| TokenError::NotFound(page_id.to_string()))?;

        let expires_at = match expires_at {
            Some(raw) => Some(
                OffsetDateTime::parse(&raw, &time::format_description::well_known::Rfc3339)
                    .map_err(|e| TokenError::Store(e.to_string()))?,
            ),
            None => None,
        };

        Ok(StoredToken {
            page_id,
            access_token,
            expires_at,
            refresh_token,
            token_url,
            client_id,
            client_secret,
        })
    }

    /// Exchange the refresh token for a new access token and persist it
    async fn refresh(&self, token: &StoredToken) -> Result<StoredToken, TokenError> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| TokenError::Refresh("no refresh token stored".to_string()))?;
        let token_url = token
            .token_url
            .as_deref()
            .ok_or_else(|| TokenError::Refresh("no token endpoint stored".to_string()))?;

        tracing::info!(page = %token.page_id, "Refreshing page token");

        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        if let Some(client_id) = token.client_id.as_deref() {
            form.push(("client_id", client_id));
        }
        if let Some(client_secret) = token.client_secret.as_deref() {
            form.push(("client_secret", client_secret));
        }

        let response = self
            .http
            .post(token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| TokenError::Refresh(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::Refresh(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let grant: RefreshGrant = response
            .json()
            .await
            .map_err(|e| TokenError::Refresh(e.to_string()))?;

        let refreshed = StoredToken {
            page_id: token.page_id.clone(),
            access_token: grant.access_token,
            expires_at: grant
                .expires_in
                .map(|secs| OffsetDateTime::now_utc() + time::Duration::seconds(secs)),
            // Vendors may rotate the refresh token on use
            refresh_token: grant.refresh_token.or_else(|| token.refresh_token.clone()),
            token_url: token.token_url.clone(),
            client_id: token.client_id.clone(),
            client_secret: token.client_secret.clone(),
        };

        self.put_token(&refreshed).await?;
        Ok(refreshed)
    }
}

#[derive(Deserialize)]
struct RefreshGrant {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn get_secure_token(&self, page_id: &str) -> Result<SecretString, TokenError> {
        let token = self.load(page_id).await?;

        let needs_refresh = token
            .expires_at
            .map(|at| at - REFRESH_MARGIN <= OffsetDateTime::now_utc())
            .unwrap_or(false);

        if needs_refresh {
            let refreshed = self.refresh(&token).await?;
            return Ok(SecretString::new(refreshed.access_token.into()));
        }

        Ok(SecretString::new(token.access_token.into()))
    }

    async fn put_token(&self, token: &StoredToken) -> Result<(), TokenError> {
        let expires_at = match token.expires_at {
            Some(at) => Some(
                at.format(&time::format_description::well_known::Rfc3339)
                    .map_err(|e| TokenError::Store(e.to_string()))?,
            ),
            None => None,
        };
        let updated_at = OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .map_err(|e| TokenError::Store(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO page_tokens
            (page_id, access_token, expires_at, refresh_token, token_url,
             client_id, client_secret, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(page_id) DO UPDATE SET
                access_token = excluded.access_token,
                expires_at = excluded.expires_at,
                refresh_token = excluded.refresh_token,
                token_url = excluded.token_url,
                client_id = excluded.client_id,
                client_secret = excluded.client_secret,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&token.page_id)
        .bind(&token.access_token)
        .bind(&expires_at)
        .bind(&token.refresh_token)
        .bind(&token.token_url)
        .bind(&token.client_id)
        .bind(&token.client_secret)
        .bind(&updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| TokenError::Store(e.to_string()))?;

        Ok(())
    }

    async fn remove_token(&self, page_id: &str) -> Result<(), TokenError> {
        sqlx::query("DELETE FROM page_tokens WHERE page_id = ?")
            .bind(page_id)
            .execute(&self.pool)
            .await
            .map_err(|e| TokenError::Store(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fresh_token(page_id: &str) -> StoredToken {
        StoredToken {
            page_id: page_id.to_string(),
            access_token: "fresh-token".to_string(),
            expires_at: Some(OffsetDateTime::now_utc() + time::Duration::hours(1)),
            refresh_token: None,
            token_url: None,
            client_id: None,
            client_secret: None,
        }
    }

    #[tokio::test]
    async fn token_roundtrip() {
        let store = SqliteTokenStore::in_memory().await.unwrap();
        store.put_token(&fresh_token("p1")).await.unwrap();

        let token = store.get_secure_token("p1").await.unwrap();
        assert_eq!(token.expose_secret(), "fresh-token");
    }

    #[tokio::test]
    async fn missing_token_is_not_found() {
        let store = SqliteTokenStore::in_memory().await.unwrap();
        let result = store.get_secure_token("unknown").await;
        assert!(matches!(result, Err(TokenError::NotFound(_))));
    }

    #[tokio::test]
    async fn expiring_token_is_refreshed_first() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "rotated-token",
                "expires_in": 3600,
                "refresh_token": "refresh-2"
            })))
            .mount(&server)
            .await;

        let store = SqliteTokenStore::in_memory().await.unwrap();
        store
            .put_token(&StoredToken {
                page_id: "p1".to_string(),
                access_token: "stale-token".to_string(),
                expires_at: Some(OffsetDateTime::now_utc() + time::Duration::seconds(10)),
                refresh_token: Some("refresh-1".to_string()),
                token_url: Some(format!("{}/oauth/token", server.uri())),
                client_id: Some("cid".to_string()),
                client_secret: Some("sec".to_string()),
            })
            .await
            .unwrap();

        let token = store.get_secure_token("p1").await.unwrap();
        assert_eq!(token.expose_secret(), "rotated-token");

        // Rotated refresh token persisted for the next cycle
        let stored = store.load("p1").await.unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn expired_token_without_refresh_path_errors() {
        let store = SqliteTokenStore::in_memory().await.unwrap();
        store
            .put_token(&StoredToken {
                page_id: "p1".to_string(),
                access_token: "stale".to_string(),
                expires_at: Some(OffsetDateTime::now_utc() - time::Duration::minutes(1)),
                refresh_token: None,
                token_url: None,
                client_id: None,
                client_secret: None,
            })
            .await
            .unwrap();

        let result = store.get_secure_token("p1").await;
        assert!(matches!(result, Err(TokenError::Refresh(_))));
    }

    #[tokio::test]
    async fn remove_forgets_the_token() {
        let store = SqliteTokenStore::in_memory().await.unwrap();
        store.put_token(&fresh_token("p1")).await.unwrap();
        store.remove_token("p1").await.unwrap();
        assert!(store.get_secure_token("p1").await.is_err());
    }
}
