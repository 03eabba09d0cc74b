use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::OAuthError;
use crate::models::{AccessToken, RefreshToken};

pub const ACCESS_TOKEN_TTL_SECONDS: i64 = 3600;
pub const REFRESH_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 3600;

/// Persistence contract for opaque access tokens.
#[async_trait]
pub trait OAuthTokenRepository: Send + Sync {
    async fn create_access_token(
        &self,
        client_id: Uuid,
        user_id: Uuid,
        token_hash: &str,
        scope: &str,
    ) -> Result<AccessToken, OAuthError>;

    async fn find_access_token_by_hash(&self, token_hash: &str) -> Result<Option<AccessToken>, OAuthError>;

    async fn create_refresh_token(
        &self,
        access_token_id: Uuid,
        client_id: Uuid,
        user_id: Uuid,
        token_hash: &str,
        scope: &str,
    ) -> Result<RefreshToken, OAuthError>;

    async fn find_refresh_token_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, OAuthError>;

    /// CAS-style: marks the refresh token consumed so it cannot be replayed (§4.E, §9).
    async fn revoke_refresh_token(&self, id: Uuid) -> Result<(), OAuthError>;

    /// SSO heuristic (§4.E "has-refresh-token"): true iff any unexpired refresh
    /// token binds this user to this client.
    async fn has_unexpired_refresh_token(&self, user_id: Uuid, client_id: Uuid) -> Result<bool, OAuthError>;

    /// Sweeps rows with `expires_at < now` from both token tables; returns the
    /// number of rows removed (§4.C).
    async fn delete_expired(&self) -> Result<u64, OAuthError>;
}

#[derive(Clone)]
pub struct SqlOAuthTokenRepository {
    pool: MySqlPool,
}

impl SqlOAuthTokenRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OAuthTokenRepository for SqlOAuthTokenRepository {
    async fn create_access_token(
        &self,
        client_id: Uuid,
        user_id: Uuid,
        token_hash: &str,
        scope: &str,
    ) -> Result<AccessToken, OAuthError> {
        let id = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::seconds(ACCESS_TOKEN_TTL_SECONDS);

        sqlx::query(
            r#"
            INSERT INTO oauth_access_tokens (id, client_id, user_id, token_hash, scope, expires_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(client_id.to_string())
        .bind(user_id.to_string())
        .bind(token_hash)
        .bind(scope)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        self.find_access_token_by_hash(token_hash)
            .await?
            .ok_or_else(|| OAuthError::StoreError("failed to fetch created access token".into()))
    }

    async fn find_access_token_by_hash(&self, token_hash: &str) -> Result<Option<AccessToken>, OAuthError> {
        let token = sqlx::query_as::<_, AccessToken>(
            r#"
            SELECT id, client_id, user_id, token_hash, scope, expires_at, created_at
            FROM oauth_access_tokens
            WHERE token_hash = ?
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    async fn create_refresh_token(
        &self,
        access_token_id: Uuid,
        client_id: Uuid,
        user_id: Uuid,
        token_hash: &str,
        scope: &str,
    ) -> Result<RefreshToken, OAuthError> {
        let id = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::seconds(REFRESH_TOKEN_TTL_SECONDS);

        sqlx::query(
            r#"
            INSERT INTO oauth_refresh_tokens
                (id, access_token_id, client_id, user_id, token_hash, scope, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(access_token_id.to_string())
        .bind(client_id.to_string())
        .bind(user_id.to_string())
        .bind(token_hash)
        .bind(scope)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        self.find_refresh_token_by_hash(token_hash)
            .await?
            .ok_or_else(|| OAuthError::StoreError("failed to fetch created refresh token".into()))
    }

    async fn find_refresh_token_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, OAuthError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, access_token_id, client_id, user_id, token_hash, scope, expires_at, revoked, created_at
            FROM oauth_refresh_tokens
            WHERE token_hash = ?
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    async fn revoke_refresh_token(&self, id: Uuid) -> Result<(), OAuthError> {
        let result = sqlx::query(
            r#"
            UPDATE oauth_refresh_tokens
            SET revoked = true
            WHERE id = ? AND revoked = false
            "#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OAuthError::InvalidGrant);
        }

        Ok(())
    }

    async fn has_unexpired_refresh_token(&self, user_id: Uuid, client_id: Uuid) -> Result<bool, OAuthError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM oauth_refresh_tokens
            WHERE user_id = ? AND client_id = ? AND revoked = false AND expires_at > NOW()
            "#,
        )
        .bind(user_id.to_string())
        .bind(client_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn delete_expired(&self) -> Result<u64, OAuthError> {
        let refresh = sqlx::query("DELETE FROM oauth_refresh_tokens WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;

        // An access token is only removable once nothing (live or expired)
        // still references it; the refresh token's own TTL usually outlives
        // the access token's, so this mostly fires well after the access
        // token itself expired.
        let access = sqlx::query(
            r#"
            DELETE FROM oauth_access_tokens
            WHERE expires_at < NOW()
              AND id NOT IN (SELECT access_token_id FROM oauth_refresh_tokens)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(refresh.rows_affected() + access.rows_affected())
    }
}
