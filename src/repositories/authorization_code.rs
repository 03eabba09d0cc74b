use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::OAuthError;
use crate::models::AuthorizationCode;

/// TTL cap, enforced server-side regardless of what the caller asks for (§4.A/§4.E).
pub const MAX_CODE_TTL_SECONDS: i64 = 600;

/// Persistence contract for authorization codes.
///
/// `mark_used` is a CAS: it only ever flips one waiting redeemer to success,
/// per the state machine in §4.E.
#[async_trait]
pub trait AuthorizationCodeRepository: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn create(
        &self,
        code_hash: &str,
        client_id: Uuid,
        user_id: Uuid,
        redirect_uri: &str,
        scope: &str,
        code_challenge: Option<&str>,
        code_challenge_method: Option<&str>,
        nonce: Option<&str>,
    ) -> Result<AuthorizationCode, OAuthError>;

    async fn find_by_code_hash(&self, code_hash: &str) -> Result<Option<AuthorizationCode>, OAuthError>;
    async fn mark_used(&self, id: Uuid) -> Result<(), OAuthError>;
}

#[derive(Clone)]
pub struct SqlAuthorizationCodeRepository {
    pool: MySqlPool,
}

impl SqlAuthorizationCodeRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthorizationCodeRepository for SqlAuthorizationCodeRepository {
    async fn create(
        &self,
        code_hash: &str,
        client_id: Uuid,
        user_id: Uuid,
        redirect_uri: &str,
        scope: &str,
        code_challenge: Option<&str>,
        code_challenge_method: Option<&str>,
        nonce: Option<&str>,
    ) -> Result<AuthorizationCode, OAuthError> {
        let id = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::seconds(MAX_CODE_TTL_SECONDS);

        sqlx::query(
            r#"
            INSERT INTO oauth_authorization_codes
                (id, code_hash, client_id, user_id, redirect_uri, scope,
                 code_challenge, code_challenge_method, nonce, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(code_hash)
        .bind(client_id.to_string())
        .bind(user_id.to_string())
        .bind(redirect_uri)
        .bind(scope)
        .bind(code_challenge)
        .bind(code_challenge_method)
        .bind(nonce)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        self.find_by_code_hash(code_hash)
            .await?
            .ok_or_else(|| OAuthError::StoreError("failed to fetch created authorization code".into()))
    }

    async fn find_by_code_hash(&self, code_hash: &str) -> Result<Option<AuthorizationCode>, OAuthError> {
        let code = sqlx::query_as::<_, AuthorizationCode>(
            r#"
            SELECT id, code_hash, client_id, user_id, redirect_uri, scope,
                   code_challenge, code_challenge_method, nonce, expires_at, used, created_at
            FROM oauth_authorization_codes
            WHERE code_hash = ?
            "#,
        )
        .bind(code_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(code)
    }

    async fn mark_used(&self, id: Uuid) -> Result<(), OAuthError> {
        let result = sqlx::query(
            r#"
            UPDATE oauth_authorization_codes
            SET used = true
            WHERE id = ? AND used = false
            "#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OAuthError::CodeAlreadyUsed);
        }

        Ok(())
    }
}
