use async_trait::async_trait;
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::OAuthError;
use crate::models::{Grant, OAuthClient};

/// Persistence contract for registered OAuth clients.
#[async_trait]
pub trait OAuthClientRepository: Send + Sync {
    async fn create(
        &self,
        user_id: Uuid,
        name: &str,
        secret_hash: &str,
        redirect_uris: &[String],
        grants: &[Grant],
        scope: Option<&str>,
        is_public: bool,
    ) -> Result<OAuthClient, OAuthError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OAuthClient>, OAuthError>;

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<OAuthClient>, OAuthError>;

    #[allow(clippy::too_many_arguments)]
    async fn update(
        &self,
        id: Uuid,
        name: &str,
        redirect_uris: &[String],
        grants: &[Grant],
        scope: Option<&str>,
        is_public: bool,
    ) -> Result<OAuthClient, OAuthError>;

    async fn delete(&self, id: Uuid) -> Result<(), OAuthError>;
}

#[derive(Clone)]
pub struct SqlOAuthClientRepository {
    pool: MySqlPool,
}

impl SqlOAuthClientRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OAuthClientRepository for SqlOAuthClientRepository {
    async fn create(
        &self,
        user_id: Uuid,
        name: &str,
        secret_hash: &str,
        redirect_uris: &[String],
        grants: &[Grant],
        scope: Option<&str>,
        is_public: bool,
    ) -> Result<OAuthClient, OAuthError> {
        let id = Uuid::new_v4();
        let redirect_uris_json = serde_json::to_value(redirect_uris)
            .map_err(|e| OAuthError::StoreError(format!("failed to serialize redirect_uris: {e}")))?;
        let grants_json = OAuthClient::grants_json(grants);

        sqlx::query(
            r#"
            INSERT INTO oauth_clients
                (id, user_id, name, secret_hash, redirect_uris, grants, scope, is_public)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(name)
        .bind(secret_hash)
        .bind(&redirect_uris_json)
        .bind(&grants_json)
        .bind(scope)
        .bind(is_public)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| OAuthError::StoreError("failed to fetch created client".into()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OAuthClient>, OAuthError> {
        let client = sqlx::query_as::<_, OAuthClient>(
            r#"
            SELECT id, user_id, name, secret_hash, redirect_uris, grants, scope, is_public,
                   created_at, updated_at
            FROM oauth_clients
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(client)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<OAuthClient>, OAuthError> {
        let clients = sqlx::query_as::<_, OAuthClient>(
            r#"
            SELECT id, user_id, name, secret_hash, redirect_uris, grants, scope, is_public,
                   created_at, updated_at
            FROM oauth_clients
            WHERE user_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }

    async fn update(
        &self,
        id: Uuid,
        name: &str,
        redirect_uris: &[String],
        grants: &[Grant],
        scope: Option<&str>,
        is_public: bool,
    ) -> Result<OAuthClient, OAuthError> {
        let redirect_uris_json = serde_json::to_value(redirect_uris)
            .map_err(|e| OAuthError::StoreError(format!("failed to serialize redirect_uris: {e}")))?;
        let grants_json = OAuthClient::grants_json(grants);

        let result = sqlx::query(
            r#"
            UPDATE oauth_clients
            SET name = ?, redirect_uris = ?, grants = ?, scope = ?, is_public = ?
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(&redirect_uris_json)
        .bind(&grants_json)
        .bind(scope)
        .bind(is_public)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OAuthError::InvalidClient);
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| OAuthError::StoreError("failed to fetch updated client".into()))
    }

    async fn delete(&self, id: Uuid) -> Result<(), OAuthError> {
        let result = sqlx::query("DELETE FROM oauth_clients WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(OAuthError::InvalidClient);
        }
        Ok(())
    }
}
