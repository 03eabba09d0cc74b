use async_trait::async_trait;
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::IdentityError;
use crate::models::{Role, User};

/// Persistence contract for local identity records.
///
/// Two implementations ship: [`SqlUserRepository`] against MySQL, and
/// [`crate::repositories::memory::MemoryStore`] for unit tests.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        email_verified: bool,
        verification_token: Option<&str>,
    ) -> Result<User, IdentityError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, IdentityError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, IdentityError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, IdentityError>;
    async fn find_by_verification_token(&self, token: &str) -> Result<Option<User>, IdentityError>;

    /// Rotate the verification token and reset `sent_at` (used on resend).
    async fn set_verification_token(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<(), IdentityError>;

    /// CAS-style transition: clears the token and flips `email_verified`.
    async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), IdentityError>;

    async fn set_role(&self, user_id: Uuid, role: Role) -> Result<(), IdentityError>;

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), IdentityError>;

    /// Marks the row deleted without removing it (§4.C); excluded from every
    /// `find_*`/`list` query thereafter.
    async fn soft_delete(&self, user_id: Uuid) -> Result<(), IdentityError>;

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, IdentityError>;
}

#[derive(Clone)]
pub struct SqlUserRepository {
    pool: MySqlPool,
}

impl SqlUserRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqlUserRepository {
    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        email_verified: bool,
        verification_token: Option<&str>,
    ) -> Result<User, IdentityError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO users
                (id, username, email, password_hash, email_verified,
                 email_verification_token, email_verification_sent_at, role)
            VALUES (?, ?, ?, ?, ?, ?, NOW(), ?)
            "#,
        )
        .bind(id.to_string())
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(email_verified)
        .bind(verification_token)
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().map(|c| c == "23000").unwrap_or(false) {
                    if db_err.message().contains("username") {
                        return IdentityError::UsernameTaken;
                    }
                    return IdentityError::EmailTaken;
                }
            }
            IdentityError::from(e)
        })?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| IdentityError::StoreError("failed to fetch created user".into()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, IdentityError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, email_verified,
                   email_verification_token, email_verification_sent_at, role,
                   created_at, updated_at, deleted_at
            FROM users
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, IdentityError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, email_verified,
                   email_verification_token, email_verification_sent_at, role,
                   created_at, updated_at, deleted_at
            FROM users
            WHERE email = ? AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, IdentityError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, email_verified,
                   email_verification_token, email_verification_sent_at, role,
                   created_at, updated_at, deleted_at
            FROM users
            WHERE username = ? AND deleted_at IS NULL
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_verification_token(&self, token: &str) -> Result<Option<User>, IdentityError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, email_verified,
                   email_verification_token, email_verification_sent_at, role,
                   created_at, updated_at, deleted_at
            FROM users
            WHERE email_verification_token = ? AND deleted_at IS NULL
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn set_verification_token(&self, user_id: Uuid, token: &str) -> Result<(), IdentityError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email_verification_token = ?, email_verification_sent_at = NOW()
            WHERE id = ?
            "#,
        )
        .bind(token)
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::StoreError("user not found".into()));
        }
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), IdentityError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email_verified = true, email_verification_token = NULL
            WHERE id = ? AND email_verified = false
            "#,
        )
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::InvalidToken);
        }
        Ok(())
    }

    async fn set_role(&self, user_id: Uuid, role: Role) -> Result<(), IdentityError> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::StoreError("user not found".into()));
        }
        Ok(())
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), IdentityError> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(password_hash)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::StoreError("user not found".into()));
        }
        Ok(())
    }

    async fn soft_delete(&self, user_id: Uuid) -> Result<(), IdentityError> {
        let result = sqlx::query("UPDATE users SET deleted_at = NOW() WHERE id = ? AND deleted_at IS NULL")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::StoreError("user not found".into()));
        }
        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, IdentityError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, email_verified,
                   email_verification_token, email_verification_sent_at, role,
                   created_at, updated_at, deleted_at
            FROM users
            WHERE deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}
