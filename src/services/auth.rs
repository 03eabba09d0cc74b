use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::config::Mailer;
use crate::error::IdentityError;
use crate::models::{Role, User};
use crate::repositories::UserRepository;
use crate::utils::email::validate_email;
use crate::utils::jwt::JwtManager;
use crate::utils::password::{hash_password, validate_password_policy, verify_password};
use crate::utils::secret::random_token;

/// Verification tokens and the login-resend cooldown share this window (§4.D).
const VERIFICATION_WINDOW: Duration = Duration::minutes(3);

const MIN_USERNAME_LENGTH: usize = 3;

#[derive(Debug)]
pub enum RegisterOutcome {
    Created(User),
    VerificationResent,
}

/// Identity Service: registration, email verification, login, admin
/// bootstrap (§4.D).
#[derive(Clone)]
pub struct IdentityService {
    user_repo: Arc<dyn UserRepository>,
    jwt_manager: JwtManager,
    mailer: Arc<Mailer>,
    is_production: bool,
}

impl IdentityService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        jwt_manager: JwtManager,
        mailer: Arc<Mailer>,
        is_production: bool,
    ) -> Self {
        Self {
            user_repo,
            jwt_manager,
            mailer,
            is_production,
        }
    }

    /// Idempotent admin bootstrap, run once before the listener accepts
    /// requests (§4.D, Property 10).
    pub async fn bootstrap_admin(&self, email: &str, password: &str) -> Result<(), IdentityError> {
        match self.user_repo.find_by_email(email).await? {
            None => {
                let password_hash = hash_password(password)?;
                let username = email.split('@').next().unwrap_or("admin").to_string();
                self.user_repo
                    .create(&username, email, &password_hash, Role::Admin, true, None)
                    .await?;
            }
            Some(user) if !matches!(user.role, Role::Admin) => {
                self.user_repo.set_role(user.id, Role::Admin).await?;
            }
            Some(_) => {}
        }
        Ok(())
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisterOutcome, IdentityError> {
        if username.chars().count() < MIN_USERNAME_LENGTH {
            return Err(IdentityError::WeakPassword);
        }
        validate_email(email)?;
        validate_password_policy(password)?;

        if self.user_repo.find_by_username(username).await?.is_some() {
            return Err(IdentityError::UsernameTaken);
        }

        if let Some(existing) = self.user_repo.find_by_email(email).await? {
            if existing.email_verified {
                return Err(IdentityError::EmailTaken);
            }

            let sent_at = existing.email_verification_sent_at.unwrap_or_else(Utc::now);
            if Utc::now() - sent_at < VERIFICATION_WINDOW {
                return Err(IdentityError::TooSoon);
            }

            let token = random_token(32);
            self.user_repo.set_verification_token(existing.id, &token).await?;
            self.send_verification(email, &token).await;
            return Ok(RegisterOutcome::VerificationResent);
        }

        let password_hash = hash_password(password)?;
        let token = random_token(32);
        let auto_verify = !self.is_production;

        let user = self
            .user_repo
            .create(
                username,
                email,
                &password_hash,
                Role::User,
                auto_verify,
                if auto_verify { None } else { Some(&token) },
            )
            .await?;

        if !auto_verify {
            self.send_verification(email, &token).await;
        }

        Ok(RegisterOutcome::Created(user))
    }

    async fn send_verification(&self, email: &str, token: &str) {
        self.mailer.send_email_verification(email, token).await;
    }

    pub async fn verify_email(&self, token: &str) -> Result<(), IdentityError> {
        let user = self
            .user_repo
            .find_by_verification_token(token)
            .await?
            .ok_or(IdentityError::InvalidToken)?;

        let sent_at = user.email_verification_sent_at.unwrap_or_else(Utc::now);
        if Utc::now() - sent_at > VERIFICATION_WINDOW {
            return Err(IdentityError::ExpiredToken);
        }

        self.user_repo.mark_email_verified(user.id).await
    }

    /// Look up a user by email, falling back to username, and resend the
    /// verification token on cooldown elapse before signalling unverified
    /// (§4.D).
    pub async fn login(&self, identifier: &str, password: &str) -> Result<String, IdentityError> {
        let user = match self.user_repo.find_by_email(identifier).await? {
            Some(u) => Some(u),
            None => self.user_repo.find_by_username(identifier).await?,
        };

        let Some(user) = user else {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            return Err(IdentityError::InvalidCredentials);
        };

        if !user.email_verified {
            let sent_at = user.email_verification_sent_at.unwrap_or_else(Utc::now);
            if Utc::now() - sent_at >= VERIFICATION_WINDOW {
                let token = random_token(32);
                if self
                    .user_repo
                    .set_verification_token(user.id, &token)
                    .await
                    .is_ok()
                {
                    self.send_verification(&user.email, &token).await;
                }
            }
            return Err(IdentityError::EmailNotVerified);
        }

        if !verify_password(password, &user.password_hash)? {
            return Err(IdentityError::InvalidCredentials);
        }

        self.jwt_manager.issue_session_token(user.id, user.role.as_str())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, IdentityError> {
        self.user_repo.find_by_id(id).await
    }
}
