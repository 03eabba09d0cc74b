//! In-memory repository implementations, used by service-layer unit tests
//! in place of the SQL-backed repositories (§4.C, §9).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::{IdentityError, OAuthError};
use crate::models::{AccessToken, AuthorizationCode, Grant, OAuthClient, RefreshToken, Role, User};
use crate::repositories::authorization_code::{AuthorizationCodeRepository, MAX_CODE_TTL_SECONDS};
use crate::repositories::oauth_client::OAuthClientRepository;
use crate::repositories::oauth_token::{
    OAuthTokenRepository, ACCESS_TOKEN_TTL_SECONDS, REFRESH_TOKEN_TTL_SECONDS,
};
use crate::repositories::user::UserRepository;

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    clients: HashMap<Uuid, OAuthClient>,
    codes: HashMap<Uuid, AuthorizationCode>,
    access_tokens: HashMap<Uuid, AccessToken>,
    refresh_tokens: HashMap<Uuid, RefreshToken>,
}

/// A single `Mutex`-guarded store implementing every repository trait, for
/// tests that need a full, fast, disposable backend (§4.C).
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        email_verified: bool,
        verification_token: Option<&str>,
    ) -> Result<User, IdentityError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.users.values().any(|u| u.username == username) {
            return Err(IdentityError::UsernameTaken);
        }
        if inner.users.values().any(|u| u.email == email) {
            return Err(IdentityError::EmailTaken);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            email_verified,
            email_verification_token: verification_token.map(|t| t.to_string()),
            email_verification_sent_at: Some(now),
            role,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, IdentityError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .get(&id)
            .filter(|u| u.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, IdentityError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.email == email && u.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, IdentityError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.username == username && u.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_verification_token(&self, token: &str) -> Result<Option<User>, IdentityError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.email_verification_token.as_deref() == Some(token) && u.deleted_at.is_none())
            .cloned())
    }

    async fn set_verification_token(&self, user_id: Uuid, token: &str) -> Result<(), IdentityError> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| IdentityError::StoreError("user not found".into()))?;
        user.email_verification_token = Some(token.to_string());
        user.email_verification_sent_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), IdentityError> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or(IdentityError::InvalidToken)?;
        if user.email_verified {
            return Err(IdentityError::InvalidToken);
        }
        user.email_verified = true;
        user.email_verification_token = None;
        Ok(())
    }

    async fn set_role(&self, user_id: Uuid, role: Role) -> Result<(), IdentityError> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| IdentityError::StoreError("user not found".into()))?;
        user.role = role;
        Ok(())
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), IdentityError> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| IdentityError::StoreError("user not found".into()))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn soft_delete(&self, user_id: Uuid) -> Result<(), IdentityError> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| IdentityError::StoreError("user not found".into()))?;
        user.deleted_at = Some(Utc::now());
        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, IdentityError> {
        let inner = self.inner.lock().unwrap();
        let mut users: Vec<User> = inner.users.values().filter(|u| u.deleted_at.is_none()).cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users.into_iter().skip(offset.max(0) as usize).take(limit.max(0) as usize).collect())
    }
}

#[async_trait]
impl OAuthClientRepository for MemoryStore {
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
        let now = Utc::now();
        let client = OAuthClient {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            secret_hash: secret_hash.to_string(),
            redirect_uris: redirect_uris.to_vec(),
            grants: grants.to_vec(),
            scope: scope.map(|s| s.to_string()),
            is_public,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().unwrap().clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OAuthClient>, OAuthError> {
        Ok(self.inner.lock().unwrap().clients.get(&id).cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<OAuthClient>, OAuthError> {
        let inner = self.inner.lock().unwrap();
        let mut clients: Vec<OAuthClient> =
            inner.clients.values().filter(|c| c.user_id == user_id).cloned().collect();
        clients.sort_by(|a, b| b.created_at.cmp(&a.created_at));
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
        let mut inner = self.inner.lock().unwrap();
        let client = inner.clients.get_mut(&id).ok_or(OAuthError::InvalidClient)?;
        client.name = name.to_string();
        client.redirect_uris = redirect_uris.to_vec();
        client.grants = grants.to_vec();
        client.scope = scope.map(|s| s.to_string());
        client.is_public = is_public;
        client.updated_at = Utc::now();
        Ok(client.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), OAuthError> {
        self.inner
            .lock()
            .unwrap()
            .clients
            .remove(&id)
            .ok_or(OAuthError::InvalidClient)?;
        Ok(())
    }
}

#[async_trait]
impl AuthorizationCodeRepository for MemoryStore {
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
        let now = Utc::now();
        let code = AuthorizationCode {
            id: Uuid::new_v4(),
            code_hash: code_hash.to_string(),
            client_id,
            user_id,
            redirect_uri: redirect_uri.to_string(),
            scope: scope.to_string(),
            code_challenge: code_challenge.map(|c| c.to_string()),
            code_challenge_method: code_challenge_method.map(|c| c.to_string()),
            nonce: nonce.map(|n| n.to_string()),
            expires_at: now + Duration::seconds(MAX_CODE_TTL_SECONDS),
            used: false,
            created_at: now,
        };
        self.inner.lock().unwrap().codes.insert(code.id, code.clone());
        Ok(code)
    }

    async fn find_by_code_hash(&self, code_hash: &str) -> Result<Option<AuthorizationCode>, OAuthError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .codes
            .values()
            .find(|c| c.code_hash == code_hash)
            .cloned())
    }

    async fn mark_used(&self, id: Uuid) -> Result<(), OAuthError> {
        let mut inner = self.inner.lock().unwrap();
        let code = inner.codes.get_mut(&id).ok_or(OAuthError::CodeAlreadyUsed)?;
        if code.used {
            return Err(OAuthError::CodeAlreadyUsed);
        }
        code.used = true;
        Ok(())
    }
}

#[async_trait]
impl OAuthTokenRepository for MemoryStore {
    async fn create_access_token(
        &self,
        client_id: Uuid,
        user_id: Uuid,
        token_hash: &str,
        scope: &str,
    ) -> Result<AccessToken, OAuthError> {
        let now = Utc::now();
        let token = AccessToken {
            id: Uuid::new_v4(),
            client_id,
            user_id,
            token_hash: token_hash.to_string(),
            scope: scope.to_string(),
            expires_at: now + Duration::seconds(ACCESS_TOKEN_TTL_SECONDS),
            created_at: now,
        };
        self.inner
            .lock()
            .unwrap()
            .access_tokens
            .insert(token.id, token.clone());
        Ok(token)
    }

    async fn find_access_token_by_hash(&self, token_hash: &str) -> Result<Option<AccessToken>, OAuthError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .access_tokens
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn create_refresh_token(
        &self,
        access_token_id: Uuid,
        client_id: Uuid,
        user_id: Uuid,
        token_hash: &str,
        scope: &str,
    ) -> Result<RefreshToken, OAuthError> {
        let now = Utc::now();
        let token = RefreshToken {
            id: Uuid::new_v4(),
            access_token_id,
            client_id,
            user_id,
            token_hash: token_hash.to_string(),
            scope: scope.to_string(),
            expires_at: now + Duration::seconds(REFRESH_TOKEN_TTL_SECONDS),
            revoked: false,
            created_at: now,
        };
        self.inner
            .lock()
            .unwrap()
            .refresh_tokens
            .insert(token.id, token.clone());
        Ok(token)
    }

    async fn find_refresh_token_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, OAuthError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .refresh_tokens
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn revoke_refresh_token(&self, id: Uuid) -> Result<(), OAuthError> {
        let mut inner = self.inner.lock().unwrap();
        let token = inner.refresh_tokens.get_mut(&id).ok_or(OAuthError::InvalidGrant)?;
        if token.revoked {
            return Err(OAuthError::InvalidGrant);
        }
        token.revoked = true;
        Ok(())
    }

    async fn has_unexpired_refresh_token(&self, user_id: Uuid, client_id: Uuid) -> Result<bool, OAuthError> {
        let now = Utc::now();
        Ok(self
            .inner
            .lock()
            .unwrap()
            .refresh_tokens
            .values()
            .any(|t| t.user_id == user_id && t.client_id == client_id && !t.revoked && t.expires_at > now))
    }

    async fn delete_expired(&self) -> Result<u64, OAuthError> {
        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap();

        let before = inner.refresh_tokens.len();
        inner.refresh_tokens.retain(|_, t| t.expires_at >= now);
        let refresh_removed = before - inner.refresh_tokens.len();

        let live_access_ids: std::collections::HashSet<Uuid> =
            inner.refresh_tokens.values().map(|t| t.access_token_id).collect();
        let before = inner.access_tokens.len();
        inner
            .access_tokens
            .retain(|id, t| t.expires_at >= now || live_access_ids.contains(id));
        let access_removed = before - inner.access_tokens.len();

        Ok((refresh_removed + access_removed) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn make_user(store: &MemoryStore) -> User {
        UserRepository::create(store, "bob", "bob@example.com", "hash", Role::User, true, None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_update_password() {
        let store = MemoryStore::new();
        let user = make_user(&store).await;
        UserRepository::update_password(&store, user.id, "new-hash").await.unwrap();
        let updated = UserRepository::find_by_id(&store, user.id).await.unwrap().unwrap();
        assert_eq!(updated.password_hash, "new-hash");
    }

    #[tokio::test]
    async fn test_soft_delete_excludes_from_lookups() {
        let store = MemoryStore::new();
        let user = make_user(&store).await;
        UserRepository::soft_delete(&store, user.id).await.unwrap();

        assert!(UserRepository::find_by_id(&store, user.id).await.unwrap().is_none());
        assert!(UserRepository::find_by_email(&store, "bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_users_paginated_and_excludes_deleted() {
        let store = MemoryStore::new();
        let a = UserRepository::create(&store, "a", "a@example.com", "h", Role::User, true, None)
            .await
            .unwrap();
        UserRepository::create(&store, "b", "b@example.com", "h", Role::User, true, None)
            .await
            .unwrap();
        UserRepository::soft_delete(&store, a.id).await.unwrap();

        let page = UserRepository::list(&store, 10, 0).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].username, "b");
    }

    async fn make_client(store: &MemoryStore, user_id: Uuid) -> OAuthClient {
        OAuthClientRepository::create(
            store,
            user_id,
            "test client",
            "secret-hash",
            &["https://client.example.com/cb".to_string()],
            &[Grant::AuthorizationCode],
            None,
            false,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_client_update_and_list_by_user() {
        let store = MemoryStore::new();
        let user = make_user(&store).await;
        let client = make_client(&store, user.id).await;

        let updated = OAuthClientRepository::update(
            &store,
            client.id,
            "renamed",
            &["https://client.example.com/cb2".to_string()],
            &[Grant::AuthorizationCode, Grant::RefreshToken],
            Some("openid"),
            true,
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "renamed");
        assert!(updated.is_public);

        let owned = OAuthClientRepository::list_by_user(&store, user.id).await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].id, client.id);
    }

    #[tokio::test]
    async fn test_client_delete() {
        let store = MemoryStore::new();
        let user = make_user(&store).await;
        let client = make_client(&store, user.id).await;

        OAuthClientRepository::delete(&store, client.id).await.unwrap();
        assert!(OAuthClientRepository::find_by_id(&store, client.id).await.unwrap().is_none());
        assert!(matches!(
            OAuthClientRepository::delete(&store, client.id).await.unwrap_err(),
            OAuthError::InvalidClient
        ));
    }

    #[tokio::test]
    async fn test_delete_expired_tokens_keeps_live_refresh_chain() {
        let store = MemoryStore::new();
        let user = make_user(&store).await;
        let client = make_client(&store, user.id).await;

        let live_access = store
            .create_access_token(client.id, user.id, "live-access", "profile")
            .await
            .unwrap();
        store
            .create_refresh_token(live_access.id, client.id, user.id, "live-refresh", "profile")
            .await
            .unwrap();

        let expired_access = store
            .create_access_token(client.id, user.id, "expired-access", "profile")
            .await
            .unwrap();
        {
            let mut inner = store.inner.lock().unwrap();
            inner.access_tokens.get_mut(&expired_access.id).unwrap().expires_at = Utc::now() - Duration::seconds(1);
        }

        let removed = store.delete_expired().await.unwrap();
        assert_eq!(removed, 1);
        assert!(store
            .find_access_token_by_hash("expired-access")
            .await
            .unwrap()
            .is_none());
        assert!(store.find_access_token_by_hash("live-access").await.unwrap().is_some());
    }
}
