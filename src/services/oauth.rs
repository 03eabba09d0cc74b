//! OAuth Protocol Engine: authorize, consent, token grants, introspection,
//! revocation (§4.E).

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::dto::oauth::{ApproveRequest, AuthorizeQuery, IntrospectResponse, TokenResponse, UserInfoResponse};
use crate::error::OAuthError;
use crate::models::OAuthClient;
use crate::repositories::{
    AuthorizationCodeRepository, OAuthClientRepository, OAuthTokenRepository, UserRepository,
};
use crate::utils::jwt::JwtManager;
use crate::utils::pkce::{verify_pkce, PKCE_METHOD_PLAIN, PKCE_METHOD_S256};
use crate::utils::secret::{hash_oauth_token, random_token, verify_secret};

pub const ACCESS_TOKEN_BYTES: usize = 32;
pub const REFRESH_TOKEN_BYTES: usize = 32;

#[derive(Debug)]
pub enum AuthorizeOutcome {
    LoginRequired,
    Redirect(String),
}

#[derive(Clone)]
pub struct OAuthService {
    client_repo: Arc<dyn OAuthClientRepository>,
    code_repo: Arc<dyn AuthorizationCodeRepository>,
    token_repo: Arc<dyn OAuthTokenRepository>,
    user_repo: Arc<dyn UserRepository>,
    jwt_manager: JwtManager,
    issuer_url: String,
    public_clients_may_omit_secret: bool,
}

impl OAuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client_repo: Arc<dyn OAuthClientRepository>,
        code_repo: Arc<dyn AuthorizationCodeRepository>,
        token_repo: Arc<dyn OAuthTokenRepository>,
        user_repo: Arc<dyn UserRepository>,
        jwt_manager: JwtManager,
        issuer_url: String,
        public_clients_may_omit_secret: bool,
    ) -> Self {
        Self {
            client_repo,
            code_repo,
            token_repo,
            user_repo,
            jwt_manager,
            issuer_url,
            public_clients_may_omit_secret,
        }
    }

    async fn load_client(&self, client_id: &str) -> Result<OAuthClient, OAuthError> {
        let id = Uuid::parse_str(client_id).map_err(|_| OAuthError::InvalidClient)?;
        self.client_repo.find_by_id(id).await?.ok_or(OAuthError::InvalidClient)
    }

    /// Authorize (front channel, §4.E). `user_id` is `None` when the caller
    /// has not authenticated yet.
    pub async fn authorize(
        &self,
        query: &AuthorizeQuery,
        user_id: Option<Uuid>,
    ) -> Result<AuthorizeOutcome, OAuthError> {
        let client = self.load_client(&query.client_id).await?;

        if !client.has_redirect_uri(&query.redirect_uri) {
            return Err(OAuthError::InvalidRedirectURI);
        }

        let Some(user_id) = user_id else {
            return Ok(AuthorizeOutcome::LoginRequired);
        };

        if query.response_type != "code" {
            return Err(OAuthError::UnsupportedResponseType);
        }

        let scope = query.scope.clone().unwrap_or_default();
        let code = self
            .create_authorization_code(
                &client,
                user_id,
                &query.redirect_uri,
                &scope,
                query.code_challenge.as_deref(),
                query.code_challenge_method.as_deref(),
                query.nonce.as_deref(),
            )
            .await?;

        Ok(AuthorizeOutcome::Redirect(redirect_url(&query.redirect_uri, &code, query.state.as_deref())))
    }

    /// Authorize approval (consent step, §4.E).
    pub async fn approve(&self, req: &ApproveRequest, user_id: Uuid) -> Result<String, OAuthError> {
        if !req.approved {
            let state_part = req.state.as_deref().map(|s| format!("&state={s}")).unwrap_or_default();
            return Ok(format!("{}?error=access_denied{}", req.redirect_uri, state_part));
        }

        let client = self.load_client(&req.client_id).await?;
        if !client.has_redirect_uri(&req.redirect_uri) {
            return Err(OAuthError::InvalidRedirectURI);
        }

        let scope = req.scope.clone().unwrap_or_default();
        let code = self
            .create_authorization_code(
                &client,
                user_id,
                &req.redirect_uri,
                &scope,
                req.code_challenge.as_deref(),
                req.code_challenge_method.as_deref(),
                req.nonce.as_deref(),
            )
            .await?;

        Ok(redirect_url(&req.redirect_uri, &code, req.state.as_deref()))
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_authorization_code(
        &self,
        client: &OAuthClient,
        user_id: Uuid,
        redirect_uri: &str,
        scope: &str,
        code_challenge: Option<&str>,
        code_challenge_method: Option<&str>,
        nonce: Option<&str>,
    ) -> Result<String, OAuthError> {
        let raw_code = random_token(32);
        self.code_repo
            .create(
                &hash_oauth_token(&raw_code),
                client.id,
                user_id,
                redirect_uri,
                scope,
                code_challenge,
                code_challenge_method,
                nonce,
            )
            .await?;
        Ok(raw_code)
    }

    fn validate_pkce(code_verifier: &str, challenge: &str, method: &str) -> Result<(), OAuthError> {
        if method != PKCE_METHOD_S256 && method != PKCE_METHOD_PLAIN {
            return Err(OAuthError::UnsupportedChallengeMethod);
        }
        if !verify_pkce(code_verifier, challenge, method) {
            return Err(OAuthError::InvalidVerifier);
        }
        Ok(())
    }

    /// Token: `grant_type=authorization_code` (§4.E, 11-step algorithm).
    pub async fn token_authorization_code(
        &self,
        code: &str,
        redirect_uri: &str,
        client_id: &str,
        client_secret: Option<&str>,
        code_verifier: Option<&str>,
    ) -> Result<TokenResponse, OAuthError> {
        let client = self.load_client(client_id).await?;
        self.authenticate_client_for_code_exchange(&client, client_secret, code_verifier)?;

        let auth_code = self
            .code_repo
            .find_by_code_hash(&hash_oauth_token(code))
            .await?
            .ok_or(OAuthError::InvalidGrant)?;

        if auth_code.client_id != client.id {
            return Err(OAuthError::ClientMismatch);
        }
        if auth_code.used {
            return Err(OAuthError::CodeAlreadyUsed);
        }
        if Utc::now() >= auth_code.expires_at {
            return Err(OAuthError::CodeExpired);
        }
        if auth_code.redirect_uri != redirect_uri {
            return Err(OAuthError::RedirectMismatch);
        }

        if let Some(challenge) = &auth_code.code_challenge {
            let verifier = code_verifier.ok_or(OAuthError::InvalidVerifier)?;
            let method = auth_code.code_challenge_method.as_deref().unwrap_or(PKCE_METHOD_PLAIN);
            Self::validate_pkce(verifier, challenge, method)?;
        }

        self.code_repo.mark_used(auth_code.id).await?;

        let access_raw = random_token(ACCESS_TOKEN_BYTES);
        let access = self
            .token_repo
            .create_access_token(client.id, auth_code.user_id, &hash_oauth_token(&access_raw), &auth_code.scope)
            .await?;

        let refresh_raw = random_token(REFRESH_TOKEN_BYTES);
        self.token_repo
            .create_refresh_token(access.id, client.id, auth_code.user_id, &hash_oauth_token(&refresh_raw), &auth_code.scope)
            .await?;

        let id_token = if auth_code.scope.split_whitespace().any(|s| s == "openid") {
            let user = self.user_repo.find_by_id(auth_code.user_id).await?.ok_or(OAuthError::InvalidGrant)?;
            Some(
                self.jwt_manager
                    .issue_id_token(
                        &self.issuer_url,
                        user.id,
                        client.id,
                        auth_code.created_at,
                        auth_code.nonce.as_deref(),
                        &user.username,
                        &user.email,
                        user.email_verified,
                    )
                    .map_err(|_| OAuthError::StoreError("id token signing failed".into()))?,
            )
        } else {
            None
        };

        Ok(TokenResponse {
            access_token: access_raw,
            token_type: "Bearer".to_string(),
            expires_in: crate::repositories::oauth_token::ACCESS_TOKEN_TTL_SECONDS,
            refresh_token: refresh_raw,
            scope: auth_code.scope,
            id_token,
        })
    }

    /// §9 Open Question b: a PKCE-bearing exchange from a public client may
    /// omit `client_secret`; otherwise the secret is always required.
    fn authenticate_client_for_code_exchange(
        &self,
        client: &OAuthClient,
        client_secret: Option<&str>,
        code_verifier: Option<&str>,
    ) -> Result<(), OAuthError> {
        if code_verifier.is_some() && client.is_public && self.public_clients_may_omit_secret && client_secret.is_none() {
            return Ok(());
        }
        self.validate_client_secret(client, client_secret)
    }

    fn validate_client_secret(&self, client: &OAuthClient, secret: Option<&str>) -> Result<(), OAuthError> {
        let secret = secret.ok_or(OAuthError::InvalidClient)?;
        if verify_secret(secret, &client.secret_hash)? {
            Ok(())
        } else {
            Err(OAuthError::InvalidClient)
        }
    }

    /// Token: `grant_type=refresh_token`, with rotation (§4.E, §9 Open Question a).
    pub async fn token_refresh(
        &self,
        refresh_token: &str,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> Result<TokenResponse, OAuthError> {
        let client = self.load_client(client_id).await?;
        self.validate_client_secret(&client, client_secret)?;

        let old = self
            .token_repo
            .find_refresh_token_by_hash(&hash_oauth_token(refresh_token))
            .await?
            .ok_or(OAuthError::InvalidGrant)?;

        if old.client_id != client.id {
            return Err(OAuthError::ClientMismatch);
        }
        if old.revoked || Utc::now() >= old.expires_at {
            return Err(OAuthError::RefreshExpired);
        }

        self.token_repo.revoke_refresh_token(old.id).await?;

        let access_raw = random_token(ACCESS_TOKEN_BYTES);
        let access = self
            .token_repo
            .create_access_token(client.id, old.user_id, &hash_oauth_token(&access_raw), &old.scope)
            .await?;

        let refresh_raw = random_token(REFRESH_TOKEN_BYTES);
        self.token_repo
            .create_refresh_token(access.id, client.id, old.user_id, &hash_oauth_token(&refresh_raw), &old.scope)
            .await?;

        Ok(TokenResponse {
            access_token: access_raw,
            token_type: "Bearer".to_string(),
            expires_in: crate::repositories::oauth_token::ACCESS_TOKEN_TTL_SECONDS,
            refresh_token: refresh_raw,
            scope: old.scope,
            id_token: None,
        })
    }

    /// Introspect (§4.E).
    pub async fn introspect(
        &self,
        token: &str,
        token_type_hint: Option<&str>,
        client_id: &str,
        client_secret: &str,
    ) -> Result<IntrospectResponse, OAuthError> {
        let client = self.load_client(client_id).await?;
        self.validate_client_secret(&client, Some(client_secret))?;

        if let Some(hint) = token_type_hint {
            if hint != "access_token" {
                return Err(OAuthError::UnsupportedHint);
            }
        }

        let access = self.token_repo.find_access_token_by_hash(&hash_oauth_token(token)).await?;

        match access {
            Some(access) if access.expires_at > Utc::now() => Ok(IntrospectResponse {
                active: true,
                client_id: Some(access.client_id.to_string()),
                user_id: Some(access.user_id.to_string()),
                scope: Some(access.scope),
                token_type: Some("Bearer".to_string()),
                exp: Some(access.expires_at.timestamp()),
            }),
            _ => Ok(IntrospectResponse {
                active: false,
                client_id: None,
                user_id: None,
                scope: None,
                token_type: None,
                exp: None,
            }),
        }
    }

    /// Has-refresh-token SSO heuristic (§4.E).
    pub async fn has_refresh_token(&self, user_id: Uuid, client_id: Uuid) -> Result<bool, OAuthError> {
        self.token_repo.has_unexpired_refresh_token(user_id, client_id).await
    }

    /// GET /api/v1/oauth/userinfo, behind the opaque-token gate (§4.F).
    pub async fn userinfo(&self, access_token: &str) -> Result<UserInfoResponse, OAuthError> {
        let access = self
            .token_repo
            .find_access_token_by_hash(&hash_oauth_token(access_token))
            .await?
            .filter(|a| a.expires_at > Utc::now())
            .ok_or(OAuthError::InvalidGrant)?;

        let user = self
            .user_repo
            .find_by_id(access.user_id)
            .await
            .map_err(|e| OAuthError::StoreError(e.to_string()))?
            .ok_or(OAuthError::InvalidGrant)?;

        Ok(UserInfoResponse {
            sub: user.id.to_string(),
            email: user.email,
            email_verified: user.email_verified,
            name: user.username,
        })
    }

    /// POST /api/v1/oauth/revoke, RFC 7009-style: a matching token is
    /// revoked if found; an unknown token is not an error (no signal is
    /// leaked about whether it ever existed).
    pub async fn revoke(
        &self,
        token: &str,
        client_id: Option<&str>,
        client_secret: Option<&str>,
    ) -> Result<(), OAuthError> {
        if let Some(client_id) = client_id {
            let client = self.load_client(client_id).await?;
            self.validate_client_secret(&client, client_secret)?;
        }

        let token_hash = hash_oauth_token(token);

        if let Some(refresh) = self.token_repo.find_refresh_token_by_hash(&token_hash).await? {
            if !refresh.revoked {
                self.token_repo.revoke_refresh_token(refresh.id).await?;
            }
            return Ok(());
        }

        // Access tokens have no revocation list of their own; they simply
        // expire. Nothing further to do for an access-token lookup.
        let _ = self.token_repo.find_access_token_by_hash(&token_hash).await?;

        Ok(())
    }
}

fn redirect_url(redirect_uri: &str, code: &str, state: Option<&str>) -> String {
    match state {
        Some(state) => format!("{redirect_uri}?code={code}&state={state}"),
        None => format!("{redirect_uri}?code={code}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Grant;
    use crate::repositories::{MemoryStore, OAuthClientRepository, UserRepository};
    use crate::utils::secret::hash_secret;

    async fn setup() -> (OAuthService, Arc<MemoryStore>, OAuthClient, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let jwt = JwtManager::new("test-secret", "jiko-auth");

        let user = UserRepository::create(
            &*store,
            "alice",
            "alice@example.com",
            "hash",
            crate::models::Role::User,
            true,
            None,
        )
        .await
        .unwrap();

        let secret_hash = hash_secret("client-secret").unwrap();
        let client = OAuthClientRepository::create(
            &*store,
            user.id,
            "test client",
            &secret_hash,
            &["https://client.example.com/cb".to_string()],
            &[Grant::AuthorizationCode, Grant::RefreshToken],
            Some("openid profile email"),
            true,
        )
        .await
        .unwrap();

        let svc = OAuthService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            jwt,
            "https://auth.example.com".to_string(),
            true,
        );

        (svc, store, client, user.id)
    }

    fn base_query(client_id: &str) -> AuthorizeQuery {
        AuthorizeQuery {
            response_type: "code".to_string(),
            client_id: client_id.to_string(),
            redirect_uri: "https://client.example.com/cb".to_string(),
            scope: Some("openid".to_string()),
            state: Some("xyz".to_string()),
            code_challenge: None,
            code_challenge_method: None,
            nonce: None,
        }
    }

    fn extract_code(outcome: AuthorizeOutcome) -> String {
        match outcome {
            AuthorizeOutcome::Redirect(url) => {
                let after = url.split_once("code=").unwrap().1;
                after.split('&').next().unwrap().to_string()
            }
            _ => panic!("expected redirect"),
        }
    }

    #[tokio::test]
    async fn test_authorize_requires_login() {
        let (svc, _store, client, _user_id) = setup().await;
        let outcome = svc.authorize(&base_query(&client.id.to_string()), None).await.unwrap();
        assert!(matches!(outcome, AuthorizeOutcome::LoginRequired));
    }

    #[tokio::test]
    async fn test_authorize_rejects_unknown_redirect_uri() {
        let (svc, _store, client, user_id) = setup().await;
        let mut query = base_query(&client.id.to_string());
        query.redirect_uri = "https://evil.example.com/cb".to_string();

        let err = svc.authorize(&query, Some(user_id)).await.unwrap_err();
        assert!(matches!(err, OAuthError::InvalidRedirectURI));
    }

    #[tokio::test]
    async fn test_authorize_rejects_unknown_client() {
        let (svc, _store, _client, user_id) = setup().await;
        let query = base_query(&Uuid::new_v4().to_string());
        let err = svc.authorize(&query, Some(user_id)).await.unwrap_err();
        assert!(matches!(err, OAuthError::InvalidClient));
    }

    #[tokio::test]
    async fn test_authorize_issues_code_and_redirect() {
        let (svc, _store, client, user_id) = setup().await;
        let outcome = svc.authorize(&base_query(&client.id.to_string()), Some(user_id)).await.unwrap();
        match outcome {
            AuthorizeOutcome::Redirect(url) => {
                assert!(url.starts_with("https://client.example.com/cb?code="));
                assert!(url.contains("state=xyz"));
            }
            _ => panic!("expected redirect"),
        }
    }

    #[tokio::test]
    async fn test_token_exchange_with_client_secret() {
        let (svc, _store, client, user_id) = setup().await;
        let outcome = svc.authorize(&base_query(&client.id.to_string()), Some(user_id)).await.unwrap();
        let code = extract_code(outcome);

        let token = svc
            .token_authorization_code(&code, "https://client.example.com/cb", &client.id.to_string(), Some("client-secret"), None)
            .await
            .unwrap();

        assert!(!token.access_token.is_empty());
        assert!(token.id_token.is_some());
    }

    #[tokio::test]
    async fn test_token_exchange_rejects_reused_code() {
        let (svc, _store, client, user_id) = setup().await;
        let mut query = base_query(&client.id.to_string());
        query.scope = None;
        let outcome = svc.authorize(&query, Some(user_id)).await.unwrap();
        let code = extract_code(outcome);

        svc.token_authorization_code(&code, "https://client.example.com/cb", &client.id.to_string(), Some("client-secret"), None)
            .await
            .unwrap();

        let err = svc
            .token_authorization_code(&code, "https://client.example.com/cb", &client.id.to_string(), Some("client-secret"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::CodeAlreadyUsed));
    }

    #[tokio::test]
    async fn test_token_exchange_rejects_wrong_secret() {
        let (svc, _store, client, user_id) = setup().await;
        let outcome = svc.authorize(&base_query(&client.id.to_string()), Some(user_id)).await.unwrap();
        let code = extract_code(outcome);

        let err = svc
            .token_authorization_code(&code, "https://client.example.com/cb", &client.id.to_string(), Some("wrong-secret"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidClient));
    }

    #[tokio::test]
    async fn test_token_exchange_rejects_redirect_mismatch() {
        let (svc, _store, client, user_id) = setup().await;
        let outcome = svc.authorize(&base_query(&client.id.to_string()), Some(user_id)).await.unwrap();
        let code = extract_code(outcome);

        let err = svc
            .token_authorization_code(&code, "https://client.example.com/other", &client.id.to_string(), Some("client-secret"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::RedirectMismatch));
    }

    #[tokio::test]
    async fn test_token_exchange_with_pkce_s256() {
        let (svc, _store, client, user_id) = setup().await;
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = crate::utils::pkce::compute_s256_challenge(verifier);

        let mut query = base_query(&client.id.to_string());
        query.code_challenge = Some(challenge);
        query.code_challenge_method = Some("S256".to_string());
        let outcome = svc.authorize(&query, Some(user_id)).await.unwrap();
        let code = extract_code(outcome);

        let token = svc
            .token_authorization_code(&code, "https://client.example.com/cb", &client.id.to_string(), None, Some(verifier))
            .await
            .unwrap();
        assert!(!token.access_token.is_empty());
    }

    #[tokio::test]
    async fn test_token_exchange_bad_verifier_fails() {
        let (svc, _store, client, user_id) = setup().await;
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = crate::utils::pkce::compute_s256_challenge(verifier);

        let mut query = base_query(&client.id.to_string());
        query.code_challenge = Some(challenge);
        query.code_challenge_method = Some("S256".to_string());
        let outcome = svc.authorize(&query, Some(user_id)).await.unwrap();
        let code = extract_code(outcome);

        let err = svc
            .token_authorization_code(
                &code,
                "https://client.example.com/cb",
                &client.id.to_string(),
                None,
                Some("wrong-verifier-wrong-verifier-wrong-verif"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidVerifier));
    }

    #[tokio::test]
    async fn test_token_exchange_unsupported_challenge_method() {
        let (svc, _store, client, user_id) = setup().await;
        let mut query = base_query(&client.id.to_string());
        query.code_challenge = Some("some-challenge-value-43-chars-xxxxxxxxxxxxx".to_string());
        query.code_challenge_method = Some("md5".to_string());
        let outcome = svc.authorize(&query, Some(user_id)).await.unwrap();
        let code = extract_code(outcome);

        let err = svc
            .token_authorization_code(&code, "https://client.example.com/cb", &client.id.to_string(), None, Some("whatever-verifier-long-enough-to-pass-len"))
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::UnsupportedChallengeMethod));
    }

    #[tokio::test]
    async fn test_refresh_rotation() {
        let (svc, _store, client, user_id) = setup().await;
        let mut query = base_query(&client.id.to_string());
        query.scope = Some("profile".to_string());
        let outcome = svc.authorize(&query, Some(user_id)).await.unwrap();
        let code = extract_code(outcome);

        let first = svc
            .token_authorization_code(&code, "https://client.example.com/cb", &client.id.to_string(), Some("client-secret"), None)
            .await
            .unwrap();

        let second = svc.token_refresh(&first.refresh_token, &client.id.to_string(), Some("client-secret")).await.unwrap();
        assert_ne!(first.access_token, second.access_token);

        let err = svc.token_refresh(&first.refresh_token, &client.id.to_string(), Some("client-secret")).await.unwrap_err();
        assert!(matches!(err, OAuthError::RefreshExpired));
    }

    #[tokio::test]
    async fn test_introspect_active_then_inactive_for_garbage() {
        let (svc, _store, client, user_id) = setup().await;
        let mut query = base_query(&client.id.to_string());
        query.scope = None;
        let outcome = svc.authorize(&query, Some(user_id)).await.unwrap();
        let code = extract_code(outcome);
        let token = svc
            .token_authorization_code(&code, "https://client.example.com/cb", &client.id.to_string(), Some("client-secret"), None)
            .await
            .unwrap();

        let active = svc.introspect(&token.access_token, None, &client.id.to_string(), "client-secret").await.unwrap();
        assert!(active.active);

        let inactive = svc.introspect("not-a-real-token", None, &client.id.to_string(), "client-secret").await.unwrap();
        assert!(!inactive.active);
    }

    #[tokio::test]
    async fn test_introspect_rejects_wrong_client_secret() {
        let (svc, _store, client, _user_id) = setup().await;
        let err = svc
            .introspect("whatever", None, &client.id.to_string(), "wrong-secret")
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidClient));
    }

    #[tokio::test]
    async fn test_introspect_rejects_unsupported_hint() {
        let (svc, _store, client, _user_id) = setup().await;
        let err = svc
            .introspect("whatever", Some("refresh_token"), &client.id.to_string(), "client-secret")
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::UnsupportedHint));
    }

    #[tokio::test]
    async fn test_deny_produces_access_denied_redirect() {
        let (svc, _store, client, user_id) = setup().await;
        let req = ApproveRequest {
            approved: false,
            client_id: client.id.to_string(),
            redirect_uri: "https://client.example.com/cb".to_string(),
            scope: None,
            state: Some("xyz".to_string()),
            code_challenge: None,
            code_challenge_method: None,
            nonce: None,
        };

        let url = svc.approve(&req, user_id).await.unwrap();
        assert_eq!(url, "https://client.example.com/cb?error=access_denied&state=xyz");
    }

    #[tokio::test]
    async fn test_has_refresh_token_heuristic() {
        let (svc, _store, client, user_id) = setup().await;
        assert!(!svc.has_refresh_token(user_id, client.id).await.unwrap());

        let outcome = svc.authorize(&base_query(&client.id.to_string()), Some(user_id)).await.unwrap();
        let code = extract_code(outcome);
        svc.token_authorization_code(&code, "https://client.example.com/cb", &client.id.to_string(), Some("client-secret"), None)
            .await
            .unwrap();

        assert!(svc.has_refresh_token(user_id, client.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_refresh_token_then_refresh_fails() {
        let (svc, _store, client, user_id) = setup().await;
        let outcome = svc.authorize(&base_query(&client.id.to_string()), Some(user_id)).await.unwrap();
        let code = extract_code(outcome);
        let token = svc
            .token_authorization_code(&code, "https://client.example.com/cb", &client.id.to_string(), Some("client-secret"), None)
            .await
            .unwrap();

        svc.revoke(&token.refresh_token, Some(&client.id.to_string()), Some("client-secret")).await.unwrap();

        let err = svc.token_refresh(&token.refresh_token, &client.id.to_string(), Some("client-secret")).await.unwrap_err();
        assert!(matches!(err, OAuthError::RefreshExpired));
    }

    #[tokio::test]
    async fn test_revoke_unknown_token_is_not_an_error() {
        let (svc, _store, client, _user_id) = setup().await;
        svc.revoke("not-a-real-token", Some(&client.id.to_string()), Some("client-secret")).await.unwrap();
    }

    #[tokio::test]
    async fn test_userinfo_returns_claims_for_valid_token() {
        let (svc, _store, client, user_id) = setup().await;
        let outcome = svc.authorize(&base_query(&client.id.to_string()), Some(user_id)).await.unwrap();
        let code = extract_code(outcome);
        let token = svc
            .token_authorization_code(&code, "https://client.example.com/cb", &client.id.to_string(), Some("client-secret"), None)
            .await
            .unwrap();

        let info = svc.userinfo(&token.access_token).await.unwrap();
        assert_eq!(info.sub, user_id.to_string());
        assert_eq!(info.email, "alice@example.com");
    }
}
