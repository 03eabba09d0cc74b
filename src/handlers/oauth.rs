//! HTTP handlers for the `oauth` route group: authorize, approve, token,
//! introspect, userinfo, revoke, OIDC discovery (§6).

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;

use crate::config::AppState;
use crate::dto::oauth::{
    ApproveRequest, AuthorizeQuery, IntrospectRequest, IntrospectResponse, OpenIdConfiguration,
    RevokeRequest, TokenRequest, TokenResponse, UserInfoResponse,
};
use crate::error::OAuthError;
use crate::middleware::{AuthUser, FlexibleUser, OpaqueUser};
use crate::services::oauth::AuthorizeOutcome;
use crate::services::OAuthService;

fn oauth_service(state: &AppState) -> OAuthService {
    OAuthService::new(
        state.client_repo.clone(),
        state.code_repo.clone(),
        state.token_repo.clone(),
        state.user_repo.clone(),
        state.jwt_manager.clone(),
        state.config.app_url.clone(),
        state.config.public_clients_may_omit_secret,
    )
}

fn login_redirect(app_url: &str, query: &AuthorizeQuery) -> Response {
    let mut params = vec![
        ("response_type", query.response_type.clone()),
        ("client_id", query.client_id.clone()),
        ("redirect_uri", query.redirect_uri.clone()),
    ];
    if let Some(scope) = &query.scope {
        params.push(("scope", scope.clone()));
    }
    if let Some(state) = &query.state {
        params.push(("state", state.clone()));
    }
    if let Some(cc) = &query.code_challenge {
        params.push(("code_challenge", cc.clone()));
    }
    if let Some(ccm) = &query.code_challenge_method {
        params.push(("code_challenge_method", ccm.clone()));
    }
    if let Some(nonce) = &query.nonce {
        params.push(("nonce", nonce.clone()));
    }

    let query_string = params
        .into_iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(&v)))
        .collect::<Vec<_>>()
        .join("&");

    Redirect::temporary(&format!("{app_url}/login?{query_string}")).into_response()
}

/// GET /api/v1/oauth/authorize
pub async fn authorize_handler(
    State(state): State<AppState>,
    FlexibleUser(user_id): FlexibleUser,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, OAuthError> {
    match oauth_service(&state).authorize(&query, user_id).await? {
        AuthorizeOutcome::LoginRequired => Ok(login_redirect(&state.config.app_url, &query)),
        AuthorizeOutcome::Redirect(url) => Ok(Redirect::temporary(&url).into_response()),
    }
}

/// POST /api/v1/oauth/authorize/approve
pub async fn approve_handler(
    State(state): State<AppState>,
    AuthUser { user_id, .. }: AuthUser,
    Json(req): Json<ApproveRequest>,
) -> Result<Response, OAuthError> {
    let url = oauth_service(&state).approve(&req, user_id).await?;
    Ok(Redirect::temporary(&url).into_response())
}

/// POST /api/v1/oauth/token
pub async fn token_handler(
    State(state): State<AppState>,
    axum::Form(req): axum::Form<TokenRequest>,
) -> Result<Json<TokenResponse>, OAuthError> {
    let service = oauth_service(&state);

    let response = match req.grant_type.as_str() {
        "authorization_code" => {
            let code = req.code.ok_or(OAuthError::InvalidGrant)?;
            let redirect_uri = req.redirect_uri.ok_or(OAuthError::InvalidGrant)?;
            let client_id = req.client_id.ok_or(OAuthError::InvalidClient)?;
            service
                .token_authorization_code(
                    &code,
                    &redirect_uri,
                    &client_id,
                    req.client_secret.as_deref(),
                    req.code_verifier.as_deref(),
                )
                .await?
        }
        "refresh_token" => {
            let refresh_token = req.refresh_token.ok_or(OAuthError::InvalidGrant)?;
            let client_id = req.client_id.ok_or(OAuthError::InvalidClient)?;
            service
                .token_refresh(&refresh_token, &client_id, req.client_secret.as_deref())
                .await?
        }
        _ => return Err(OAuthError::InvalidGrant),
    };

    Ok(Json(response))
}

/// POST /api/v1/oauth/introspect
pub async fn introspect_handler(
    State(state): State<AppState>,
    axum::Form(req): axum::Form<IntrospectRequest>,
) -> Result<Json<IntrospectResponse>, OAuthError> {
    let response = oauth_service(&state)
        .introspect(&req.token, req.token_type_hint.as_deref(), &req.client_id, &req.client_secret)
        .await?;

    Ok(Json(response))
}

/// GET /api/v1/oauth/userinfo
pub async fn userinfo_handler(OpaqueUser(info): OpaqueUser) -> Json<UserInfoResponse> {
    Json(info)
}

/// POST /api/v1/oauth/revoke
///
/// Per RFC 7009, this endpoint always returns 200 OK even if the token is
/// invalid, already revoked, or client authentication is absent.
pub async fn revoke_handler(
    State(state): State<AppState>,
    axum::Form(req): axum::Form<RevokeRequest>,
) -> StatusCode {
    let _ = oauth_service(&state)
        .revoke(&req.token, req.client_id.as_deref(), req.client_secret.as_deref())
        .await;

    StatusCode::OK
}

/// GET /.well-known/openid-configuration
pub async fn openid_configuration_handler(State(state): State<AppState>) -> Json<OpenIdConfiguration> {
    Json(OpenIdConfiguration::new(&state.config.app_url))
}
