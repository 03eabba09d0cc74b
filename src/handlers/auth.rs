//! HTTP handlers for the `auth` route group: register, login, verify-email (§6).

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::config::AppState;
use crate::dto::{LoginRequest, MessageResponse, RegisterRequest, RegisterResponse, SessionTokenResponse, VerifyEmailQuery};
use crate::error::IdentityError;
use crate::services::auth::RegisterOutcome;
use crate::services::IdentityService;
use crate::utils::jwt::SESSION_JWT_EXPIRY_SECS;

fn identity_service(state: &AppState) -> IdentityService {
    IdentityService::new(
        state.user_repo.clone(),
        state.jwt_manager.clone(),
        state.mailer.clone(),
        state.config.is_production(),
    )
}

/// POST /api/v1/auth/register
pub async fn register_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), IdentityError> {
    let outcome = identity_service(&state).register(&req.username, &req.email, &req.password).await?;

    let response = match outcome {
        RegisterOutcome::Created(user) => RegisterResponse::Created {
            id: user.id,
            username: user.username,
            email: user.email,
        },
        RegisterOutcome::VerificationResent => RegisterResponse::VerificationResent { email: req.email },
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/login
pub async fn login_handler(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionTokenResponse>, IdentityError> {
    let access_token = identity_service(&state).login(&req.identifier, &req.password).await?;

    Ok(Json(SessionTokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: SESSION_JWT_EXPIRY_SECS,
    }))
}

/// GET /api/v1/auth/verify-email?token=...
pub async fn verify_email_handler(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<MessageResponse>, IdentityError> {
    identity_service(&state).verify_email(&query.token).await?;

    Ok(Json(MessageResponse {
        message: "email verified".to_string(),
    }))
}
