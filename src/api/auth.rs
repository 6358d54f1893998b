use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use validator::Validate;

use super::AppState;
use crate::auth::{hash_password, verify_password};
use crate::db::users::find_user_by_email;
use crate::error::AppError;
use crate::middleware::rate_limit::{check_rate_limit, login_rate_limit_key, reset_rate_limit};
use crate::middleware::require_credential_from_headers;
use crate::models::{PublicUser, Role};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 1024))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Hash checked when the email is unknown, so both paths cost one argon2 run.
fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash_password("portal-dummy-password").unwrap_or_default())
}

/// Exchange email and password for a backend token.
///
/// **Auth: Public**, rate limited per account.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    req.validate()?;

    let limit_key = login_rate_limit_key(&req.email);
    let mut redis_conn = state.redis.clone();
    let limit = check_rate_limit(
        &mut redis_conn,
        &limit_key,
        state.login.max_attempts,
        state.login.window_secs,
    )
    .await?;

    if !limit.allowed {
        tracing::warn!("Login rate limit hit for {}", limit_key);
        return Err(AppError::RateLimited {
            retry_after: limit.reset_in_secs,
        });
    }

    let user = find_user_by_email(&state.db, &req.email).await?;
    let stored_hash = user
        .as_ref()
        .map(|u| u.password_hash.clone())
        .unwrap_or_else(|| dummy_hash().to_string());

    let password = req.password;
    let password_ok = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password check failed: {}", e)))?;

    let user = match user {
        Some(user) if password_ok => user,
        _ => {
            tracing::info!("Failed login for {}", req.email);
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
    };

    if let Err(e) = reset_rate_limit(&mut redis_conn, &limit_key).await {
        tracing::warn!("Failed to reset login limit for {}: {}", limit_key, e);
    }

    let credential = state
        .tokens
        .issue(&user.id.to_string(), &user.email, user.role)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    tracing::info!("User {} logged in", user.id);

    Ok(Json(LoginResponse {
        token: credential.token().to_string(),
        token_type: "Bearer",
        expires_at: credential.claims().expires_at(),
        user: PublicUser::from(&user),
    }))
}

/// Decode the presented token.
///
/// **Auth: Session Required**
pub async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<([(header::HeaderName, &'static str); 1], Json<SessionResponse>), AppError> {
    let credential = require_credential_from_headers(&state.tokens, &headers)?;
    let claims = credential.claims();

    Ok((
        [(header::CACHE_CONTROL, "no-store")],
        Json(SessionResponse {
            user_id: claims.sub.clone(),
            email: claims.email.clone(),
            role: claims.role,
            expires_at: claims.expires_at(),
        }),
    ))
}
