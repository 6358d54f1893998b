use axum::http::{HeaderMap, header};

use crate::auth::{Credential, TokenError, TokenIssuer};
use crate::error::AppError;

/// Bearer token from the `Authorization` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the caller's backend credential or reject the request.
pub fn require_credential_from_headers(
    tokens: &TokenIssuer,
    headers: &HeaderMap,
) -> Result<Credential, AppError> {
    let token = bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Session token required. Please log in.".into()))?;

    tokens.verify(token).map_err(|e| {
        if let TokenError::Invalid(ref source) = e {
            tracing::debug!("Rejected session token: {}", source);
        }
        AppError::Unauthorized(e.to_string())
    })
}
