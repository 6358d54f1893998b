use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderName, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::AppState;
use crate::error::AppError;
use crate::middleware::require_credential_from_headers;
use crate::storage::{ObjectStore, StoredObject, validate_key};
use crate::utils::{attachment_disposition, sha256_hex};

/// Hex SHA-256 of the body, for evidence integrity checks.
pub const CONTENT_DIGEST_HEADER: HeaderName = HeaderName::from_static("x-content-sha256");

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub key: Option<String>,
}

/// Stream a stored scan artifact to the browser.
///
/// **Auth: Session Required**
pub async fn download_object(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DownloadParams>,
) -> Result<Response, AppError> {
    let credential = require_credential_from_headers(&state.tokens, &headers)?;

    let object = fetch_object(state.storage.as_ref(), params.key.as_deref()).await?;
    tracing::info!(
        "User {} downloaded {} ({} bytes)",
        credential.user_id(),
        object.key,
        object.bytes.len()
    );

    Ok(object_response(object))
}

/// Resolve the `key` query parameter to a stored object.
pub async fn fetch_object(
    store: &dyn ObjectStore,
    key: Option<&str>,
) -> Result<StoredObject, AppError> {
    let key = key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing 'key' query parameter".into()))?;
    let key = validate_key(key)?;

    Ok(store.get(key).await?)
}

/// Attachment response carrying the object's type and digest.
pub fn object_response(object: StoredObject) -> Response {
    let digest = sha256_hex(&object.bytes);
    let content_type = object.content_type().to_string();
    let disposition = attachment_disposition(object.file_name());

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, "private, no-store".to_string()),
            (CONTENT_DIGEST_HEADER, digest),
        ],
        object.bytes,
    )
        .into_response()
}
