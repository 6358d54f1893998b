use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use serde_json::Value;
use std::collections::HashMap;

use super::AppState;
use crate::client::ComplianceResource;
use crate::error::AppError;
use crate::middleware::require_credential_from_headers;

fn parse_resource(resource: &str) -> Result<ComplianceResource, AppError> {
    resource.parse().map_err(AppError::NotFound)
}

/// List records of a register. Query parameters are forwarded untouched.
///
/// **Auth: Session Required**
pub async fn list_records(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(resource): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, AppError> {
    let credential = require_credential_from_headers(&state.tokens, &headers)?;
    let resource = parse_resource(&resource)?;

    let mut query: Vec<(String, String)> = query.into_iter().collect();
    query.sort();

    let records = state
        .backend
        .list_records(&credential, resource, &query)
        .await?;
    Ok(Json(records))
}

pub async fn get_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((resource, record_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let credential = require_credential_from_headers(&state.tokens, &headers)?;
    let resource = parse_resource(&resource)?;

    let record = state
        .backend
        .get_record(&credential, resource, &record_id)
        .await?;
    Ok(Json(record))
}

pub async fn create_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(resource): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let credential = require_credential_from_headers(&state.tokens, &headers)?;
    let resource = parse_resource(&resource)?;

    let record = state
        .backend
        .create_record(&credential, resource, &body)
        .await?;
    tracing::info!(
        "User {} created a {} record",
        credential.user_id(),
        resource.slug()
    );
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((resource, record_id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let credential = require_credential_from_headers(&state.tokens, &headers)?;
    let resource = parse_resource(&resource)?;

    let record = state
        .backend
        .update_record(&credential, resource, &record_id, &body)
        .await?;
    Ok(Json(record))
}

pub async fn delete_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((resource, record_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let credential = require_credential_from_headers(&state.tokens, &headers)?;
    let resource = parse_resource(&resource)?;

    state
        .backend
        .delete_record(&credential, resource, &record_id)
        .await?;
    tracing::info!(
        "User {} deleted {} record {}",
        credential.user_id(),
        resource.slug(),
        record_id
    );
    Ok(StatusCode::NO_CONTENT)
}
