use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::AppState;
use crate::client::SubmittedScan;
use crate::error::AppError;
use crate::middleware::require_credential_from_headers;
use crate::models::{Scan, ScanId, ScanStatus, SubmitScanRequest};
use crate::scan::{self as lifecycle, CANCELLED_PHASE, ReportView};

#[derive(Debug, Deserialize, Validate)]
pub struct StartScanRequest {
    #[validate(url)]
    pub url: String,
    #[validate(length(min = 1, max = 32))]
    pub scan_type: String,
}

#[derive(Debug, Serialize)]
pub struct CancelScanResponse {
    pub scan_id: ScanId,
    pub status: ScanStatus,
    pub message: &'static str,
}

async fn load_scan(state: &AppState, headers: &HeaderMap, scan_id: String) -> Result<Scan, AppError> {
    let credential = require_credential_from_headers(&state.tokens, headers)?;
    let id = ScanId::new(scan_id);

    state
        .scans
        .fetch_scan(&credential, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Scan {} not found", id)))
}

/// Submit a new scan.
///
/// **Auth: Session Required**
pub async fn submit_scan(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<StartScanRequest>,
) -> Result<(StatusCode, Json<SubmittedScan>), AppError> {
    let credential = require_credential_from_headers(&state.tokens, &headers)?;
    req.validate()?;

    let request = SubmitScanRequest {
        url: req.url.trim().to_string(),
        scan_type: req.scan_type.trim().to_lowercase(),
    };
    let submitted = state.scans.submit_scan(&credential, &request).await?;

    tracing::info!(
        "Scan {} submitted by {} for {} ({})",
        submitted.id,
        credential.user_id(),
        request.url,
        request.scan_type
    );

    Ok((StatusCode::CREATED, Json(submitted)))
}

/// Current record of one scan.
///
/// **Auth: Session Required**
pub async fn get_scan(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(scan_id): Path<String>,
) -> Result<Json<Scan>, AppError> {
    load_scan(&state, &headers, scan_id).await.map(Json)
}

/// Force a scan into `failed`, whatever its progress.
///
/// **Auth: Session Required**
pub async fn cancel_scan(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(scan_id): Path<String>,
) -> Result<Json<CancelScanResponse>, AppError> {
    let credential = require_credential_from_headers(&state.tokens, &headers)?;
    let id = ScanId::new(scan_id);

    lifecycle::cancel_scan(state.scans.as_ref(), &credential, &id).await?;

    Ok(Json(CancelScanResponse {
        scan_id: id,
        status: ScanStatus::Failed,
        message: CANCELLED_PHASE,
    }))
}

/// Start a new scan with the same target and mode as a failed one.
///
/// **Auth: Session Required**
pub async fn resubmit_scan(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(scan_id): Path<String>,
) -> Result<(StatusCode, Json<SubmittedScan>), AppError> {
    let credential = require_credential_from_headers(&state.tokens, &headers)?;
    let scan = load_scan(&state, &headers, scan_id).await?;

    if scan.status != ScanStatus::Failed {
        return Err(AppError::BadRequest(format!(
            "Scan {} is {}; only failed scans can be resubmitted",
            scan.id,
            scan.status.as_str()
        )));
    }

    let submitted = lifecycle::resubmit_scan(state.scans.as_ref(), &credential, &scan).await?;
    Ok((StatusCode::CREATED, Json(submitted)))
}

/// Report view of a completed scan.
///
/// **Auth: Session Required**
pub async fn get_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(scan_id): Path<String>,
) -> Result<Json<ReportView>, AppError> {
    let scan = load_scan(&state, &headers, scan_id).await?;

    if scan.status != ScanStatus::Completed {
        return Err(AppError::BadRequest(format!(
            "Scan {} is {}; the report is available once it completes",
            scan.id,
            scan.status.as_str()
        )));
    }

    Ok(Json(ReportView::for_scan(&scan)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_request_needs_absolute_url() {
        let bad = StartScanRequest {
            url: "example.fr".into(),
            scan_type: "standard".into(),
        };
        assert!(bad.validate().is_err());

        let good = StartScanRequest {
            url: "https://www.example.fr".into(),
            scan_type: "quick".into(),
        };
        assert!(good.validate().is_ok());
    }
}
