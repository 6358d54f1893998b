use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;

use super::AppState;
use crate::client::ClientError;
use crate::middleware::require_credential_from_headers;
use crate::utils::{attachment_disposition, report_pdf_filename};

/// Error body of the PDF proxy. The report page shows `detail` as is.
#[derive(Debug, Serialize)]
pub struct DetailError {
    pub detail: String,
}

fn detail_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(DetailError {
            detail: detail.into(),
        }),
    )
        .into_response()
}

/// Target URL carried by the scan payload, used for the file name.
fn payload_target_url(payload: &Value) -> &str {
    ["target_url", "url"]
        .iter()
        .find_map(|field| payload.get(*field).and_then(Value::as_str))
        .unwrap_or_default()
}

/// Render a scan report to PDF through the backend.
///
/// **Auth: Session Required**
///
/// Failures are normalized to `{"detail": ...}` with the backend's status.
pub async fn generate_pdf(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    let credential = match require_credential_from_headers(&state.tokens, &headers) {
        Ok(credential) => credential,
        Err(e) => return detail_response(StatusCode::UNAUTHORIZED, e.to_string()),
    };

    let rendered = state.backend.generate_pdf(&credential, &payload).await;
    if let Ok(pdf) = &rendered {
        tracing::info!(
            "Generated PDF ({} bytes) for user {}",
            pdf.len(),
            credential.user_id()
        );
    }

    pdf_response(rendered, &payload)
}

/// Browser-facing response for a backend PDF render.
pub fn pdf_response(rendered: Result<Vec<u8>, ClientError>, payload: &Value) -> Response {
    match rendered {
        Ok(pdf) => {
            let filename = report_pdf_filename(payload_target_url(payload));
            (
                [
                    (header::CONTENT_TYPE, "application/pdf".to_string()),
                    (header::CONTENT_DISPOSITION, attachment_disposition(&filename)),
                ],
                pdf,
            )
                .into_response()
        }
        Err(e) => {
            let (status, detail) = e.detail();
            tracing::warn!("PDF generation failed ({}): {}", status, detail);
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            detail_response(status, detail)
        }
    }
}
