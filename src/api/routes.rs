use axum::{
    Router,
    routing::{get, post},
};

use super::AppState;
use super::{auth, compliance, download, events, report, scan};

/// V1 API routes
///
/// ## Public Routes
/// - POST /auth/login - Exchange credentials for a backend token
///
/// ## Session Routes (Bearer token)
/// - GET  /auth/session - Decode the presented token
/// - POST /scans - Submit a scan
/// - GET  /scans/{scan_id} - Current scan record
/// - POST /scans/{scan_id}/cancel - Force a scan into `failed`
/// - POST /scans/{scan_id}/resubmit - New scan with the same target and mode
/// - GET  /scans/{scan_id}/report - Report view with download actions
/// - POST /scans/events/ticket - One-time ticket for the SSE stream
/// - GET  /scans/{scan_id}/events - SSE stream of monitor views
/// - POST /scan/generate-pdf - Render a report PDF on the backend
/// - GET  /download?key= - Proxy a stored artifact
/// - /compliance/{resource}[/{record_id}] - Register CRUD pass-through
pub fn v1_routes() -> Router<AppState> {
    Router::new()
        // ========================================
        // Auth
        // ========================================
        .route("/auth/login", post(auth::login))
        .route("/auth/session", get(auth::session))
        // ========================================
        // Scan lifecycle
        // ========================================
        .route("/scans", post(scan::submit_scan))
        .route("/scans/events/ticket", post(events::create_sse_ticket))
        .route("/scans/{scan_id}", get(scan::get_scan))
        .route("/scans/{scan_id}/cancel", post(scan::cancel_scan))
        .route("/scans/{scan_id}/resubmit", post(scan::resubmit_scan))
        .route("/scans/{scan_id}/report", get(scan::get_report))
        .route("/scans/{scan_id}/events", get(events::scan_events))
        // ========================================
        // Artifacts
        // ========================================
        .route("/scan/generate-pdf", post(report::generate_pdf))
        .route("/download", get(download::download_object))
        // ========================================
        // Compliance registers
        // ========================================
        .route(
            "/compliance/{resource}",
            get(compliance::list_records).post(compliance::create_record),
        )
        .route(
            "/compliance/{resource}/{record_id}",
            get(compliance::get_record)
                .patch(compliance::update_record)
                .delete(compliance::delete_record),
        )
}
