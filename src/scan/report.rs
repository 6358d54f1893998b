use serde::Serialize;

use crate::models::{RiskLevel, Scan, ScanId};
use crate::utils::{evidence_zip_filename, report_pdf_filename};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Pdf,
    Zip,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DownloadAction {
    pub kind: ArtifactKind,
    /// Object storage key, when the backend has already stored the artifact.
    /// A PDF without one is rendered on demand through the PDF proxy.
    pub storage_key: Option<String>,
    pub filename: String,
}

/// What the report viewer needs for a completed scan.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportView {
    pub scan_id: ScanId,
    pub target_url: String,
    pub scan_type: String,
    pub risk_level: Option<RiskLevel>,
    pub badge: Option<String>,
    pub report_html: Option<String>,
    pub downloads: Vec<DownloadAction>,
}

impl ReportView {
    pub fn for_scan(scan: &Scan) -> Self {
        Self {
            scan_id: scan.id.clone(),
            target_url: scan.target_url.clone(),
            scan_type: scan.scan_type.clone(),
            risk_level: scan.risk_level,
            badge: scan.risk_level.map(RiskLevel::badge),
            report_html: scan.report_html.clone(),
            downloads: download_actions(scan),
        }
    }
}

/// Quick scans collect no evidence, so they offer no downloads.
pub fn download_actions(scan: &Scan) -> Vec<DownloadAction> {
    if scan.is_quick() {
        return Vec::new();
    }

    vec![
        DownloadAction {
            kind: ArtifactKind::Pdf,
            storage_key: scan.report_pdf_path.clone(),
            filename: report_pdf_filename(&scan.target_url),
        },
        DownloadAction {
            kind: ArtifactKind::Zip,
            storage_key: scan.storage_path.clone(),
            filename: evidence_zip_filename(&scan.target_url),
        },
    ]
}
