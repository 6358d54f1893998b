use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::{BackendClient, ClientError};
use crate::auth::Credential;
use crate::models::{
    CancelScanRequest, Scan, ScanId, ScanLogEntry, ScanStatusPayload, SubmitScanRequest,
};

/// PDF rendering runs a headless browser on the backend.
const PDF_TIMEOUT_SECS: u64 = 120;

/// Scan operations the monitor and the HTTP surface depend on.
#[async_trait]
pub trait ScanApi: Send + Sync {
    /// Fetch one scan. `Ok(None)` when the backend does not know the id.
    async fn fetch_scan(
        &self,
        credential: &Credential,
        id: &ScanId,
    ) -> Result<Option<Scan>, ClientError>;

    /// Fetch the full accumulated log feed of a scan.
    async fn fetch_logs(
        &self,
        credential: &Credential,
        id: &ScanId,
    ) -> Result<Vec<ScanLogEntry>, ClientError>;

    async fn cancel_scan(
        &self,
        credential: &Credential,
        id: &ScanId,
        request: &CancelScanRequest,
    ) -> Result<(), ClientError>;

    async fn submit_scan(
        &self,
        credential: &Credential,
        request: &SubmitScanRequest,
    ) -> Result<SubmittedScan, ClientError>;
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SubmittedScan {
    #[serde(alias = "scan_id")]
    pub id: ScanId,
}

/// `GET /scans` has been seen both bare and wrapped.
///
/// Records stay raw JSON until one matches: a neighbour the portal cannot
/// parse must not hide the scan being watched.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScanList {
    Bare(Vec<Value>),
    Wrapped { scans: Vec<Value> },
}

impl ScanList {
    fn into_vec(self) -> Vec<Value> {
        match self {
            ScanList::Bare(scans) | ScanList::Wrapped { scans } => scans,
        }
    }
}

/// Pick one scan out of a collection response.
///
/// The backend has no single-scan GET yet, so `fetch_scan` lists and
/// filters; once it does, only this shim changes. Only the matching
/// record is decoded.
pub fn find_scan(records: Vec<Value>, id: &ScanId) -> Result<Option<Scan>, ClientError> {
    let matching = records.into_iter().find(|record| {
        record
            .get("id")
            .and_then(|raw| ScanId::deserialize(raw).ok())
            .is_some_and(|record_id| &record_id == id)
    });

    matching
        .map(|record| {
            serde_json::from_value(record)
                .map_err(|e| ClientError::Decode(format!("scan {}: {}", id, e)))
        })
        .transpose()
}

#[async_trait]
impl ScanApi for BackendClient {
    async fn fetch_scan(
        &self,
        credential: &Credential,
        id: &ScanId,
    ) -> Result<Option<Scan>, ClientError> {
        let list: ScanList = self.get_json(credential, &["scans"]).await?;
        find_scan(list.into_vec(), id)
    }

    async fn fetch_logs(
        &self,
        credential: &Credential,
        id: &ScanId,
    ) -> Result<Vec<ScanLogEntry>, ClientError> {
        let payload: ScanStatusPayload = self
            .get_json(credential, &["scan", id.as_str(), "status"])
            .await?;
        Ok(payload.scan_logs)
    }

    async fn cancel_scan(
        &self,
        credential: &Credential,
        id: &ScanId,
        request: &CancelScanRequest,
    ) -> Result<(), ClientError> {
        self.patch(credential, &["scan", id.as_str()], request)
            .await
    }

    async fn submit_scan(
        &self,
        credential: &Credential,
        request: &SubmitScanRequest,
    ) -> Result<SubmittedScan, ClientError> {
        self.post_json(credential, &["scan"], request).await
    }
}

impl BackendClient {
    /// Render a scan report to PDF on the backend.
    pub async fn generate_pdf(
        &self,
        credential: &Credential,
        scan_payload: &serde_json::Value,
    ) -> Result<Vec<u8>, ClientError> {
        self.post_for_bytes(
            credential,
            &["scan", "generate-pdf"],
            scan_payload,
            Duration::from_secs(PDF_TIMEOUT_SECS),
        )
        .await
    }
}
