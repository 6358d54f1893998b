//! Client side of the scan lifecycle: observing a backend job, cancelling
//! it, resubmitting it, and describing its report.

use chrono::{DateTime, Utc};

use crate::auth::Credential;
use crate::client::{ClientError, ScanApi, SubmittedScan};
use crate::models::{CancelScanRequest, Scan, ScanId, ScanStatus, SubmitScanRequest};

pub mod monitor;
pub mod report;

pub use monitor::{RecoveryAction, ScanMonitor, ScanView};
pub use report::{ArtifactKind, DownloadAction, ReportView};

/// Phase text written on a scan the user cancelled.
pub const CANCELLED_PHASE: &str = "Analyse annulée par l'utilisateur";

pub fn cancellation_request(now: DateTime<Utc>) -> CancelScanRequest {
    CancelScanRequest {
        status: ScanStatus::Failed,
        current_phase: CANCELLED_PHASE.to_string(),
        completed_at: now,
    }
}

/// Force a scan into `failed` with a single PATCH, whatever its progress.
///
/// Races any poll in flight; the caller navigates away on success.
pub async fn cancel_scan(
    api: &dyn ScanApi,
    credential: &Credential,
    id: &ScanId,
) -> Result<(), ClientError> {
    let request = cancellation_request(Utc::now());
    api.cancel_scan(credential, id, &request).await?;
    tracing::info!("Scan {} cancelled by user {}", id, credential.user_id());
    Ok(())
}

/// Submit a fresh scan with the same target and mode as `scan`.
pub async fn resubmit_scan(
    api: &dyn ScanApi,
    credential: &Credential,
    scan: &Scan,
) -> Result<SubmittedScan, ClientError> {
    let request = SubmitScanRequest {
        url: scan.target_url.clone(),
        scan_type: scan.scan_type.clone(),
    };
    let submitted = api.submit_scan(credential, &request).await?;
    tracing::info!(
        "Scan {} resubmitted as {} for {}",
        scan.id,
        submitted.id,
        scan.target_url
    );
    Ok(submitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::BackendClaims;
    use crate::models::{Role, ScanLogEntry};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingApi {
        patches: Mutex<Vec<(ScanId, CancelScanRequest)>>,
        submissions: Mutex<Vec<SubmitScanRequest>>,
    }

    #[async_trait]
    impl ScanApi for RecordingApi {
        async fn fetch_scan(
            &self,
            _credential: &Credential,
            _id: &ScanId,
        ) -> Result<Option<Scan>, ClientError> {
            unreachable!("cancellation must not poll")
        }

        async fn fetch_logs(
            &self,
            _credential: &Credential,
            _id: &ScanId,
        ) -> Result<Vec<ScanLogEntry>, ClientError> {
            unreachable!("cancellation must not poll")
        }

        async fn cancel_scan(
            &self,
            _credential: &Credential,
            id: &ScanId,
            request: &CancelScanRequest,
        ) -> Result<(), ClientError> {
            self.patches
                .lock()
                .unwrap()
                .push((id.clone(), request.clone()));
            Ok(())
        }

        async fn submit_scan(
            &self,
            _credential: &Credential,
            request: &SubmitScanRequest,
        ) -> Result<SubmittedScan, ClientError> {
            self.submissions.lock().unwrap().push(request.clone());
            Ok(SubmittedScan {
                id: ScanId::new("fresh"),
            })
        }
    }

    fn credential() -> Credential {
        Credential::from_parts(
            "token",
            BackendClaims {
                sub: "u1".into(),
                email: "dpo@example.fr".into(),
                role: Role::User,
                iat: 0,
                exp: i64::MAX,
            },
        )
    }

    #[tokio::test]
    async fn cancel_issues_exactly_one_failed_patch() {
        let api = RecordingApi::default();
        let before = Utc::now();

        cancel_scan(&api, &credential(), &ScanId::new("s7"))
            .await
            .unwrap();

        let patches = api.patches.lock().unwrap();
        assert_eq!(patches.len(), 1);
        let (id, request) = &patches[0];
        assert_eq!(id, &ScanId::new("s7"));
        assert_eq!(request.status, ScanStatus::Failed);
        assert_eq!(request.current_phase, CANCELLED_PHASE);
        assert!(request.completed_at >= before);
    }

    #[tokio::test]
    async fn resubmit_reuses_target_and_mode() {
        let api = RecordingApi::default();
        let scan: Scan = serde_json::from_value(json!({
            "id": 3,
            "target_url": "https://shop.example.fr",
            "scan_type": "forensic",
            "status": "failed",
        }))
        .unwrap();

        let submitted = resubmit_scan(&api, &credential(), &scan).await.unwrap();

        assert_eq!(submitted.id, ScanId::new("fresh"));
        assert_eq!(
            api.submissions.lock().unwrap().as_slice(),
            &[SubmitScanRequest {
                url: "https://shop.example.fr".into(),
                scan_type: "forensic".into(),
            }]
        );
    }
}
