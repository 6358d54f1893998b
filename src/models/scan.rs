use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Failure code the backend sets when a scan was interrupted by a process restart.
pub const SERVER_RESTART_CODE: &str = "server_restart";

/// Phase text the backend writes when it fails scans orphaned by a restart.
/// Only consulted when `failure_code` is absent.
pub const SERVER_RESTART_MARKER: &str = "redémarrage du serveur";

/// Scan type that produces no downloadable report artifacts.
pub const QUICK_SCAN_TYPE: &str = "quick";

/// Opaque scan identifier. The backend emits either strings or integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ScanId(String);

impl ScanId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ScanId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => ScanId(s),
            RawId::Number(n) => ScanId(n.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    /// Position in the one-way lifecycle `pending -> running -> completed|failed`.
    fn rank(self) -> u8 {
        match self {
            ScanStatus::Pending => 0,
            ScanStatus::Running => 1,
            ScanStatus::Completed | ScanStatus::Failed => 2,
        }
    }

    /// Whether moving from `self` to `next` respects the lifecycle order.
    pub fn can_advance_to(self, next: ScanStatus) -> bool {
        if self.is_terminal() {
            return self == next;
        }
        next.rank() >= self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    #[serde(alias = "low")]
    Low,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "high")]
    High,
    #[serde(alias = "critical")]
    Critical,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    /// Badge text shown on the completed card.
    pub fn badge(self) -> String {
        format!("Risque {}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanLogEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// A scan as reported by the external scan API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scan {
    pub id: ScanId,
    #[serde(default)]
    pub target_url: String,
    #[serde(default)]
    pub scan_type: String,
    pub status: ScanStatus,
    #[serde(default, deserialize_with = "deserialize_progress")]
    pub progress: u8,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub current_phase: Option<String>,
    #[serde(default)]
    pub failure_code: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub scan_logs: Option<Vec<ScanLogEntry>>,
    #[serde(default)]
    pub scan_data: Option<serde_json::Value>,
    #[serde(default)]
    pub report_html: Option<String>,
    #[serde(default)]
    pub storage_path: Option<String>,
    #[serde(default)]
    pub report_pdf_path: Option<String>,
}

impl Scan {
    pub fn is_quick(&self) -> bool {
        self.scan_type.eq_ignore_ascii_case(QUICK_SCAN_TYPE)
    }

    /// Classify a backend-reported failure.
    ///
    /// The structured `failure_code` wins; the phase substring match is kept
    /// for backends that predate it.
    pub fn failure_reason(&self) -> FailureReason {
        if let Some(code) = self.failure_code.as_deref() {
            return if code == SERVER_RESTART_CODE {
                FailureReason::ServerRestart
            } else {
                FailureReason::Generic
            };
        }

        let restarted = self
            .current_phase
            .as_deref()
            .map(|phase| phase.to_lowercase().contains(SERVER_RESTART_MARKER))
            .unwrap_or(false);

        if restarted {
            FailureReason::ServerRestart
        } else {
            FailureReason::Generic
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    ServerRestart,
    Generic,
}

/// Payload of `GET /scan/{id}/status`. Only the log feed is consumed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanStatusPayload {
    #[serde(default, alias = "logs")]
    pub scan_logs: Vec<ScanLogEntry>,
}

/// Body of the cancellation PATCH.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CancelScanRequest {
    pub status: ScanStatus,
    pub current_phase: String,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Body of `POST /scan` on the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitScanRequest {
    pub url: String,
    pub scan_type: String,
}

fn deserialize_progress<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    Ok(raw.clamp(0.0, 100.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scan_json(extra: serde_json::Value) -> Scan {
        let mut base = json!({
            "id": 17,
            "target_url": "https://www.example.fr",
            "scan_type": "standard",
            "status": "failed",
            "progress": 63,
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn accepts_numeric_and_string_ids() {
        let numeric = scan_json(json!({}));
        assert_eq!(numeric.id.as_str(), "17");

        let text = scan_json(json!({ "id": "a1b2" }));
        assert_eq!(text.id, ScanId::new("a1b2"));
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(scan_json(json!({ "progress": 140 })).progress, 100);
        assert_eq!(scan_json(json!({ "progress": -3 })).progress, 0);
        assert_eq!(scan_json(json!({ "progress": null })).progress, 0);
    }

    #[test]
    fn risk_level_accepts_both_cases() {
        let scan = scan_json(json!({ "status": "completed", "risk_level": "high" }));
        assert_eq!(scan.risk_level, Some(RiskLevel::High));
        assert_eq!(RiskLevel::High.badge(), "Risque HIGH");
    }

    #[test]
    fn failure_code_takes_precedence_over_phase_text() {
        let coded = scan_json(json!({
            "failure_code": "backend_error",
            "current_phase": "Échec : redémarrage du serveur",
        }));
        assert_eq!(coded.failure_reason(), FailureReason::Generic);

        let restart = scan_json(json!({ "failure_code": "server_restart" }));
        assert_eq!(restart.failure_reason(), FailureReason::ServerRestart);
    }

    #[test]
    fn phase_text_fallback_detects_restart() {
        let legacy = scan_json(json!({
            "current_phase": "Scan interrompu : Redémarrage du serveur",
        }));
        assert_eq!(legacy.failure_reason(), FailureReason::ServerRestart);

        let generic = scan_json(json!({ "current_phase": "Timeout navigateur" }));
        assert_eq!(generic.failure_reason(), FailureReason::Generic);
    }

    #[test]
    fn status_lifecycle_is_one_way() {
        assert!(ScanStatus::Pending.can_advance_to(ScanStatus::Running));
        assert!(ScanStatus::Running.can_advance_to(ScanStatus::Failed));
        assert!(!ScanStatus::Running.can_advance_to(ScanStatus::Pending));
        assert!(!ScanStatus::Completed.can_advance_to(ScanStatus::Running));
        assert!(!ScanStatus::Completed.can_advance_to(ScanStatus::Failed));
    }

    #[test]
    fn cancel_request_serializes_failed_status() {
        let req = CancelScanRequest {
            status: ScanStatus::Failed,
            current_phase: "Annulé".into(),
            completed_at: chrono::Utc::now(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["status"], "failed");
        assert!(value["completed_at"].is_string());
    }
}
