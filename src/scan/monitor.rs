// ============================================
// Scan Monitor
// ============================================
//
// Observes one backend scan job on behalf of a viewer:
//
//   Loading -> NotFound | Active(pending|running) | Completed | Failed
//   Active  -> Completed | Failed   (backend-reported status only)
//   Active  -> TimedOut             (no terminal status before the deadline)
//
// Poll errors never fail the scan. After `reconnect_threshold` consecutive
// failed polls the Active view carries `reconnecting = true` until the next
// successful poll.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use super::report::ReportView;
use crate::auth::Credential;
use crate::client::ScanApi;
use crate::config::PollSettings;
use crate::models::{FailureReason, RiskLevel, Scan, ScanId, ScanLogEntry, ScanStatus};

const RESTART_MESSAGE: &str =
    "Le serveur d'analyse a redémarré pendant le scan. Vous pouvez relancer la même analyse.";
const FAILED_MESSAGE: &str = "L'analyse a échoué.";
const TIMEOUT_MESSAGE: &str =
    "L'analyse prend trop de temps. Réessayez plus tard ou lancez une nouvelle analyse.";

/// The single recovery offered by an error view.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecoveryAction {
    ReturnToSubmission,
    Resubmit { target_url: String, scan_type: String },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActiveView {
    pub scan_id: ScanId,
    pub status: ScanStatus,
    pub progress: u8,
    pub current_phase: Option<String>,
    pub logs: Vec<ScanLogEntry>,
    pub reconnecting: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletedView {
    pub scan_id: ScanId,
    pub risk_level: Option<RiskLevel>,
    pub badge: Option<String>,
    pub logs: Vec<ScanLogEntry>,
    pub report: ReportView,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailedView {
    pub scan_id: ScanId,
    pub reason: FailureReason,
    pub message: String,
    pub current_phase: Option<String>,
    pub logs: Vec<ScanLogEntry>,
    pub recovery: RecoveryAction,
}

/// What a viewer of the scan sees.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScanView {
    Loading,
    NotFound,
    Active(ActiveView),
    Completed(CompletedView),
    Failed(FailedView),
    TimedOut {
        message: String,
        recovery: RecoveryAction,
    },
}

impl ScanView {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScanView::Loading | ScanView::Active(_))
    }

    pub fn is_reconnecting(&self) -> bool {
        matches!(self, ScanView::Active(active) if active.reconnecting)
    }

    /// SSE event name for this view.
    pub fn event_name(&self) -> &'static str {
        match self {
            ScanView::Loading => "loading",
            ScanView::NotFound => "not_found",
            ScanView::Active(_) => "progress",
            ScanView::Completed(_) => "completed",
            ScanView::Failed(_) => "failed",
            ScanView::TimedOut { .. } => "timed_out",
        }
    }
}

pub struct ScanMonitor {
    api: Arc<dyn ScanApi>,
    credential: Credential,
    scan_id: ScanId,
    settings: PollSettings,
    scan: Option<Scan>,
    logs: Vec<ScanLogEntry>,
    consecutive_failures: u32,
    view: ScanView,
}

impl ScanMonitor {
    pub fn new(
        api: Arc<dyn ScanApi>,
        credential: Credential,
        scan_id: ScanId,
        settings: PollSettings,
    ) -> Self {
        Self {
            api,
            credential,
            scan_id,
            settings,
            scan: None,
            logs: Vec::new(),
            consecutive_failures: 0,
            view: ScanView::Loading,
        }
    }

    pub fn view(&self) -> &ScanView {
        &self.view
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Initial fetch. Never retried: a scan that cannot be loaded is NotFound.
    pub async fn load(&mut self) {
        match self.api.fetch_scan(&self.credential, &self.scan_id).await {
            Ok(Some(scan)) => {
                self.logs = scan.scan_logs.clone().unwrap_or_default();
                self.apply(scan);
            }
            Ok(None) => {
                tracing::info!("Scan {} not found", self.scan_id);
                self.view = ScanView::NotFound;
            }
            Err(e) => {
                tracing::warn!("Failed to load scan {}: {}", self.scan_id, e);
                self.view = ScanView::NotFound;
            }
        }
    }

    /// One poll tick: the scan record, then the full log feed.
    pub async fn poll_once(&mut self) {
        match self.api.fetch_scan(&self.credential, &self.scan_id).await {
            Ok(Some(scan)) => {
                self.consecutive_failures = 0;

                match self.api.fetch_logs(&self.credential, &self.scan_id).await {
                    Ok(logs) => self.logs = logs,
                    Err(e) => tracing::warn!(
                        "Failed to fetch logs for scan {}, keeping previous ones: {}",
                        self.scan_id,
                        e
                    ),
                }

                self.apply(scan);
            }
            Ok(None) => self.record_failure("scan missing from list response"),
            Err(e) => self.record_failure(&e.to_string()),
        }
    }

    fn record_failure(&mut self, error: &str) {
        self.consecutive_failures += 1;
        tracing::warn!(
            "Failed to poll scan {} (attempt {}): {}",
            self.scan_id,
            self.consecutive_failures,
            error
        );

        if self.consecutive_failures == self.settings.reconnect_threshold {
            tracing::warn!(
                "Scan {} unreachable for {} polls, reporting reconnecting",
                self.scan_id,
                self.consecutive_failures
            );
        }

        self.view = self.build_view();
    }

    fn apply(&mut self, mut scan: Scan) {
        if let Some(previous) = &self.scan {
            if !previous.status.can_advance_to(scan.status) {
                tracing::debug!(
                    "Ignoring status regression {} -> {} for scan {}",
                    previous.status.as_str(),
                    scan.status.as_str(),
                    self.scan_id
                );
                scan.status = previous.status;
            }
        }

        if scan.status.is_terminal() {
            tracing::info!(
                "Scan {} reached terminal status {}",
                self.scan_id,
                scan.status.as_str()
            );
        }

        self.scan = Some(scan);
        self.view = self.build_view();
    }

    fn build_view(&self) -> ScanView {
        let Some(scan) = &self.scan else {
            return self.view.clone();
        };

        match scan.status {
            ScanStatus::Pending | ScanStatus::Running => ScanView::Active(ActiveView {
                scan_id: scan.id.clone(),
                status: scan.status,
                progress: scan.progress,
                current_phase: scan.current_phase.clone(),
                logs: self.logs.clone(),
                reconnecting: self.consecutive_failures >= self.settings.reconnect_threshold,
            }),
            ScanStatus::Completed => ScanView::Completed(CompletedView {
                scan_id: scan.id.clone(),
                risk_level: scan.risk_level,
                badge: scan.risk_level.map(RiskLevel::badge),
                logs: self.logs.clone(),
                report: ReportView::for_scan(scan),
            }),
            ScanStatus::Failed => {
                let reason = scan.failure_reason();
                let (message, recovery) = match reason {
                    FailureReason::ServerRestart => (
                        RESTART_MESSAGE,
                        RecoveryAction::Resubmit {
                            target_url: scan.target_url.clone(),
                            scan_type: scan.scan_type.clone(),
                        },
                    ),
                    FailureReason::Generic => {
                        (FAILED_MESSAGE, RecoveryAction::ReturnToSubmission)
                    }
                };

                ScanView::Failed(FailedView {
                    scan_id: scan.id.clone(),
                    reason,
                    message: message.to_string(),
                    current_phase: scan.current_phase.clone(),
                    logs: self.logs.clone(),
                    recovery,
                })
            }
        }
    }

    fn time_out(&mut self) {
        tracing::warn!(
            "Scan {} still not finished after {:?}, giving up",
            self.scan_id,
            self.settings.timeout
        );
        self.view = ScanView::TimedOut {
            message: TIMEOUT_MESSAGE.to_string(),
            recovery: RecoveryAction::ReturnToSubmission,
        };
    }

    /// Drive the monitor to a terminal view, publishing every distinct view.
    ///
    /// Returns early when the receiver goes away; at most the request
    /// already in flight completes after that.
    pub async fn run(mut self, updates: mpsc::Sender<ScanView>) -> ScanView {
        self.load().await;
        if updates.send(self.view.clone()).await.is_err() || self.view.is_terminal() {
            return self.view;
        }

        let start = Instant::now();
        let deadline = start + self.settings.timeout;
        let mut ticker = tokio::time::interval_at(start + self.settings.interval, self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut published = self.view.clone();

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => self.time_out(),
                _ = ticker.tick() => {
                    if Instant::now() >= deadline {
                        self.time_out();
                    } else if tokio::time::timeout_at(deadline, self.poll_once()).await.is_err() {
                        self.time_out();
                    }
                }
                _ = updates.closed() => {
                    tracing::debug!("Viewer of scan {} went away, stopping", self.scan_id);
                    return self.view;
                }
            }

            if self.view != published {
                published = self.view.clone();
                if updates.send(published.clone()).await.is_err() {
                    break;
                }
            }

            if self.view.is_terminal() {
                break;
            }
        }

        self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientError, SubmittedScan};
    use crate::models::{CancelScanRequest, Role, SubmitScanRequest};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    enum Step {
        Scan(Scan),
        Missing,
        Down,
    }

    /// Replays a script of backend answers; once exhausted it reports `completed`.
    struct ScriptedApi {
        steps: Mutex<VecDeque<Step>>,
        scan_fetches: Mutex<u32>,
        log_fetches: Mutex<u32>,
        failing_log_fetches: Mutex<u32>,
    }

    impl ScriptedApi {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                scan_fetches: Mutex::new(0),
                log_fetches: Mutex::new(0),
                failing_log_fetches: Mutex::new(0),
            })
        }

        fn scan_fetches(&self) -> u32 {
            *self.scan_fetches.lock().unwrap()
        }
    }

    #[async_trait]
    impl ScanApi for ScriptedApi {
        async fn fetch_scan(
            &self,
            _credential: &Credential,
            id: &ScanId,
        ) -> Result<Option<Scan>, ClientError> {
            *self.scan_fetches.lock().unwrap() += 1;
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Scan(scan)) => Ok(Some(scan)),
                Some(Step::Missing) => Ok(None),
                Some(Step::Down) => Err(ClientError::Status {
                    status: 502,
                    detail: "Bad Gateway".into(),
                }),
                None => Ok(Some(scan(id.as_str(), "completed", 100, None))),
            }
        }

        async fn fetch_logs(
            &self,
            _credential: &Credential,
            _id: &ScanId,
        ) -> Result<Vec<ScanLogEntry>, ClientError> {
            let mut count = self.log_fetches.lock().unwrap();
            *count += 1;

            let mut failing = self.failing_log_fetches.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(ClientError::Decode("truncated log feed".into()));
            }
            Ok(vec![ScanLogEntry {
                timestamp: format!("t{}", count),
                level: "info".into(),
                message: format!("log {}", count),
                icon: None,
            }])
        }

        async fn cancel_scan(
            &self,
            _credential: &Credential,
            _id: &ScanId,
            _request: &CancelScanRequest,
        ) -> Result<(), ClientError> {
            Ok(())
        }

        async fn submit_scan(
            &self,
            _credential: &Credential,
            _request: &SubmitScanRequest,
        ) -> Result<SubmittedScan, ClientError> {
            Ok(SubmittedScan {
                id: ScanId::new("new"),
            })
        }
    }

    fn scan(id: &str, status: &str, progress: u8, phase: Option<&str>) -> Scan {
        let risk_level = if status == "completed" { Some("HIGH") } else { None };
        serde_json::from_value(json!({
            "id": id,
            "target_url": "https://www.example.fr",
            "scan_type": "full",
            "status": status,
            "progress": progress,
            "current_phase": phase,
            "risk_level": risk_level,
        }))
        .unwrap()
    }

    fn running(progress: u8) -> Step {
        Step::Scan(scan("s1", "running", progress, Some("Analyse des cookies")))
    }

    fn credential() -> Credential {
        Credential::from_parts(
            "token",
            crate::auth::BackendClaims {
                sub: "u1".into(),
                email: "dpo@example.fr".into(),
                role: Role::User,
                iat: 0,
                exp: i64::MAX,
            },
        )
    }

    fn monitor(api: Arc<ScriptedApi>) -> ScanMonitor {
        ScanMonitor::new(api, credential(), ScanId::new("s1"), PollSettings::default())
    }

    async fn run_to_end(api: Arc<ScriptedApi>) -> (Vec<ScanView>, ScanView) {
        let (tx, mut rx) = mpsc::channel(16);
        let handle = tokio::spawn(monitor(api).run(tx));
        let mut views = Vec::new();
        while let Some(view) = rx.recv().await {
            views.push(view);
        }
        (views, handle.await.unwrap())
    }

    #[tokio::test]
    async fn log_feed_failure_keeps_logs_and_is_not_a_failed_poll() {
        let api = ScriptedApi::new(vec![running(10), running(20), running(30)]);
        let mut monitor = monitor(api.clone());

        monitor.load().await;
        monitor.poll_once().await;
        let logs_before = match monitor.view() {
            ScanView::Active(active) => active.logs.clone(),
            other => panic!("expected active view, got {:?}", other),
        };
        assert_eq!(logs_before.len(), 1);

        *api.failing_log_fetches.lock().unwrap() = 1;
        monitor.poll_once().await;

        assert_eq!(monitor.consecutive_failures(), 0);
        match monitor.view() {
            ScanView::Active(active) => {
                assert_eq!(active.progress, 30);
                assert_eq!(active.logs, logs_before);
                assert!(!active.reconnecting);
            }
            other => panic!("expected active view, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_scan_is_not_found_without_retry() {
        let api = ScriptedApi::new(vec![Step::Missing]);
        let (views, last) = run_to_end(api.clone()).await;

        assert_eq!(last, ScanView::NotFound);
        assert_eq!(views, vec![ScanView::NotFound]);
        assert_eq!(api.scan_fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn load_error_is_terminal_not_found() {
        let api = ScriptedApi::new(vec![Step::Down]);
        let (_, last) = run_to_end(api.clone()).await;

        assert_eq!(last, ScanView::NotFound);
        assert_eq!(api.scan_fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn already_completed_scan_is_not_polled() {
        let api = ScriptedApi::new(vec![Step::Scan(scan("s1", "completed", 100, None))]);
        let (_, last) = run_to_end(api.clone()).await;

        assert!(matches!(last, ScanView::Completed(_)));
        assert_eq!(api.scan_fetches(), 1);
        assert_eq!(*api.log_fetches.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_then_completion_stops_polling() {
        let api = ScriptedApi::new(vec![
            Step::Scan(scan("s1", "pending", 0, None)),
            running(42),
            Step::Scan(scan("s1", "completed", 100, Some("Terminé"))),
            running(99),
        ]);
        let (views, last) = run_to_end(api.clone()).await;

        let active = views
            .iter()
            .find_map(|v| match v {
                ScanView::Active(a) if a.progress == 42 => Some(a.clone()),
                _ => None,
            })
            .expect("42% view");
        assert_eq!(active.current_phase.as_deref(), Some("Analyse des cookies"));
        assert!(!active.reconnecting);

        match last {
            ScanView::Completed(done) => {
                assert_eq!(done.risk_level, Some(RiskLevel::High));
                assert_eq!(done.badge.as_deref(), Some("Risque HIGH"));
                assert_eq!(done.logs[0].message, "log 2");
            }
            other => panic!("expected completed, got {:?}", other),
        }

        // load + two ticks; the scripted `running(99)` is never requested.
        assert_eq!(api.scan_fetches(), 3);
        assert_eq!(api.steps.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn two_failures_never_show_reconnecting() {
        let api = ScriptedApi::new(vec![
            running(10),
            Step::Down,
            Step::Down,
            running(20),
            Step::Down,
            running(30),
        ]);
        let (views, last) = run_to_end(api).await;

        assert!(views.iter().all(|v| !v.is_reconnecting()));
        assert!(matches!(last, ScanView::Completed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn three_failures_show_reconnecting_until_next_success() {
        let api = ScriptedApi::new(vec![
            running(10),
            Step::Down,
            Step::Down,
            Step::Missing,
            Step::Down,
            running(55),
        ]);
        let (views, last) = run_to_end(api).await;

        let first_reconnecting = views
            .iter()
            .position(ScanView::is_reconnecting)
            .expect("reconnecting view");
        let recovered = views
            .iter()
            .position(|v| matches!(v, ScanView::Active(a) if a.progress == 55))
            .expect("recovered view");

        assert!(first_reconnecting < recovered);
        assert!(!views[recovered].is_reconnecting());
        assert!(matches!(last, ScanView::Completed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnecting_is_reported_at_threshold() {
        let api = ScriptedApi::new(vec![running(5), Step::Down, Step::Down, Step::Down]);
        let mut monitor = monitor(api);

        monitor.load().await;
        monitor.poll_once().await;
        monitor.poll_once().await;
        assert!(!monitor.view().is_reconnecting());

        monitor.poll_once().await;
        assert_eq!(monitor.consecutive_failures(), 3);
        assert!(monitor.view().is_reconnecting());

        monitor.poll_once().await;
        assert_eq!(monitor.consecutive_failures(), 0);
        assert!(!monitor.view().is_reconnecting());
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_scan_times_out_and_stops_polling() {
        let steps = (0..1_000).map(|_| running(50)).collect();
        let api = ScriptedApi::new(steps);
        let started = Instant::now();

        let (views, last) = run_to_end(api.clone()).await;

        assert!(matches!(last, ScanView::TimedOut { .. }));
        assert!(matches!(views.last(), Some(ScanView::TimedOut { .. })));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(15 * 60));
        assert!(elapsed < Duration::from_secs(15 * 60 + 1));

        let fetched = api.scan_fetches();
        assert!(fetched <= 1 + 450, "polled {} times", fetched);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(api.scan_fetches(), fetched);
    }

    #[tokio::test(start_paused = true)]
    async fn backend_failure_is_terminal() {
        let api = ScriptedApi::new(vec![
            running(70),
            Step::Scan(scan("s1", "failed", 70, Some("Erreur navigateur"))),
        ]);
        let (_, last) = run_to_end(api.clone()).await;

        match last {
            ScanView::Failed(failed) => {
                assert_eq!(failed.reason, FailureReason::Generic);
                assert_eq!(failed.recovery, RecoveryAction::ReturnToSubmission);
            }
            other => panic!("expected failed, got {:?}", other),
        }
        assert_eq!(api.scan_fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn server_restart_offers_resubmission() {
        let mut failed = scan("s1", "failed", 30, Some("Scan interrompu"));
        failed.failure_code = Some("server_restart".into());
        let api = ScriptedApi::new(vec![running(30), Step::Scan(failed)]);

        let (_, last) = run_to_end(api).await;

        match last {
            ScanView::Failed(view) => {
                assert_eq!(view.reason, FailureReason::ServerRestart);
                assert_eq!(
                    view.recovery,
                    RecoveryAction::Resubmit {
                        target_url: "https://www.example.fr".into(),
                        scan_type: "full".into(),
                    }
                );
            }
            other => panic!("expected failed, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn status_regression_is_ignored() {
        let api = ScriptedApi::new(vec![
            running(40),
            Step::Scan(scan("s1", "pending", 45, None)),
        ]);
        let mut monitor = monitor(api);

        monitor.load().await;
        monitor.poll_once().await;

        match monitor.view() {
            ScanView::Active(active) => {
                assert_eq!(active.status, ScanStatus::Running);
                assert_eq!(active.progress, 45);
            }
            other => panic!("expected active, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_view_is_not_republished() {
        // Two failed polls leave the visible view untouched.
        let api = ScriptedApi::new(vec![running(10), Step::Down, Step::Down]);
        let (views, _) = run_to_end(api).await;

        assert_eq!(views.len(), 2);
        assert!(matches!(views[0], ScanView::Active(_)));
        assert!(matches!(views[1], ScanView::Completed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_viewer_stops_the_monitor() {
        let steps = (0..1_000).map(|_| running(50)).collect();
        let api = ScriptedApi::new(steps);
        let (tx, mut rx) = mpsc::channel(16);
        let handle = tokio::spawn(monitor(api.clone()).run(tx));

        assert!(matches!(rx.recv().await, Some(ScanView::Active(_))));
        drop(rx);

        let last = handle.await.unwrap();
        assert!(matches!(last, ScanView::Active(_)));
        assert!(api.scan_fetches() <= 3);
    }

    #[test]
    fn views_serialize_with_state_tag() {
        let value = serde_json::to_value(ScanView::TimedOut {
            message: "x".into(),
            recovery: RecoveryAction::ReturnToSubmission,
        })
        .unwrap();
        assert_eq!(value["state"], "timed_out");
        assert_eq!(value["recovery"]["action"], "return_to_submission");
    }
}
