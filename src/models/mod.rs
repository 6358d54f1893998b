pub mod scan;
pub mod user;

pub use scan::{
    CancelScanRequest, FailureReason, RiskLevel, Scan, ScanId, ScanLogEntry, ScanStatus,
    ScanStatusPayload, SubmitScanRequest,
};
pub use user::{PublicUser, Role, User};
