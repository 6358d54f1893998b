use redis::aio::ConnectionManager;
use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::TokenIssuer;
use crate::client::{BackendClient, ScanApi};
use crate::config::{Config, LoginLimits, PollSettings};
use crate::storage::ObjectStore;

pub mod auth;
pub mod compliance;
pub mod download;
pub mod events;
pub mod health;
pub mod report;
pub mod routes;
pub mod scan;

// ============================================
// Application State
// ============================================

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: ConnectionManager,
    pub tokens: Arc<TokenIssuer>,
    pub backend: BackendClient,
    /// Same backend as `backend`, behind the trait the scan monitor uses.
    pub scans: Arc<dyn ScanApi>,
    pub storage: Arc<dyn ObjectStore>,
    pub poll: PollSettings,
    pub login: LoginLimits,
}

impl AppState {
    pub fn new(
        config: &Config,
        db: PgPool,
        redis: ConnectionManager,
        backend: BackendClient,
        storage: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            db,
            redis,
            tokens: Arc::new(TokenIssuer::new(&config.jwt_secret)),
            scans: Arc::new(backend.clone()),
            backend,
            storage,
            poll: config.poll,
            login: config.login,
        }
    }
}
