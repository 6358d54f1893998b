use axum::{Json, extract::State};
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: ServiceStatus,
}

#[derive(Serialize)]
pub struct ServiceStatus {
    pub database: bool,
    pub redis: bool,
    pub compliance_api: bool,
    pub object_storage: bool,
}

#[derive(Serialize)]
pub struct PingResponse {
    pub status: &'static str,
}

/// Liveness probe. Touches no dependency.
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse { status: "ok" })
}

/// Full health check: database, Redis, the compliance API and the bucket.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut redis_conn = state.redis.clone();

    let (db_healthy, redis_healthy, api_healthy, storage_healthy) = tokio::join!(
        async { sqlx::query("SELECT 1").fetch_one(&state.db).await.is_ok() },
        async {
            redis::cmd("PING")
                .query_async::<String>(&mut redis_conn)
                .await
                .is_ok()
        },
        state.backend.ping(),
        state.storage.is_reachable(),
    );

    let all_healthy = db_healthy && redis_healthy && api_healthy && storage_healthy;

    Json(HealthResponse {
        status: if all_healthy {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        services: ServiceStatus {
            database: db_healthy,
            redis: redis_healthy,
            compliance_api: api_healthy,
            object_storage: storage_healthy,
        },
    })
}
