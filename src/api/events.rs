// ============================================
// Server-Sent Events for scan progress
// ============================================
//
// `GET /v1/scans/{scan_id}/events` spawns one ScanMonitor per connection
// and streams every distinct view it publishes. The stream ends after the
// first terminal view; a disconnected viewer stops the monitor.
//
// Browser EventSource cannot set headers, so the endpoint also accepts a
// one-time `?ticket=` obtained from `POST /v1/scans/events/ticket`. Raw
// bearer tokens are never accepted in the query string.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::stream::Stream;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::AppState;
use crate::auth::Credential;
use crate::error::AppError;
use crate::middleware::{bearer_token, require_credential_from_headers};
use crate::models::ScanId;
use crate::scan::{ScanMonitor, ScanView};

/// Tickets expire after this many seconds even if not redeemed.
const SSE_TICKET_TTL_SECS: u64 = 30;

const SSE_TICKET_PREFIX: &str = "scan_sse_ticket:";

/// Views buffered between the monitor task and the HTTP stream.
const VIEW_BUFFER: usize = 16;

// ============================================
// SSE Stream wrapper
// ============================================

struct ScanViewStream {
    rx: mpsc::Receiver<ScanView>,
}

impl Stream for ScanViewStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(view)) => Poll::Ready(Some(Ok(view_event(&view)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

fn view_event(view: &ScanView) -> Event {
    let data = serde_json::to_string(view).unwrap_or_else(|e| {
        tracing::error!("Failed to serialize scan view: {}", e);
        "{}".to_string()
    });
    Event::default().event(view.event_name()).data(data)
}

#[derive(Debug, Deserialize)]
pub struct SseQueryParams {
    pub ticket: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SseTicketResponse {
    pub ticket: String,
    pub expires_in: u64,
}

// ============================================
// Tickets
// ============================================

/// Create a short-lived, single-use ticket for the scan event stream.
///
/// **Auth: Session Required**
pub async fn create_sse_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SseTicketResponse>, AppError> {
    let credential = require_credential_from_headers(&state.tokens, &headers)?;

    let ticket = Uuid::new_v4().to_string();
    let key = format!("{}{}", SSE_TICKET_PREFIX, ticket);
    let mut redis = state.redis.clone();

    redis
        .set_ex::<_, _, ()>(&key, credential.token(), SSE_TICKET_TTL_SECS)
        .await?;

    tracing::debug!(
        "SSE ticket created for user={}, expires in {}s",
        credential.user_id(),
        SSE_TICKET_TTL_SECS
    );

    Ok(Json(SseTicketResponse {
        ticket,
        expires_in: SSE_TICKET_TTL_SECS,
    }))
}

/// Redeem a ticket. GETDEL makes it single-use.
async fn redeem_sse_ticket(state: &AppState, ticket: &str) -> Result<Credential, AppError> {
    let key = format!("{}{}", SSE_TICKET_PREFIX, ticket);
    let mut redis = state.redis.clone();

    let token: Option<String> = redis::cmd("GETDEL")
        .arg(&key)
        .query_async(&mut redis)
        .await?;

    let token =
        token.ok_or_else(|| AppError::Unauthorized("Invalid or expired SSE ticket".into()))?;

    state
        .tokens
        .verify(&token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))
}

// ============================================
// SSE Handler
// ============================================

/// Stream the monitor views of one scan.
///
/// **Auth: Session Required** (`?ticket=` or `Authorization: Bearer`)
///
/// ## Event Types:
/// - `loading`, `progress` while the scan runs
/// - `not_found`, `completed`, `failed`, `timed_out` end the stream
pub async fn scan_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(scan_id): Path<String>,
    Query(query): Query<SseQueryParams>,
) -> Result<Response, AppError> {
    let credential = match query.ticket.as_deref().filter(|t| !t.is_empty()) {
        Some(ticket) => redeem_sse_ticket(&state, ticket).await?,
        None if bearer_token(&headers).is_some() => {
            require_credential_from_headers(&state.tokens, &headers)?
        }
        None => {
            return Err(AppError::Unauthorized(
                "Authentication required. Use ?ticket= or an Authorization header.".into(),
            ));
        }
    };

    let scan_id = ScanId::new(scan_id);
    tracing::info!(
        "SSE client connected for scan {} (user={})",
        scan_id,
        credential.user_id()
    );

    let (tx, rx) = mpsc::channel::<ScanView>(VIEW_BUFFER);
    let monitor = ScanMonitor::new(state.scans.clone(), credential, scan_id.clone(), state.poll);

    tokio::spawn(async move {
        let last = monitor.run(tx).await;
        tracing::debug!(
            "Scan monitor for {} finished in state {}",
            scan_id,
            last.event_name()
        );
    });

    let sse = Sse::new(ScanViewStream { rx }).keep_alive(KeepAlive::default());
    Ok(sse.into_response())
}
