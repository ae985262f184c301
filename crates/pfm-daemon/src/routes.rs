//! Axum router and all HTTP handlers for pfm-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Tests compose the bare router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use pfm_reconcile::{AdjustmentResult, ErrorKind, ReconcileCommand, ReconcileError, UserId};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    api_types::{
        ErrorBody, HealthResponse, ReconcileRequest, StatusResponse, RESET_SECRET_HEADER,
        USER_ID_HEADER,
    },
    state::{uptime_secs, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/cards/normalize", post(normalize_cards))
        .route("/v1/cards/:card_id/available", get(card_available))
        .route("/v1/cards/:card_id/reconcile", post(card_reconcile))
        .route("/v1/vouchers/reset", post(voucher_reset))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error response: status code plus `{kind, message}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: status_for(kind),
            body: ErrorBody::new(kind, message),
        }
    }

    fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            body: ErrorBody {
                kind: "FORBIDDEN".to_string(),
                message: message.into(),
            },
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::StorageFailure => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::SkippedGuard => StatusCode::CONFLICT,
    }
}

impl From<ReconcileError> for ApiError {
    fn from(e: ReconcileError) -> Self {
        if e.kind() == ErrorKind::StorageFailure {
            warn!(error = %e, "storage failure surfaced to HTTP caller");
        }
        ApiError::new(e.kind(), e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError::new(ErrorKind::InvalidInput, r.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(r: PathRejection) -> Self {
        ApiError::new(ErrorKind::InvalidInput, r.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Request guards
// ---------------------------------------------------------------------------

fn caller_from(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ApiError::new(ErrorKind::Unauthorized, format!("missing {USER_ID_HEADER} header"))
        })?;
    Uuid::parse_str(raw.trim()).map_err(|_| {
        ApiError::new(ErrorKind::Unauthorized, format!("malformed {USER_ID_HEADER} header"))
    })
}

/// Plain comparison against the configured secret; no secret means closed.
fn require_trigger_secret(st: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = st.reset_secret.as_deref() else {
        return Err(ApiError::forbidden(
            "manual trigger disabled: no reset secret configured",
        ));
    };
    let presented = headers
        .get(RESET_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if presented != expected {
        return Err(ApiError::new(
            ErrorKind::Unauthorized,
            format!("missing or wrong {RESET_SECRET_HEADER} header"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> ApiResult<StatusResponse> {
    let scheduler = st.engine.scheduler.status().await?;
    Ok(Json(StatusResponse {
        daemon_uptime_secs: uptime_secs(),
        config_hash: st.config_hash.clone(),
        timezone: st.engine.calendar.timezone().name().to_string(),
        manual_reset_enabled: st.reset_secret.is_some(),
        scheduler,
    }))
}

// ---------------------------------------------------------------------------
// GET /v1/cards/{card_id}/available
// ---------------------------------------------------------------------------

pub(crate) async fn card_available(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    card_id: Result<Path<Uuid>, PathRejection>,
) -> Response {
    let result = async {
        let Path(card_id) = card_id?;
        let caller = caller_from(&headers)?;
        let report = st
            .engine
            .reconciler
            .available_for(caller, card_id, st.now())
            .await?;
        Ok::<_, ApiError>(Json(report))
    }
    .await;
    result.into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/cards/{card_id}/reconcile
// ---------------------------------------------------------------------------

pub(crate) async fn card_reconcile(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    card_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ReconcileRequest>, JsonRejection>,
) -> Response {
    let result = async {
        let Path(card_id) = card_id?;
        let caller = caller_from(&headers)?;
        let Json(req) = body?;

        let cmd = ReconcileCommand {
            caller,
            card_id,
            declared_available: req.declared_available,
        };
        let result = st.engine.emitter.reconcile(&cmd, st.now()).await?;

        if let AdjustmentResult::Adjusted {
            entry,
            drift,
            available,
            ..
        } = &result
        {
            let _ = st.bus.send(BusMsg::Adjustment {
                card_id,
                entry_id: entry.id,
                drift: *drift,
                available: *available,
            });
        }
        Ok::<_, ApiError>(Json(result))
    }
    .await;
    result.into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/vouchers/reset
// ---------------------------------------------------------------------------

/// Manual trigger. A guarded skip is a normal 200 with `"outcome": "skipped"`.
pub(crate) async fn voucher_reset(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let result = async {
        require_trigger_secret(&st, &headers)?;
        info!("vouchers/reset (manual)");
        let outcome = st.run_reset("manual").await?;
        Ok::<_, ApiError>(Json(outcome))
    }
    .await;
    result.into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/cards/normalize
// ---------------------------------------------------------------------------

pub(crate) async fn normalize_cards(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let result = async {
        require_trigger_secret(&st, &headers)?;
        let report = st.engine.normalizer.normalize_all().await?;
        info!(
            scanned = report.scanned,
            reclassified = report.reclassified.len(),
            failures = report.failures.len(),
            "cards/normalize"
        );
        Ok::<_, ApiError>(Json(report))
    }
    .await;
    result.into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
