//! HTTP API: reply webhook, scheduler status and health.
//!
//! Spawned next to the scheduler by `confirma start`.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use confirma_core::{appointment::ReplyEvent, config::ApiConfig, error::ConfirmaError};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{error, info, warn};

use crate::engine::Engine;
use crate::scheduler::Scheduler;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-signature";
const MAX_BODY_BYTES: usize = 64 * 1024;

type ApiError = (StatusCode, Json<Value>);

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    engine: Arc<Engine>,
    scheduler: Arc<Scheduler>,
    webhook_secret: Option<String>,
    uptime: Instant,
}

impl ApiState {
    pub fn new(engine: Arc<Engine>, scheduler: Arc<Scheduler>, config: &ApiConfig) -> Self {
        let secret = config.webhook_secret.trim();
        Self {
            engine,
            scheduler,
            webhook_secret: (!secret.is_empty()).then(|| secret.to_string()),
            uptime: Instant::now(),
        }
    }
}

/// An id or code that senders deliver either as a JSON number or a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Loose {
    Number(i64),
    Text(String),
}

impl Loose {
    fn into_text(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

/// Reply webhook body. Accepts the gateway flow's Portuguese field names.
#[derive(Debug, Deserialize)]
struct ReplyRequest {
    #[serde(default, alias = "telefone")]
    phone: Option<Loose>,
    #[serde(rename = "replyCode", alias = "reply_code", alias = "resposta")]
    reply_code: Loose,
    #[serde(
        default,
        rename = "sequenceNumber",
        alias = "sequence_number",
        alias = "nr_sequencia"
    )]
    sequence_number: Option<Loose>,
    #[serde(
        default,
        rename = "scheduleKey",
        alias = "schedule_key",
        alias = "cd_agenda"
    )]
    schedule_key: Option<Loose>,
}

fn parse_id(field: &str, value: Option<Loose>) -> Result<Option<i64>, ApiError> {
    match value {
        None => Ok(None),
        Some(Loose::Number(n)) => Ok(Some(n)),
        Some(Loose::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Loose::Text(s)) => s.trim().parse().map(Some).map_err(|_| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("{field} must be an integer, got '{s}'")})),
            )
        }),
    }
}

impl ReplyRequest {
    fn into_event(self) -> Result<ReplyEvent, ApiError> {
        Ok(ReplyEvent {
            phone: self.phone.map(Loose::into_text).unwrap_or_default(),
            reply_code: self.reply_code.into_text(),
            sequence_number: parse_id("sequenceNumber", self.sequence_number)?,
            schedule_key: parse_id("scheduleKey", self.schedule_key)?,
        })
    }
}

/// Constant-time string comparison for signature checks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Check the HMAC-SHA256 body signature. `None` when accepted.
fn check_signature(
    headers: &HeaderMap,
    body: &[u8],
    secret: &Option<String>,
) -> Option<ApiError> {
    let secret = secret.as_ref()?;

    let Some(header) = headers.get(SIGNATURE_HEADER) else {
        return Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "missing X-Signature header"})),
        ));
    };
    let Ok(value) = header.to_str() else {
        return Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid X-Signature header"})),
        ));
    };
    let given = value.trim();
    let given = given.strip_prefix("sha256=").unwrap_or(given).to_ascii_lowercase();

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(e) => {
            error!("webhook: cannot key HMAC: {e}");
            return Some((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "signature verification unavailable"})),
            ));
        }
    };
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    if constant_time_eq(&given, &expected) {
        None
    } else {
        Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid signature"})),
        ))
    }
}

fn error_status(e: &ConfirmaError) -> StatusCode {
    match e {
        ConfirmaError::Validation(_) => StatusCode::BAD_REQUEST,
        ConfirmaError::Unresolved(_) => StatusCode::NOT_FOUND,
        ConfirmaError::AmbiguousResolution(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `POST /webhook/reply`: fold a patient reply into the agenda.
async fn webhook_reply(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if let Some(err) = check_signature(&headers, &body, &state.webhook_secret) {
        warn!("webhook: rejected reply, bad signature");
        return Err(err);
    }

    let request: ReplyRequest = serde_json::from_slice(&body).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": format!("invalid reply body: {e}")})),
        )
    })?;
    let event = request.into_event()?;

    match state.engine.reconcile(&event).await {
        Ok(result) if result.is_partial_failure() => Ok((
            StatusCode::BAD_GATEWAY,
            Json(json!({"status": "partial", "result": result})),
        )),
        Ok(result) => Ok((
            StatusCode::OK,
            Json(json!({"status": "ok", "result": result})),
        )),
        Err(e) => {
            let status = error_status(&e);
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!("webhook: reconcile failed: {e}");
            }
            Err((status, Json(json!({"error": e.to_string()}))))
        }
    }
}

/// `GET /scheduler/status`
async fn scheduler_status(State(state): State<ApiState>) -> Json<Value> {
    Json(json!(state.scheduler.status().await))
}

/// `GET /health`: liveness plus Dedupe Store statistics.
async fn health(State(state): State<ApiState>) -> (StatusCode, Json<Value>) {
    let uptime_secs = state.uptime.elapsed().as_secs();
    let stats = async {
        let store = state.engine.store().stats().await?;
        let replies = state.engine.audit().counts().await?;
        Ok::<_, ConfirmaError>((store, replies))
    };
    match stats.await {
        Ok((store, replies)) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "uptime_secs": uptime_secs,
                "store": store,
                "replies": replies,
            })),
        ),
        Err(e) => {
            warn!("health: store unavailable: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "uptime_secs": uptime_secs,
                    "error": e.to_string(),
                })),
            )
        }
    }
}

/// Build the axum router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/webhook/reply", post(webhook_reply))
        .route("/scheduler/status", get(scheduler_status))
        .route("/health", get(health))
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Serve the API until `shutdown` resolves.
pub async fn serve(
    config: &ApiConfig,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) {
    if state.webhook_secret.is_none() {
        warn!("webhook: no secret configured, reply signatures are not verified");
    }

    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("API server failed to bind to {addr}: {e}");
            return;
        }
    };

    info!("API server listening on {addr}");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!("API server error: {e}");
    }
}
