use std::sync::Arc;

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use crate::bus::{EventBus, SubscriptionId};
use crate::classify::{categorize, locate_region, Category, Region};
use crate::credibility::CredibilityTable;
use crate::ingest::scheduler::IngestScheduler;
use crate::ingest::types::{NormalizedEvent, RawItem};
use crate::ingest::{assemble_event, event_id, normalize_text};
use crate::recent::{EventQuery, RecentEvents};

/// Publisher name for injected events that do not name one.
pub const DEFAULT_INJECT_SOURCE: &str = "CrisisPredict Intelligence";

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub default_limit: usize,
    pub max_limit: usize,
    pub ws_buffer: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 500,
            ws_buffer: 64,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub bus: Arc<EventBus>,
    pub recent: Arc<RecentEvents>,
    pub scheduler: Arc<IngestScheduler>,
    pub credibility: Arc<CredibilityTable>,
    pub limits: Limits,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/events", get(list_events).post(inject_event))
        .route("/api/events/stream", get(events_stream))
        .route("/api/ingest/run", post(run_tick_now))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let s = &state.scheduler;
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "data_ingestion": {
                "running": s.is_running(),
                "state": s.state(),
                "ticks": s.ticks(),
                "last_tick": s.last_tick(),
                "interval_secs": s.interval().as_secs(),
                "adapters": s.adapter_names(),
            },
            "event_bus": {
                "subscribers": state.bus.subscriber_count(),
            },
        },
    }))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
    #[serde(default)]
    offset: usize,
    category: Option<String>,
    region: Option<String>,
}

async fn list_events(
    State(state): State<AppState>,
    Query(p): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let category = match p.category.as_deref() {
        None | Some("") => None,
        Some(c) => Some(
            Category::parse(c).ok_or_else(|| ApiError::BadRequest(format!("unknown category '{c}'")))?,
        ),
    };
    let region = match p.region.as_deref() {
        None | Some("") => None,
        Some(r) => Some(
            Region::parse(r).ok_or_else(|| ApiError::BadRequest(format!("unknown region '{r}'")))?,
        ),
    };

    let limit = p
        .limit
        .unwrap_or(state.limits.default_limit)
        .min(state.limits.max_limit);

    let page = state.recent.query(&EventQuery {
        offset: p.offset,
        limit,
        category,
        region,
    });
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
struct InjectReq {
    #[serde(default)]
    headline: String,
    #[serde(default)]
    description: String,
    source: Option<String>,
    url: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    sentiment: Option<f64>,
}

/// Stand-in URL for injected events without one, so the id stays URL-derived.
fn injected_url(source: &str, headline: &str, ts: Option<DateTime<Utc>>) -> String {
    let key = match ts {
        Some(ts) => format!("{source}|{headline}|{}", ts.to_rfc3339()),
        None => format!("{source}|{headline}"),
    };
    format!("urn:crisis-ingest:injected:{}", event_id(&key))
}

fn build_injected(req: InjectReq, credibility: &CredibilityTable) -> Result<NormalizedEvent, ApiError> {
    let headline = normalize_text(&req.headline);
    let headline = headline.as_str();
    let description = normalize_text(&req.description);
    if headline.is_empty() {
        return Err(ApiError::BadRequest("headline must not be empty".into()));
    }
    let source = req
        .source
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_INJECT_SOURCE)
        .to_string();
    let url = req
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| injected_url(&source, headline, req.timestamp));

    let category = categorize(headline);
    let region = locate_region(&format!("{headline} {description}"));
    let score = credibility.score_for(&source);

    let item = RawItem {
        url,
        title: headline.to_string(),
        description,
        source,
        published_at: req.timestamp,
        sentiment: req.sentiment.filter(|s| s.is_finite()),
    };
    let mut ev = assemble_event(item, category, region, score);
    ev.synthetic = true;
    Ok(ev)
}

async fn inject_event(
    State(state): State<AppState>,
    payload: Result<Json<InjectReq>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let ev = build_injected(req, &state.credibility)?;
    let report = state.bus.publish(Arc::new(ev.clone()));
    tracing::info!(
        target: "api",
        event_id = %ev.id,
        category = %ev.category,
        region = %ev.region,
        delivered = report.delivered,
        failed = report.failed,
        "injected event"
    );
    Ok((StatusCode::CREATED, Json(ev)))
}

async fn run_tick_now(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.scheduler.run_tick().await;
    Json(report)
}

async fn events_stream(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

/// Subscribe a bounded queue to `bus`. A full or closed queue is reported
/// back to the bus as a delivery failure; the event is dropped for that client.
fn forward_to_channel(
    bus: &EventBus,
    capacity: usize,
) -> (SubscriptionId, mpsc::Receiver<Arc<NormalizedEvent>>) {
    let (tx, rx) = mpsc::channel::<Arc<NormalizedEvent>>(capacity.max(1));
    let sub = bus.subscribe("ws-client", move |ev| {
        tx.try_send(Arc::clone(ev))
            .map_err(|e| anyhow::anyhow!("ws client not keeping up: {e}"))
    });
    (sub, rx)
}

/// Forward every published event to one WebSocket client until it goes away.
async fn stream_events(mut socket: WebSocket, state: AppState) {
    let (sub, mut rx) = forward_to_channel(&state.bus, state.limits.ws_buffer);

    loop {
        tokio::select! {
            next = rx.recv() => {
                let Some(ev) = next else { break };
                let text = match serde_json::to_string(ev.as_ref()) {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::warn!(target: "api", error = %e, "event serialization failed");
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.bus.unsubscribe(sub);
    tracing::debug!(target: "api", "ws client disconnected");
}
