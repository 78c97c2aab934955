//! HTTP handlers. Each one delegates to the relay or a proxy.

use axum::{
    body::Body,
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        Query, State,
    },
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use log::warn;
use serde::{Deserialize, Serialize};

use super::error::GatewayError;
use super::state::AppState;
use crate::candidate_registry::CandidateReport;
use crate::metrics;
use crate::opensky_proxy::StatesQuery;
use crate::proxy::{ProxyError, ProxyResponse};
use crate::types::{HealthReport, Snapshot};

pub type HandlerResult<T> = Result<T, GatewayError>;

// =============================================================================
// Downstream fanout
// =============================================================================

/// GET /
///
/// Upgrades to a WebSocket that receives every raw upstream frame.
/// Plain requests get a JSON 426.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> HandlerResult<Response> {
    let ws = ws.map_err(|e| GatewayError::UpgradeRequired(e.body_text()))?;
    state.relay.ensure_upstream();
    Ok(ws.on_upgrade(move |socket| async move {
        state.relay.fanout().serve_client(socket).await;
    }))
}

// =============================================================================
// Health & snapshot
// =============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.relay.health().await)
}

#[derive(Debug, Default, Deserialize)]
pub struct SnapshotQuery {
    pub candidates: Option<String>,
}

impl SnapshotQuery {
    fn wants_candidates(&self) -> bool {
        matches!(self.candidates.as_deref(), Some("true") | Some("1"))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotBody<'a> {
    #[serde(flatten)]
    snapshot: &'a Snapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidate_reports: Option<Vec<CandidateReport>>,
}

/// GET /ais/snapshot?candidates=bool
///
/// Starts the upstream connection if it is not running yet.
pub async fn snapshot(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> Response {
    state.relay.ensure_upstream();

    let snapshot = state.relay.snapshot().await;
    let candidate_reports = if query.wants_candidates() {
        Some(state.relay.candidate_reports().await)
    } else {
        None
    };

    (
        [(CACHE_CONTROL, "public, max-age=2")],
        Json(SnapshotBody {
            snapshot: snapshot.as_ref(),
            candidate_reports,
        }),
    )
        .into_response()
}

// =============================================================================
// Proxies
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct RssQuery {
    pub url: Option<String>,
}

/// GET /rss?url=
pub async fn rss(
    State(state): State<AppState>,
    Query(query): Query<RssQuery>,
) -> HandlerResult<Response> {
    let url = query.url.ok_or(ProxyError::MissingParameter("url"))?;
    let result = state.feeds.fetch(&url).await;
    let upstream = track("rss", result)?;
    Ok(echo(upstream, "application/xml", Some("public, max-age=300")))
}

/// GET /opensky?lamin&lomin&lamax&lomax
pub async fn opensky(
    State(state): State<AppState>,
    Query(query): Query<StatesQuery>,
) -> HandlerResult<Response> {
    let result = state.opensky.fetch_states(&query).await;
    let upstream = track("opensky", result)?;
    Ok(echo(upstream, "application/json", None))
}

/// Fallback for unknown routes.
pub async fn not_found() -> GatewayError {
    GatewayError::NotFound
}

fn track(
    route: &'static str,
    result: Result<ProxyResponse, ProxyError>,
) -> Result<ProxyResponse, ProxyError> {
    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => {
            warn!("⚠️ [{}] {}", route, e);
            e.outcome()
        }
    };
    metrics::increment_proxy_request(route, outcome);
    result
}

fn echo(upstream: ProxyResponse, content_type: &'static str, cache: Option<&'static str>) -> Response {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = (status, [(CONTENT_TYPE, content_type)], Body::from(upstream.body))
        .into_response();
    if let Some(cache) = cache {
        response
            .headers_mut()
            .insert(CACHE_CONTROL, axum::http::HeaderValue::from_static(cache));
    }
    response
}
