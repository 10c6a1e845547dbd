//! JSON-over-HTTP surface for a rendering client.
//!
//! Handlers only translate requests into [`SessionEvent`]s and snapshots into
//! responses. Commands answer `202 Accepted` once the event is queued; the
//! effect is visible in the next `/api/view`.

use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use eia_client::domain::{LiveGenerationSample, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    aggregate::AggregateSummary,
    export::{self, ExportError},
    filter::FilterCriteria,
    geometry::Polygon,
    view::{LoadProgress, PolygonPhase, SessionClosed, SessionEvent, SessionHandle, ViewSnapshot},
};

const DEFAULT_RECORD_LIMIT: usize = 500;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Closed(#[from] SessionClosed),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Closed(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        metrics::counter!("http_errors_total", "status" => status.as_str().to_string()).increment(1);
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(session: SessionHandle) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/view", get(view))
        .route("/api/records", get(records))
        .route("/api/records/:id/select", post(select_record))
        .route("/api/criteria", put(set_criteria))
        .route("/api/polygon", post(draw_polygon).delete(clear_polygon))
        .route("/api/refresh", post(refresh))
        .route("/api/auto-refresh", put(auto_refresh))
        .route("/api/reload", post(reload))
        .route("/api/export.csv", get(export_csv))
        .route("/api/export.json", get(export_json))
        .with_state(session)
}

/// Serve the router on `bind_addr` until the listener fails.
pub async fn serve(session: SessionHandle, bind_addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid http.bind_addr {bind_addr}: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP surface listening");
    axum::serve(listener, router(session)).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Serialize)]
struct ViewBody<'a> {
    loaded_count: usize,
    filtered_count: usize,
    polygon_count: usize,
    summary: &'a AggregateSummary,
    polygon_summary: Option<&'a AggregateSummary>,
    criteria: &'a FilterCriteria,
    phase: PolygonPhase,
    polygon: Option<&'a Polygon>,
    selected: Option<&'a Record>,
    live_samples: &'a [LiveGenerationSample],
    status: &'a str,
    progress: &'a LoadProgress,
    auto_refresh: bool,
}

impl<'a> From<&'a ViewSnapshot> for ViewBody<'a> {
    fn from(s: &'a ViewSnapshot) -> Self {
        Self {
            loaded_count: s.loaded_count,
            filtered_count: s.filtered.len(),
            polygon_count: s.polygon_records.len(),
            summary: &s.summary,
            polygon_summary: s.polygon_summary.as_deref(),
            criteria: &s.criteria,
            phase: s.phase,
            polygon: s.polygon.as_ref(),
            selected: s.selected.as_ref(),
            live_samples: &s.live_samples,
            status: &s.loading_status,
            progress: &s.progress,
            auto_refresh: s.auto_refresh,
        }
    }
}

async fn view(State(session): State<SessionHandle>) -> Response {
    let snapshot = session.snapshot();
    Json(ViewBody::from(snapshot.as_ref())).into_response()
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Scope {
    #[default]
    Filtered,
    Polygon,
}

impl Scope {
    fn select(self, snapshot: &ViewSnapshot) -> &[Record] {
        match self {
            Self::Filtered => &snapshot.filtered,
            Self::Polygon => &snapshot.polygon_records,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecordsQuery {
    #[serde(default)]
    scope: Scope,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct RecordsBody<'a> {
    total: usize,
    records: &'a [Record],
}

async fn records(State(session): State<SessionHandle>, Query(q): Query<RecordsQuery>) -> Response {
    let snapshot = session.snapshot();
    let all = q.scope.select(&snapshot);
    let limit = q.limit.unwrap_or(DEFAULT_RECORD_LIMIT).min(all.len());
    Json(RecordsBody {
        total: all.len(),
        records: &all[..limit],
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
struct ExportQuery {
    #[serde(default)]
    scope: Scope,
}

async fn export_csv(
    State(session): State<SessionHandle>,
    Query(q): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let snapshot = session.snapshot();
    let mut body = Vec::new();
    let rows = export::write_csv(q.scope.select(&snapshot), &mut body)?;
    tracing::debug!(rows, "exported records as CSV");
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body).into_response())
}

async fn export_json(
    State(session): State<SessionHandle>,
    Query(q): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let snapshot = session.snapshot();
    let mut body = Vec::new();
    let rows = export::write_json(q.scope.select(&snapshot), &mut body)?;
    tracing::debug!(rows, "exported records as JSON");
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// Form fields arrive as raw text; numbers are accepted too.
#[derive(Debug, Default, Deserialize)]
struct CriteriaBody {
    source: Option<Value>,
    min_capacity: Option<Value>,
    states: Option<Value>,
}

fn raw_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

async fn set_criteria(State(session): State<SessionHandle>, body: Bytes) -> Result<StatusCode, ApiError> {
    let body: CriteriaBody = serde_json::from_slice(&body).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "unreadable criteria body, clearing criteria");
        CriteriaBody::default()
    });
    let source = raw_text(body.source.as_ref());
    let min_capacity = raw_text(body.min_capacity.as_ref());
    let states = raw_text(body.states.as_ref());
    let criteria = FilterCriteria::from_raw(source.as_deref(), min_capacity.as_deref(), states.as_deref());

    session.send(SessionEvent::CriteriaChanged(criteria)).await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
struct PolygonBody {
    coordinates: Vec<[f64; 2]>,
}

/// An unreadable polygon clears any active one.
async fn draw_polygon(State(session): State<SessionHandle>, body: Bytes) -> Result<StatusCode, ApiError> {
    let event = match serde_json::from_slice::<PolygonBody>(&body) {
        Ok(body) => SessionEvent::PolygonDrawn(Polygon::new(
            body.coordinates.into_iter().map(|[lat, lon]| (lat, lon)).collect(),
        )),
        Err(e) => {
            tracing::warn!(error = %e, "unreadable polygon body, clearing polygon");
            SessionEvent::PolygonCleared
        }
    };
    session.send(event).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn clear_polygon(State(session): State<SessionHandle>) -> Result<StatusCode, ApiError> {
    session.send(SessionEvent::PolygonCleared).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn select_record(State(session): State<SessionHandle>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    session.send(SessionEvent::RecordSelected(id)).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn refresh(State(session): State<SessionHandle>) -> Result<StatusCode, ApiError> {
    session.send(SessionEvent::RefreshRequested).await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
struct AutoRefreshBody {
    enabled: bool,
}

async fn auto_refresh(
    State(session): State<SessionHandle>,
    Json(body): Json<AutoRefreshBody>,
) -> Result<StatusCode, ApiError> {
    session.send(SessionEvent::AutoRefreshToggled(body.enabled)).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn reload(State(session): State<SessionHandle>) -> Result<StatusCode, ApiError> {
    session.send(SessionEvent::ReloadRequested).await?;
    Ok(StatusCode::ACCEPTED)
}
