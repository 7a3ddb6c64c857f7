//! HTTP surface: the single analysis page plus a small JSON API.
//!
//! Served with axum; CORS is wide open since the page and the API live on
//! the same loopback bind and tokens never transit this surface.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::corpus::{self, FeedbackBatch};
use crate::error::{LensError, Result};
use crate::insights::InsightRequester;
use crate::sections::{SECTION_KEYS, parse_sections};

const LATENCY_WINDOW: usize = 256;

/// Rolling request counters for the /metrics endpoint
#[derive(Debug, Default)]
pub struct HttpMetrics {
    pub total_requests: u64,
    pub errors_total: u64,
    pub last_request_unix: i64,
    latencies_ms: Vec<f64>,
}

impl HttpMetrics {
    fn record(&mut self, latency_ms: f64, is_error: bool) {
        self.total_requests += 1;
        if is_error {
            self.errors_total += 1;
        }
        self.last_request_unix = Utc::now().timestamp();
        if self.latencies_ms.len() >= LATENCY_WINDOW {
            self.latencies_ms.remove(0);
        }
        self.latencies_ms.push(latency_ms);
    }

    fn avg_latency_ms(&self) -> f64 {
        if self.latencies_ms.is_empty() {
            return 0.0;
        }
        self.latencies_ms.iter().sum::<f64>() / self.latencies_ms.len() as f64
    }

    fn p95_latency_ms(&self) -> f64 {
        if self.latencies_ms.is_empty() {
            return 0.0;
        }
        let mut sorted = self.latencies_ms.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((sorted.len() as f64) * 0.95).ceil() as usize;
        sorted[idx.saturating_sub(1).min(sorted.len() - 1)]
    }
}

#[derive(Clone)]
pub struct HttpState {
    pub config: Arc<Config>,
    pub requester: Arc<InsightRequester>,
    pub metrics: Arc<Mutex<HttpMetrics>>,
}

impl HttpState {
    pub fn new(config: Arc<Config>, requester: Arc<InsightRequester>) -> Self {
        Self {
            config,
            requester,
            metrics: Arc::new(Mutex::new(HttpMetrics::default())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub record_count: usize,
    pub columns: Vec<String>,
    pub preview: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct SectionBody {
    pub key: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub analysis_id: Uuid,
    pub analyzed_at: chrono::DateTime<Utc>,
    pub record_count: usize,
    pub model_used: Option<String>,
    pub fallback_used: bool,
    pub sections: Vec<SectionBody>,
    pub raw: String,
}

pub fn build_router(state: HttpState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/upload", post(upload_handler))
        .route("/api/analyze", post(analyze_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            track_metrics,
        ))
        .layer(cors)
        .with_state(state)
}

async fn track_metrics(
    State(state): State<HttpState>,
    request: axum::extract::Request,
    next: middleware::Next,
) -> axum::response::Response {
    let started = Instant::now();
    let response = next.run(request).await;
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
    let is_error = response.status().is_client_error() || response.status().is_server_error();
    state.metrics.lock().await.record(latency_ms, is_error);
    response
}

async fn index_handler() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn info_handler(State(state): State<HttpState>) -> Json<serde_json::Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "provider": state.config.runtime.provider,
        "configured": state.requester.is_configured(),
        "candidates": state.requester.candidates(),
        "max_tokens": state.config.analysis.max_tokens,
        "bind": state.config.server.http_bind.to_string(),
        "sections": SECTION_KEYS,
    }))
}

async fn metrics_handler(State(state): State<HttpState>) -> Json<serde_json::Value> {
    let metrics = state.metrics.lock().await;
    Json(json!({
        "total_requests": metrics.total_requests,
        "errors_total": metrics.errors_total,
        "last_request_unix": metrics.last_request_unix,
        "avg_latency_ms": metrics.avg_latency_ms(),
        "p95_latency_ms": metrics.p95_latency_ms(),
    }))
}

/// Validate a CSV body and return column/preview metadata without analyzing.
async fn upload_handler(
    State(state): State<HttpState>,
    body: String,
) -> Result<Json<UploadResponse>> {
    let batch = ingest(&state, &body)?;
    Ok(Json(UploadResponse {
        record_count: batch.record_count,
        columns: batch.columns,
        preview: batch.preview,
    }))
}

/// One full analysis run: ingest, join, request insights, split sections.
async fn analyze_handler(
    State(state): State<HttpState>,
    body: String,
) -> Result<Json<AnalyzeResponse>> {
    let batch = ingest(&state, &body)?;
    let corpus = corpus::build_corpus(&batch.feedback);
    info!(
        "Analyzing {} feedback records ({} corpus chars)",
        batch.record_count,
        corpus.len()
    );

    let insight = state.requester.request(&corpus).await;
    let parsed = parse_sections(&insight.text, &SECTION_KEYS);
    let sections = SECTION_KEYS
        .iter()
        .map(|key| SectionBody {
            key: key.to_string(),
            body: parsed.get(*key).cloned().unwrap_or_default(),
        })
        .collect();

    Ok(Json(AnalyzeResponse {
        analysis_id: Uuid::new_v4(),
        analyzed_at: Utc::now(),
        record_count: batch.record_count,
        model_used: insight.model_used,
        fallback_used: insight.fallback_used,
        sections,
        raw: insight.text,
    }))
}

fn ingest(state: &HttpState, body: &str) -> Result<FeedbackBatch> {
    if body.trim().is_empty() {
        return Err(LensError::validation("Request body must contain CSV data"));
    }
    corpus::parse_feedback_csv(body, state.config.runtime.preview_rows)
}

/// Bind the configured address and serve until shutdown.
pub async fn start_http_server(config: Arc<Config>, requester: Arc<InsightRequester>) -> Result<()> {
    let bind = config.server.http_bind;
    let state = HttpState::new(config, requester);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind).await.map_err(|e| {
        warn!("Failed to bind HTTP listener on {}: {}", bind, e);
        LensError::Internal {
            message: format!("Failed to bind {}: {}", bind, e),
        }
    })?;
    info!("HTTP server listening on http://{}", bind);

    axum::serve(listener, router)
        .await
        .map_err(|e| LensError::Internal {
            message: format!("HTTP server error: {}", e),
        })?;
    Ok(())
}
