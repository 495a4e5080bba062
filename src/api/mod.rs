//! HTTP boundary for page-side injectors and tooling.

use crate::config::Config;
use crate::engine::StylingEngine;
use crate::stats::StatsCollector;
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use url::Url;

struct ApiState {
    engine: Arc<StylingEngine>,
    stats: Arc<StatsCollector>,
    config: Config,
    refresh_sender: Sender<()>,
}

pub fn router(
    engine: Arc<StylingEngine>,
    stats: Arc<StatsCollector>,
    config: Config,
    refresh_sender: Sender<()>,
) -> Router {
    let state = Arc::new(ApiState {
        engine,
        stats,
        config,
        refresh_sender,
    });

    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/css", get(get_css))
        .route("/api/stats", get(get_stats))
        .route("/api/config", get(get_config))
        .route("/api/refresh", post(trigger_refresh))
        .with_state(state)
}

pub async fn start_api_server(router: Router, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API listener on {}", addr))?;
    tracing::info!("API Server listening on http://{}", addr);

    axum::serve(listener, router)
        .await
        .context("API server terminated")
}

#[derive(Debug, Default, Deserialize)]
pub struct TargetQuery {
    pub host: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TargetError {
    Missing,
    InvalidUrl(String),
    UnsupportedScheme(String),
}

impl IntoResponse for TargetError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            TargetError::Missing => (
                StatusCode::BAD_REQUEST,
                "expected a 'host' or 'url' query parameter".to_string(),
            ),
            TargetError::InvalidUrl(e) => (StatusCode::BAD_REQUEST, format!("invalid url: {}", e)),
            TargetError::UnsupportedScheme(scheme) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("scheme '{}' is never styled", scheme),
            ),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl TargetQuery {
    /// Hostname to resolve. `url` wins over `host` when both are given.
    pub fn hostname(&self) -> Result<String, TargetError> {
        if let Some(raw) = &self.url {
            let url = Url::parse(raw).map_err(|e| TargetError::InvalidUrl(e.to_string()))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(TargetError::UnsupportedScheme(url.scheme().to_string()));
            }
            return url
                .host_str()
                .map(str::to_string)
                .ok_or_else(|| TargetError::InvalidUrl("url has no host".to_string()));
        }

        let host = self
            .host
            .as_deref()
            .map(|h| h.trim().trim_end_matches('.').to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .ok_or(TargetError::Missing)?;
        Ok(host)
    }
}

async fn get_state(
    State(state): State<Arc<ApiState>>,
    Query(target): Query<TargetQuery>,
) -> Response {
    match target.hostname() {
        Ok(host) => Json(state.engine.determine_styling_state(&host).await).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_css(State(state): State<Arc<ApiState>>, Query(target): Query<TargetQuery>) -> Response {
    let host = match target.hostname() {
        Ok(host) => host,
        Err(e) => return e.into_response(),
    };

    match state.engine.resolve_css_for(&host).await {
        Some(css) => (
            [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
            css.to_string(),
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn get_stats(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.stats.get_snapshot())
}

async fn get_config(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.config.clone())
}

async fn trigger_refresh(State(state): State<Arc<ApiState>>) -> Response {
    match state.refresh_sender.send(()).await {
        Ok(()) => Json(serde_json::json!({ "status": "refresh_triggered" })).into_response(),
        Err(_) => {
            tracing::error!("Refresh requested but the catalog updater is not running");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": "catalog updater is not running" })),
            )
                .into_response()
        }
    }
}
