//! Prometheus scrape endpoint
//!
//! - `GET /metrics` - text exposition of all instruments
//! - `GET /health` - liveness check

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::metrics::PrometheusMetrics;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

pub fn router(metrics: Arc<PrometheusMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .route("/health", get(health))
        .with_state(metrics)
        .layer(TraceLayer::new_for_http())
}

/// Spawn the metrics server in a background task
///
/// Returns the address the server actually bound to.
pub async fn spawn_metrics_server(
    addr: SocketAddr,
    metrics: Arc<PrometheusMetrics>,
) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;

    info!("metrics server listening on {}", addr);

    let app = router(metrics);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("metrics server error: {}", e);
        }
    });

    Ok(addr)
}

async fn render_metrics(State(metrics): State<Arc<PrometheusMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("failed to render metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health() -> StatusCode {
    StatusCode::OK
}
