use anyhow::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct MetricsState {
    pub registry: Arc<super::MetricsRegistry>,
}

/// Spawn the metrics endpoint on localhost only.
pub async fn spawn_metrics_server(
    registry: Arc<super::MetricsRegistry>,
    port: u16,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(MetricsState {
            registry: Arc::clone(&registry),
        });

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind metrics server on port {}: {}", port, e))?;

    tracing::info!("Metrics server listening on http://127.0.0.1:{}", port);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    Ok(handle)
}

async fn metrics_handler(State(state): State<MetricsState>) -> Response {
    match render_metrics(&state.registry.registry) {
        Ok(output) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            output,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to render metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to gather metrics: {}", e),
            )
                .into_response()
        }
    }
}

fn render_metrics(registry: &prometheus::Registry) -> Result<String> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = registry.gather();
    let output = encoder.encode_to_string(&metric_families)?;
    Ok(output)
}
