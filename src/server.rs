//! HTTP surface: event intake, health, and search.

use crate::events::{EventDispatcher, EventKind};
use crate::ingest::IngestPipeline;
use crate::model::Event;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestPipeline>,
    pub dispatcher: Arc<EventDispatcher>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/events", post(events_handler))
        .route("/health", get(health_handler))
        .route("/search", post(search_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Event server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Accept a change notification. Malformed JSON is the caller's fault
/// (400); unsupported event types are acknowledged but ignored (200); the
/// rest is queued for asynchronous processing (202).
async fn events_handler(
    State(state): State<AppState>,
    payload: Result<Json<Event>, JsonRejection>,
) -> Response {
    let Json(event) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            warn!(error = %rejection, "rejected malformed event payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": "error", "message": rejection.body_text()})),
            )
                .into_response();
        }
    };

    let metrics = state.pipeline.metrics();
    metrics.events_received_total.inc();

    match EventKind::classify(&event.event_type) {
        Some(kind) => {
            state.dispatcher.dispatch(kind, event);
            (StatusCode::ACCEPTED, Json(json!({"status": "accepted"}))).into_response()
        }
        None => {
            metrics.events_ignored_total.inc();
            (
                StatusCode::OK,
                Json(json!({"status": "ignored", "type": event.event_type})),
            )
                .into_response()
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({"status": "online"}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    pub submodel_id: String,
    #[serde(default)]
    pub id_short_path: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

async fn search_handler(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": "error", "message": rejection.body_text()})),
            )
                .into_response();
        }
    };

    let limit = request.limit.unwrap_or(5).clamp(1, 50);
    match state
        .pipeline
        .search(
            &request.query,
            &request.submodel_id,
            request.id_short_path.as_deref(),
            limit,
        )
        .await
    {
        Ok(hits) => {
            let results: Vec<_> = hits
                .into_iter()
                .map(|h| {
                    json!({
                        "text": h.text,
                        "source": h.source,
                        "submodelId": h.submodel_id,
                        "idShortPath": h.id_short_path,
                        "distance": h.distance,
                    })
                })
                .collect();
            (StatusCode::OK, Json(json!({"results": results}))).into_response()
        }
        Err(err) => {
            warn!(error = %err, "search request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": err.to_string()})),
            )
                .into_response()
        }
    }
}
