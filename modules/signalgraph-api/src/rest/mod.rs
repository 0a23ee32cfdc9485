pub mod position;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use signalgraph_graph::GraphError;

use crate::AppState;

pub const DEFAULT_INSIGHT_TYPE: &str = "insight";

#[derive(Deserialize)]
pub struct InsightsQuery {
    #[serde(rename = "type")]
    insight_type: Option<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Map a refresh outcome plus whatever is cached onto a response.
///
/// A cached view is served whenever one exists, stale or not. Without one, a failed
/// refresh is a 502 and a skipped refresh (another is running) is a 503.
fn respond<V>(
    user_id: Uuid,
    refreshed: Result<bool, GraphError>,
    cached: Option<Arc<V>>,
    render: impl FnOnce(&V) -> serde_json::Value,
) -> Response {
    match (refreshed, cached) {
        (Ok(_), Some(view)) => Json(render(&view)).into_response(),
        (Err(e), Some(view)) => {
            warn!(error = %e, %user_id, "Serving stale view");
            Json(render(&view)).into_response()
        }
        (Err(e), None) => error_response(StatusCode::BAD_GATEWAY, e.to_string()),
        (Ok(_), None) => error_response(StatusCode::SERVICE_UNAVAILABLE, "View is still loading"),
    }
}

// --- Handlers ---

pub async fn api_graph(State(state): State<Arc<AppState>>, Path(user_id): Path<Uuid>) -> Response {
    let cache = state.cache_for(user_id).await;
    let refreshed = cache.refresh_clusters(state.store.as_ref()).await;

    respond(user_id, refreshed, cache.cluster_view(), |view| {
        serde_json::json!({
            "clusters": view.clusters,
            "standalone": view.standalone,
            "edges": view.edges,
            "stats": view.stats(),
            "loaded_at": view.loaded_at,
        })
    })
}

pub async fn api_insights(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<InsightsQuery>,
) -> Response {
    let insight_type = params
        .insight_type
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_INSIGHT_TYPE.to_string());

    let cache = state.cache_for(user_id).await;
    let refreshed = cache.refresh_insights(state.store.as_ref(), &insight_type).await;

    respond(user_id, refreshed, cache.insight_view(&insight_type), |view| {
        serde_json::json!({
            "type": view.insight_type,
            "insights": view.insights,
            "edges": view.edges,
            "stats": view.stats(),
            "loaded_at": view.loaded_at,
        })
    })
}
