use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use tokio::sync::Mutex;
use tower_http::set_header::SetResponseHeaderLayer;
use uuid::Uuid;

use signalgraph_graph::ViewCache;
use signalgraph_store::RecordStore;

pub mod relay;
pub mod rest;

use relay::Relay;

pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub relay: Relay,
    caches: Mutex<HashMap<Uuid, Arc<ViewCache>>>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, relay: Relay) -> Self {
        Self {
            store,
            relay,
            caches: Mutex::new(HashMap::new()),
        }
    }

    /// The user's view cache, created empty on first use.
    pub async fn cache_for(&self, user_id: Uuid) -> Arc<ViewCache> {
        let mut caches = self.caches.lock().await;
        caches
            .entry(user_id)
            .or_insert_with(|| Arc::new(ViewCache::new(user_id)))
            .clone()
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Derived views
        .route("/api/users/{user_id}/graph", get(rest::api_graph))
        .route("/api/users/{user_id}/insights", get(rest::api_insights))
        // Live position
        .route(
            "/api/users/{user_id}/position/events",
            get(rest::position::api_position_events),
        )
        // Inference relay
        .route("/api/chat", post(relay::api_chat))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Derived views are per-user and short-lived: never cache.
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        // Method + path only, no query params
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}
