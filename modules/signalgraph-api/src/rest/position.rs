use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use futures::Stream;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use signalgraph_graph::PositionWatcher;

use crate::AppState;

fn position_event(watcher: &PositionWatcher) -> Event {
    let payload = serde_json::json!({
        "position": watcher.current().as_deref(),
        "generating": watcher.is_generating(),
    });
    Event::default().event("position").data(payload.to_string())
}

/// One `position` event with the current state, then one per change.
///
/// The watcher lives inside the stream: a client disconnect drops the stream and the
/// watcher with it, which releases the subscription.
fn position_stream(mut watcher: PositionWatcher) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        yield Ok(position_event(&watcher));
        loop {
            watcher.changed().await;
            yield Ok(position_event(&watcher));
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PositionEventsQuery {
    /// The client has just asked for a new position; report it as generating until the
    /// next INSERT lands.
    #[serde(default)]
    pub generating: bool,
}

pub async fn api_position_events(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<PositionEventsQuery>,
) -> Response {
    let watcher = match PositionWatcher::start(state.store.clone(), user_id).await {
        Ok(w) => w,
        Err(e) => {
            warn!(error = %e, %user_id, "Failed to start position watcher");
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };
    if query.generating {
        watcher.mark_generating();
    }
    info!(%user_id, generating = query.generating, "Position stream opened");

    Sse::new(position_stream(watcher))
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("heartbeat"),
        )
        .into_response()
}
