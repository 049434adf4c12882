use crate::state::{AppState, CycleEvent};
use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, Sse},
        Json,
    },
    routing::get,
    Router,
};
use sensor_core::{AlertStatus, Collection, Filter, Record, Store};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[cfg(test)]
pub fn make_router(state: AppState) -> Router {
    make_router_with_cors(state, HeaderValue::from_static("http://localhost:5173"))
}

pub fn make_router_with_cors(state: AppState, cors_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/meta", get(meta_handler))
        .route("/api/v1/alerts", get(alerts_handler))
        .route("/api/v1/readings", get(readings_handler))
        .route("/api/v1/stream", get(stream_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn meta_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let (seed, cycle) = {
        let status = app_state.sim.status.lock();
        (status.seed, status.cycle)
    };
    Json(serde_json::json!({
        "run_id": app_state.run_id,
        "seed": seed,
        "cycle": cycle,
        "interval_secs": app_state.interval_secs,
    }))
}

/// Active alerts as stored, straight from the alerts collection. Waits for
/// any running cycle, off the async workers.
pub async fn alerts_handler(
    State(app_state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let sim = app_state.sim.clone();
    let lookup = tokio::task::spawn_blocking(move || -> Result<Vec<Record>, String> {
        let filters = [Filter::eq("status", AlertStatus::Active.as_str())];
        sim.engine
            .lock()
            .store
            .query(Collection::Alerts, &filters)
            .map_err(|err| err.to_string())
    })
    .await;

    match lookup {
        Ok(Ok(alerts)) => (
            StatusCode::OK,
            Json(serde_json::json!({ "active_alerts": alerts })),
        ),
        Ok(Err(err)) => {
            tracing::error!("alert lookup failed: {err}");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": err })),
            )
        }
        Err(err) => {
            tracing::error!("alert lookup task failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "alert lookup failed" })),
            )
        }
    }
}

/// Readings from the most recent successful cycle.
pub async fn readings_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let (cycle, readings) = {
        let status = app_state.sim.status.lock();
        let readings = status
            .last_report
            .as_ref()
            .map(|report| report.readings.clone())
            .unwrap_or_default();
        (status.cycle, readings)
    };
    Json(serde_json::json!({
        "cycle": cycle,
        "readings": readings,
    }))
}

pub async fn stream_handler(
    State(app_state): State<AppState>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = app_state.event_tx.subscribe();
    let sim = app_state.sim.clone();

    let stream = async_stream::stream! {
        let mut heartbeat = tokio::time::interval(Duration::from_secs(5));
        heartbeat.tick().await; // discard the immediate first tick
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(event) => yield Ok(cycle_event(&event)),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "SSE subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = heartbeat.tick() => {
                    let cycle = sim.status.lock().cycle;
                    let hb = serde_json::json!({"heartbeat": true, "cycle": cycle});
                    yield Ok(Event::default().event("heartbeat").data(hb.to_string()));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

fn cycle_event(event: &CycleEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_default();
    Event::default().event("cycle").data(data)
}
