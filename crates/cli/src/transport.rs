//! WebSocket transport: one router connection per socket, text frames routed verbatim.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use geotrail_engine::{Readiness, RouteOutcome, Tracker};
use log::{debug, warn};
use serde_json::{json, Value};
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    pub tracker: Tracker,
    pub stop: watch::Receiver<bool>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_upgrade))
        .route("/health", get(health))
        .with_state(state)
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let AppState { tracker, mut stop } = state;
    let conn = tracker.open_connection();

    loop {
        if *stop.borrow() {
            break;
        }
        let frame = tokio::select! {
            frame = socket.recv() => frame,
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        };
        match frame {
            Some(Ok(Message::Text(text))) => match conn.on_message(&text) {
                RouteOutcome::Delivered(_) => {}
                RouteOutcome::StatusCheck => debug!("{} status check", conn.id()),
                RouteOutcome::Rejected(reason) => debug!("{} frame dropped: {reason}", conn.id()),
            },
            Some(Ok(Message::Binary(_))) => warn!("{} sent a binary frame; ignored", conn.id()),
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("{} socket error: {e}", conn.id());
                break;
            }
        }
    }
    conn.close();
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let tracker = &state.tracker;
    let (status, reason) = match tracker.readiness() {
        Readiness::Pending => ("pending", None),
        Readiness::Ready => ("ready", None),
        Readiness::Failed(reason) => ("failed", Some(reason)),
    };
    Json(json!({
        "status": status,
        "reason": reason,
        "locationPrefix": tracker.location_prefix(),
        "targets": tracker.targets().await,
    }))
}
