use super::events::{ClientMessage, PriceUpdate, ServerEvent};
use super::hub::{PubSub, Topic};
use crate::errors::Result;
use axum::{
    Json, Router,
    extract::{
        State,
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pubsub: Arc<dyn PubSub>,
    /// Cancelled on shutdown; open subscriber sockets close when it fires.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(pubsub: Arc<dyn PubSub>, shutdown: CancellationToken) -> Self {
        Self { pubsub, shutdown }
    }
}

/// Body of `POST /publish`. Only `itemId` and `prices` are required; everything
/// else is relayed untouched.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestRequest {
    item_id: Option<String>,
    #[serde(default)]
    region: Value,
    prices: Option<Value>,
    opportunity: Option<Value>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/publish", post(ingest))
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until `state.shutdown` is cancelled.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "[SERVER] broadcast server listening");

    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("[SERVER] stopped");
    Ok(())
}

fn client_error(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

async fn ingest(
    State(state): State<AppState>,
    payload: std::result::Result<Json<IngestRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            debug!(error = %rejection, "[INGEST] unreadable body");
            return client_error("missing itemId or prices");
        }
    };
    let (Some(item_id), Some(prices)) = (req.item_id.filter(|id| !id.is_empty()), req.prices)
    else {
        return client_error("missing itemId or prices");
    };

    let update = PriceUpdate {
        item_id,
        region: req.region,
        prices,
        ts: Utc::now(),
    };
    let room = Topic::item(&update.item_id);
    let room_hits = state
        .pubsub
        .publish(&room, ServerEvent::PriceUpdate(update.clone()));
    let global_hits = state
        .pubsub
        .publish(&Topic::Global, ServerEvent::PriceUpdateGlobal(update));
    if let Some(opportunity) = req.opportunity {
        state
            .pubsub
            .publish(&Topic::Global, ServerEvent::FlipOpportunity(opportunity));
    }
    debug!(%room, room_hits, global_hits, "[INGEST] price update fanned out");

    Json(json!({ "ok": true })).into_response()
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut sub = state.pubsub.subscribe(Topic::Global);
    let id = sub.id();
    info!(subscriber = id, "[WS] client connected");

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            event = sub.recv() => {
                let Some(event) = event else { break };
                if !send_event(&mut socket, &event).await {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match ClientMessage::parse(&text) {
                        Ok(ClientMessage::Join(room)) => {
                            debug!(subscriber = id, %room, "[WS] join");
                            sub.join(Topic::room(room));
                        }
                        Ok(ClientMessage::Ping(data)) => {
                            if !send_event(&mut socket, &ServerEvent::Pong(data)).await {
                                break;
                            }
                        }
                        Err(e) => warn!(subscriber = id, error = %e, "[WS] ignoring client frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(subscriber = id, error = %e, "[WS] receive error");
                        break;
                    }
                }
            }
        }
    }

    info!(subscriber = id, "[WS] client disconnected");
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, "[WS] failed to serialize event");
            return true;
        }
    };
    socket.send(Message::Text(text)).await.is_ok()
}

/// Liveness probe
async fn health_check() -> &'static str {
    "ok"
}
