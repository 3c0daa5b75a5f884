//! WebSocket client for the broadcast server's subscriber channel.

use crate::broadcast::{ClientMessage, ServerEvent};
use crate::errors::{AppError, Result};
use futures::{SinkExt, Stream, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::warn;
use url::Url;

const JOIN_ACK_TIMEOUT: Duration = Duration::from_secs(10);
const JOIN_ACK_MARKER: &str = "joined";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Derive the subscriber endpoint from the server's base URL (`http` → `ws`, `https` → `wss`).
pub fn ws_url(server_url: &str) -> Result<Url> {
    let mut url = Url::parse(server_url)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(AppError::Config(format!("unsupported scheme {other:?} in {server_url}"))),
    };
    url.set_scheme(scheme)
        .map_err(|_| AppError::Config(format!("cannot use {scheme} with {server_url}")))?;
    url.path_segments_mut()
        .map_err(|_| AppError::Config(format!("{server_url} cannot be a base URL")))?
        .pop_if_empty()
        .push("ws");
    Ok(url)
}

fn parse_event(text: &str) -> Option<ServerEvent> {
    match serde_json::from_str(text) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "[SUB] event JSON parse failed");
            None
        }
    }
}

async fn await_join_ack(
    ws_stream: &mut WsStream,
    marker: &serde_json::Value,
    early: &mut Vec<ServerEvent>,
) -> Result<()> {
    while let Some(msg) = ws_stream.next().await {
        let msg = msg?;
        if !msg.is_text() {
            continue;
        }
        match parse_event(&msg.into_text()?) {
            Some(ServerEvent::Pong(data)) if data == *marker => return Ok(()),
            Some(event) => early.push(event),
            None => {}
        }
    }
    Err(AppError::Other("connection closed before join acknowledgement".into()))
}

/// Connect, join `rooms`, and return the stream of events the server sends.
///
/// Returns only once the server has applied every join, so nothing published after
/// this call resolves can be missed by room membership.
pub async fn connect_and_stream(
    server_url: &str,
    rooms: &[String],
) -> Result<impl Stream<Item = ServerEvent> + use<>> {
    let url = ws_url(server_url)?;
    let (mut ws_stream, _resp) = connect_async(url.as_str()).await?;

    for room in rooms {
        ws_stream
            .send(Message::Text(ClientMessage::Join(room.clone()).to_frame()))
            .await?;
    }
    let marker = serde_json::Value::from(JOIN_ACK_MARKER);
    ws_stream
        .send(Message::Text(ClientMessage::Ping(marker.clone()).to_frame()))
        .await?;

    // Frames are handled in order server-side, so the pong arrives after the joins
    // took effect. Global events that slip in before it are kept.
    let mut early = Vec::new();
    match tokio::time::timeout(
        JOIN_ACK_TIMEOUT,
        await_join_ack(&mut ws_stream, &marker, &mut early),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => return Err(AppError::Other("timed out waiting for join acknowledgement".into())),
    }

    let mapped = ws_stream.filter_map(|msg_res| async {
        match msg_res {
            Ok(msg) if msg.is_text() => {
                let txt = match msg.into_text() {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(error = %e, "[SUB] text extraction failed");
                        return None;
                    }
                };
                parse_event(&txt)
            }
            Err(e) => {
                warn!(error = %e, "[SUB] websocket message error");
                None
            }
            _ => None,
        }
    });
    Ok(futures::stream::iter(early).chain(mapped))
}
