use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of `price_update` and `price_update_global`.
///
/// `region` and `prices` are relayed exactly as the publisher sent them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub item_id: String,
    #[serde(default)]
    pub region: Value,
    #[serde(default)]
    pub prices: Value,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ts: DateTime<Utc>,
}

/// Frames sent to subscribers: `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent to the `item:<itemId>` room only.
    PriceUpdate(PriceUpdate),
    PriceUpdateGlobal(PriceUpdate),
    /// The opportunity object as published.
    FlipOpportunity(Value),
    /// Reply to a client `ping`, echoing its data.
    Pong(Value),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PriceUpdate(_) => "price_update",
            Self::PriceUpdateGlobal(_) => "price_update_global",
            Self::FlipOpportunity(_) => "flip_opportunity",
            Self::Pong(_) => "pong",
        }
    }
}

/// Frames a subscriber may send.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Join(String),
    Ping(Value),
}

#[derive(Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, String> {
        let frame: RawFrame = serde_json::from_str(text).map_err(|e| e.to_string())?;
        match frame.event.as_str() {
            "join" => match frame.data {
                Value::String(room) if !room.is_empty() => Ok(Self::Join(room)),
                other => Err(format!("join expects a room name, got {other}")),
            },
            "ping" => Ok(Self::Ping(frame.data)),
            other => Err(format!("unknown event {other:?}")),
        }
    }

    pub fn to_frame(&self) -> String {
        let value = match self {
            Self::Join(room) => serde_json::json!({ "event": "join", "data": room }),
            Self::Ping(data) => serde_json::json!({ "event": "ping", "data": data }),
        };
        value.to_string()
    }
}
