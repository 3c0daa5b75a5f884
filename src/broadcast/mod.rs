//! Broadcast server: accepts published snapshots and fans them out to subscribers.
//!
//! Subscribers are grouped into rooms (`item:<itemId>`); every connected subscriber
//! also receives the global channel.

pub mod events;
pub mod hub;
pub mod server;

pub use events::{ClientMessage, PriceUpdate, ServerEvent};
pub use hub::{PubSub, RoomHub, Subscription, SubscriptionControl, Topic};
pub use server::{AppState, router, serve};
