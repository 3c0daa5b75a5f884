use super::events::ServerEvent;
use futures::Stream;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

pub type SubscriberId = u64;

/// Destination of a published event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every connected subscriber, regardless of rooms.
    Global,
    Room(String),
}

impl Topic {
    pub fn room(name: impl Into<String>) -> Self {
        Self::Room(name.into())
    }

    /// The room for one item: `item:<itemId>`.
    pub fn item(item_id: &str) -> Self {
        Self::Room(format!("item:{item_id}"))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("*"),
            Self::Room(name) => f.write_str(name),
        }
    }
}

/// Publish/subscribe seam between the ingest handler and the subscriber transport.
pub trait PubSub: Send + Sync {
    /// Emit `event` to every subscriber of `topic`. Returns how many queued it.
    fn publish(&self, topic: &Topic, event: ServerEvent) -> usize;

    /// Open a subscription that is a member of `topic` (and of `Global`, always).
    fn subscribe(&self, topic: Topic) -> Subscription;
}

/// Membership operations a [`Subscription`] performs against its registry.
pub trait SubscriptionControl: Send + Sync {
    fn join(&self, id: SubscriberId, topic: &Topic) -> bool;
    fn disconnect(&self, id: SubscriberId);
}

/// One subscriber's event stream. Dropping it removes all of its memberships.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<ServerEvent>,
    control: Arc<dyn SubscriptionControl>,
}

impl Subscription {
    pub fn new(
        id: SubscriberId,
        rx: mpsc::Receiver<ServerEvent>,
        control: Arc<dyn SubscriptionControl>,
    ) -> Self {
        Self { id, rx, control }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Add membership of `topic`. Joining twice is harmless.
    pub fn join(&self, topic: Topic) -> bool {
        self.control.join(self.id, &topic)
    }

    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ServerEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = ServerEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<ServerEvent>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.control.disconnect(self.id);
    }
}

struct Member {
    tx: mpsc::Sender<ServerEvent>,
    rooms: HashSet<String>,
}

#[derive(Default)]
struct Registry {
    next_id: SubscriberId,
    members: HashMap<SubscriberId, Member>,
}

struct HubInner {
    registry: Mutex<Registry>,
    buffer: usize,
}

impl SubscriptionControl for HubInner {
    fn join(&self, id: SubscriberId, topic: &Topic) -> bool {
        let mut registry = self.registry.lock();
        let Some(member) = registry.members.get_mut(&id) else {
            return false;
        };
        if let Topic::Room(name) = topic {
            member.rooms.insert(name.clone());
        }
        true
    }

    fn disconnect(&self, id: SubscriberId) {
        if self.registry.lock().members.remove(&id).is_some() {
            debug!(subscriber = id, "[HUB] subscriber removed");
        }
    }
}

/// In-process room registry.
///
/// A single lock covers membership changes and emission, so a join never interleaves
/// with a fan-out and each subscriber sees events in the order they were published.
/// Each subscriber has a bounded queue; events for a full queue are dropped for that
/// subscriber only.
#[derive(Clone)]
pub struct RoomHub {
    inner: Arc<HubInner>,
}

impl RoomHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                registry: Mutex::new(Registry::default()),
                buffer: buffer.max(1),
            }),
        }
    }

    /// Register a subscriber with no rooms; it still receives `Global` events.
    pub fn connect(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.buffer);
        let id = {
            let mut registry = self.inner.registry.lock();
            registry.next_id += 1;
            let id = registry.next_id;
            registry.members.insert(
                id,
                Member {
                    tx,
                    rooms: HashSet::new(),
                },
            );
            id
        };
        Subscription::new(id, rx, self.inner.clone())
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.lock().members.len()
    }

    pub fn room_size(&self, room: &str) -> usize {
        self.inner
            .registry
            .lock()
            .members
            .values()
            .filter(|m| m.rooms.contains(room))
            .count()
    }
}

impl PubSub for RoomHub {
    fn publish(&self, topic: &Topic, event: ServerEvent) -> usize {
        let registry = self.inner.registry.lock();
        let mut delivered = 0;
        for (id, member) in &registry.members {
            let member_of = match topic {
                Topic::Global => true,
                Topic::Room(name) => member.rooms.contains(name),
            };
            if !member_of {
                continue;
            }
            match member.tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = id, event = event.name(), "[HUB] subscriber queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    fn subscribe(&self, topic: Topic) -> Subscription {
        let sub = self.connect();
        sub.join(topic);
        sub
    }
}
