//! # Event Broadcasting
//!
//! Change notifications for live dashboards, after a unit of work commits.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  EventBroadcaster::publish(&ChangeEvent)                               │
//! │       │  channel + JSON payload; failures logged, never returned       │
//! │       ▼                                                                 │
//! │  dyn EventBus                                                          │
//! │   ├── InMemoryEventBus   one tokio broadcast channel per Channel       │
//! │   │                                                                     │
//! │   └── RedisEventBus      PUBLISH to Redis only                         │
//! │            ▲                 │                                          │
//! │            │                 ▼                                          │
//! │            │   relay task: SUBSCRIBE all channels                      │
//! │            │                 │                                          │
//! │            │                 ▼                                          │
//! │            └──── local InMemoryEventBus fan-out                        │
//! │                                                                         │
//! │  Every subscriber, in every process, sees each event once.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Delivery is at-most-once: a subscriber that is not listening, or lags
//! past the channel capacity, misses events.

pub mod memory;
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use bozor_core::{Channel, ChangeEvent};

pub use memory::InMemoryEventBus;
pub use self::redis::RedisEventBus;

/// Event bus failures. Only ever logged by [`EventBroadcaster`].
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Subscription to {0} closed")]
    Closed(Channel),
}

/// A publish/subscribe transport keyed by [`Channel`].
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, channel: Channel, payload: Value) -> Result<(), BusError>;

    /// Starts receiving events published on `channel` from now on.
    fn subscribe(&self, channel: Channel) -> Subscription;
}

/// Receiving end for one channel.
#[derive(Debug)]
pub struct Subscription {
    channel: Channel,
    rx: broadcast::Receiver<Value>,
}

impl Subscription {
    pub(crate) fn new(channel: Channel, rx: broadcast::Receiver<Value>) -> Self {
        Subscription { channel, rx }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Waits for the next payload.
    ///
    /// If this subscriber fell behind, the missed events are skipped with a
    /// warning and the oldest retained one is returned.
    pub async fn recv(&mut self) -> Result<Value, BusError> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Ok(payload),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.channel, skipped, "Subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(BusError::Closed(self.channel))
                }
            }
        }
    }

    /// Returns the next payload if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Value> {
        loop {
            match self.rx.try_recv() {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

/// Fire-and-forget publisher used after commit.
#[derive(Clone)]
pub struct EventBroadcaster {
    bus: Arc<dyn EventBus>,
}

impl EventBroadcaster {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        EventBroadcaster { bus }
    }

    /// Publishes `event` on its channel. Never fails; problems are logged.
    pub async fn publish(&self, event: &ChangeEvent) {
        let channel = event.channel();

        let payload = match event.payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!(%channel, entity_id = %event.entity_id(), error = %e, "Failed to serialize change event");
                return;
            }
        };

        match self.bus.publish(channel, payload).await {
            Ok(()) => debug!(%channel, entity_id = %event.entity_id(), "Change event published"),
            Err(e) => {
                warn!(%channel, entity_id = %event.entity_id(), error = %e, "Failed to publish change event")
            }
        }
    }

    pub fn subscribe(&self, channel: Channel) -> Subscription {
        self.bus.subscribe(channel)
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster").finish_non_exhaustive()
    }
}
