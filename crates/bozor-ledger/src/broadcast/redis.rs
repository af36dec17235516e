//! Redis pub/sub event bus for several ledger processes behind one Redis.
//!
//! `publish` only sends to Redis. Each process runs one relay task that is
//! subscribed to every channel and feeds a local [`InMemoryEventBus`];
//! local subscribers read from that. A process therefore sees its own
//! events exactly once, after Redis has ordered them.
//!
//! Redis pub/sub is not durable: a process that is disconnected while an
//! event is published never receives it.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::{ConnectionManager, PubSub};
use redis::AsyncCommands;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use bozor_core::Channel;

use super::memory::InMemoryEventBus;
use super::{BusError, EventBus, Subscription};

pub struct RedisEventBus {
    conn: ConnectionManager,
    local: Arc<InMemoryEventBus>,
    relay: JoinHandle<()>,
}

impl RedisEventBus {
    /// Connects, subscribes to all channels and starts the relay task.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn connect(redis_url: &str, capacity: usize) -> Result<Self, BusError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;

        let mut pubsub = client.get_async_pubsub().await?;
        for channel in Channel::ALL {
            pubsub.subscribe(channel.as_str()).await?;
        }

        let local = Arc::new(InMemoryEventBus::new(capacity));
        let relay = tokio::spawn(relay(pubsub, local.clone()));

        info!(channels = Channel::ALL.len(), "Connected Redis event bus");
        Ok(RedisEventBus { conn, local, relay })
    }
}

/// Moves every message Redis delivers into the local fan-out.
async fn relay(mut pubsub: PubSub, local: Arc<InMemoryEventBus>) {
    let mut messages = pubsub.on_message();

    while let Some(msg) = messages.next().await {
        let Some(channel) = Channel::from_name(msg.get_channel_name()) else {
            continue;
        };

        let raw: String = match msg.get_payload() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%channel, error = %e, "Unreadable Redis payload");
                continue;
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(payload) => {
                let delivered = local.fan_out(channel, payload);
                debug!(%channel, delivered, "Relayed Redis event");
            }
            Err(e) => warn!(%channel, error = %e, "Dropping non-JSON Redis payload"),
        }
    }

    warn!("Redis subscription ended; no further remote events will be relayed");
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, channel: Channel, payload: Value) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(channel.as_str(), payload.to_string()).await?;
        debug!(%channel, receivers, "Published to Redis");
        Ok(())
    }

    fn subscribe(&self, channel: Channel) -> Subscription {
        self.local.subscribe(channel)
    }
}

impl Drop for RedisEventBus {
    fn drop(&mut self) {
        self.relay.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    /// Two buses on one Redis behave like two ledger processes.
    #[tokio::test]
    #[ignore = "needs a Redis server at BOZOR_TEST_REDIS_URL"]
    async fn test_events_cross_instances_once() {
        let Ok(url) = std::env::var("BOZOR_TEST_REDIS_URL") else {
            return;
        };
        let a = RedisEventBus::connect(&url, 16).await.unwrap();
        let b = RedisEventBus::connect(&url, 16).await.unwrap();

        let mut on_a = a.subscribe(Channel::NewSale);
        let mut on_b = b.subscribe(Channel::NewSale);

        a.publish(Channel::NewSale, json!({ "id": "s1" })).await.unwrap();

        let got_a = tokio::time::timeout(Duration::from_secs(2), on_a.recv()).await.unwrap().unwrap();
        let got_b = tokio::time::timeout(Duration::from_secs(2), on_b.recv()).await.unwrap().unwrap();
        assert_eq!(got_a["id"], "s1");
        assert_eq!(got_b["id"], "s1");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(on_a.try_recv().is_none());
    }
}
