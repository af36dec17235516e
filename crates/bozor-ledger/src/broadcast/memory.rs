//! Single-process event bus: one `tokio::sync::broadcast` channel per
//! [`Channel`], created up front so publishing never takes a lock.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

use bozor_core::Channel;

use super::{BusError, EventBus, Subscription};

#[derive(Debug)]
pub struct InMemoryEventBus {
    senders: HashMap<Channel, broadcast::Sender<Value>>,
}

impl InMemoryEventBus {
    /// `capacity` is the per-channel buffer; slower subscribers lose the
    /// oldest events.
    pub fn new(capacity: usize) -> Self {
        let senders = Channel::ALL
            .into_iter()
            .map(|channel| (channel, broadcast::channel(capacity.max(1)).0))
            .collect();
        InMemoryEventBus { senders }
    }

    /// Hands `payload` to every current subscriber of `channel`.
    ///
    /// Returns how many subscribers received it.
    pub fn fan_out(&self, channel: Channel, payload: Value) -> usize {
        match self.senders.get(&channel) {
            // Err only means nobody is listening.
            Some(tx) => tx.send(payload).unwrap_or(0),
            None => 0,
        }
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.senders
            .get(&channel)
            .map_or(0, |tx| tx.receiver_count())
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, channel: Channel, payload: Value) -> Result<(), BusError> {
        let delivered = self.fan_out(channel, payload);
        trace!(%channel, delivered, "In-memory publish");
        Ok(())
    }

    fn subscribe(&self, channel: Channel) -> Subscription {
        let rx = match self.senders.get(&channel) {
            Some(tx) => tx.subscribe(),
            // Every channel is created in `new`; a detached receiver is
            // closed immediately.
            None => broadcast::channel(1).1,
        };
        Subscription::new(channel, rx)
    }
}
