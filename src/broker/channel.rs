// File: src/broker/channel.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{ServerError, ServerResult};
use crate::traits::{
    BrokerEvent, DeliveryTag, InboundMessage, MessageBroker, OutboundMessage, QUEUE_CALENDAR,
};

struct ChannelState {
    next_tag: DeliveryTag,
    connected: bool,
    unsettled: BTreeMap<DeliveryTag, InboundMessage>,
    subscribers: HashMap<String, mpsc::UnboundedSender<OutboundMessage>>,
}

/// In-process broker
///
/// Keeps every delivery until it is acked, redelivers on nack and after a
/// reconnect, and loops aggregation roots published to the calendar queue
/// back in as inbound deliveries.
pub struct ChannelBroker {
    events: mpsc::UnboundedSender<BrokerEvent>,
    state: Mutex<ChannelState>,
}

impl ChannelBroker {
    /// Create a connected broker and the consumer side of its event channel
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<BrokerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let broker = Arc::new(Self {
            events,
            state: Mutex::new(ChannelState {
                next_tag: 1,
                connected: true,
                unsettled: BTreeMap::new(),
                subscribers: HashMap::new(),
            }),
        });
        (broker, rx)
    }

    /// Enqueue an inbound message for the consumer
    pub fn deliver(&self, message: InboundMessage) -> ServerResult<DeliveryTag> {
        let mut state = self.state()?;
        if !state.connected {
            return Err(ServerError::TransientInfra("broker disconnected".into()));
        }
        self.send_delivery(&mut state, message)
    }

    /// Receive everything published to `queue` from now on
    ///
    /// Messages published to a queue nobody subscribed to are dropped.
    pub fn subscribe(&self, queue: &str) -> ServerResult<mpsc::UnboundedReceiver<OutboundMessage>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state()?.subscribers.insert(queue.to_string(), tx);
        Ok(rx)
    }

    /// Simulate connection loss; unsettled deliveries wait for `reconnect`
    pub fn disconnect(&self) -> ServerResult<()> {
        let mut state = self.state()?;
        if state.connected {
            state.connected = false;
            self.emit(BrokerEvent::Disconnected)?;
        }
        Ok(())
    }

    /// Restore the connection and redeliver every unsettled message under a new tag
    pub fn reconnect(&self) -> ServerResult<()> {
        let mut state = self.state()?;
        if state.connected {
            return Ok(());
        }
        state.connected = true;
        self.emit(BrokerEvent::Reconnected)?;

        let pending = std::mem::take(&mut state.unsettled);
        tracing::info!(count = pending.len(), "Redelivering unsettled messages");
        for message in pending.into_values() {
            self.send_delivery(&mut state, message)?;
        }
        Ok(())
    }

    /// Deliveries neither acked nor nacked yet
    pub fn unsettled_count(&self) -> usize {
        self.state.lock().map(|s| s.unsettled.len()).unwrap_or(0)
    }

    fn send_delivery(
        &self,
        state: &mut ChannelState,
        message: InboundMessage,
    ) -> ServerResult<DeliveryTag> {
        let tag = state.next_tag;
        state.next_tag += 1;
        state.unsettled.insert(tag, message.clone());
        self.emit(BrokerEvent::Delivery { tag, message })?;
        Ok(tag)
    }

    fn emit(&self, event: BrokerEvent) -> ServerResult<()> {
        self.events
            .send(event)
            .map_err(|_| ServerError::TransientInfra("broker consumer has gone away".into()))
    }

    fn state(&self) -> ServerResult<MutexGuard<'_, ChannelState>> {
        self.state
            .lock()
            .map_err(|_| ServerError::Internal("broker state poisoned".into()))
    }

    fn connected_state(&self) -> ServerResult<MutexGuard<'_, ChannelState>> {
        let state = self.state()?;
        if !state.connected {
            return Err(ServerError::TransientInfra("broker disconnected".into()));
        }
        Ok(state)
    }
}

#[async_trait]
impl MessageBroker for ChannelBroker {
    async fn publish(&self, queue: &str, message: OutboundMessage) -> ServerResult<()> {
        let mut state = self.connected_state()?;

        if let Some(tx) = state.subscribers.get(queue) {
            if tx.send(message.clone()).is_err() {
                state.subscribers.remove(queue);
            }
        }

        if queue == QUEUE_CALENDAR {
            if let OutboundMessage::AggregationRoot { agg_id, agg_root } = message {
                self.send_delivery(
                    &mut state,
                    InboundMessage::AggregationRoot { agg_id, agg_root },
                )?;
            }
        }
        Ok(())
    }

    async fn ack(&self, tag: DeliveryTag) -> ServerResult<()> {
        let mut state = self.connected_state()?;
        state
            .unsettled
            .remove(&tag)
            .map(|_| ())
            .ok_or_else(|| ServerError::TransientInfra(format!("unknown delivery tag {}", tag)))
    }

    async fn nack(&self, tag: DeliveryTag) -> ServerResult<()> {
        let mut state = self.connected_state()?;
        let message = state
            .unsettled
            .remove(&tag)
            .ok_or_else(|| ServerError::TransientInfra(format!("unknown delivery tag {}", tag)))?;
        self.send_delivery(&mut state, message)?;
        Ok(())
    }
}
