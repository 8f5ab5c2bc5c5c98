// File: src/broker/recording.rs

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ServerError, ServerResult};
use crate::traits::{DeliveryTag, MessageBroker, OutboundMessage};

/// Broker double that records every call
///
/// Publishes fail with `TransientInfra` while `set_fail_publish(true)` is in
/// effect, and for the next `n` calls after `fail_next_publishes(n)`.
#[derive(Debug, Default)]
pub struct RecordingBroker {
    published: Mutex<Vec<(String, OutboundMessage)>>,
    acked: Mutex<Vec<DeliveryTag>>,
    nacked: Mutex<Vec<DeliveryTag>>,
    fail_publish: AtomicBool,
    failures_left: AtomicUsize,
}

impl RecordingBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn fail_next_publishes(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// All publishes in call order
    pub fn published(&self) -> Vec<(String, OutboundMessage)> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Messages published to one queue, in call order
    pub fn published_to(&self, queue: &str) -> Vec<OutboundMessage> {
        self.published()
            .into_iter()
            .filter(|(q, _)| q == queue)
            .map(|(_, m)| m)
            .collect()
    }

    pub fn acked(&self) -> Vec<DeliveryTag> {
        self.acked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn nacked(&self) -> Vec<DeliveryTag> {
        self.nacked.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut p) = self.published.lock() {
            p.clear();
        }
        if let Ok(mut a) = self.acked.lock() {
            a.clear();
        }
        if let Ok(mut n) = self.nacked.lock() {
            n.clear();
        }
    }
}

fn poisoned<T>(_: T) -> ServerError {
    ServerError::Internal("recording broker poisoned".into())
}

#[async_trait]
impl MessageBroker for RecordingBroker {
    async fn publish(&self, queue: &str, message: OutboundMessage) -> ServerResult<()> {
        let scheduled = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scheduled || self.fail_publish.load(Ordering::SeqCst) {
            return Err(ServerError::TransientInfra("publish refused".into()));
        }
        self.published
            .lock()
            .map_err(poisoned)?
            .push((queue.to_string(), message));
        Ok(())
    }

    async fn ack(&self, tag: DeliveryTag) -> ServerResult<()> {
        self.acked.lock().map_err(poisoned)?.push(tag);
        Ok(())
    }

    async fn nack(&self, tag: DeliveryTag) -> ServerResult<()> {
        self.nacked.lock().map_err(poisoned)?.push(tag);
        Ok(())
    }
}
