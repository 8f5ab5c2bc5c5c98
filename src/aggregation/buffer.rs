// File: src/aggregation/buffer.rs

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::traits::DeliveryTag;

/// Items drained from a staging buffer together with their source deliveries
#[derive(Debug)]
pub struct Drained<T> {
    pub items: Vec<T>,
    /// Distinct source delivery tags, in first-seen order
    pub tags: Vec<DeliveryTag>,
}

impl<T> Drained<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Not-yet-rolled-up items received from the broker
///
/// Must be cleared when the broker connection drops: every unsettled
/// delivery will come again after reconnect.
#[derive(Debug)]
pub struct StagingBuffer<T> {
    entries: Mutex<Vec<(DeliveryTag, T)>>,
}

impl<T> Default for StagingBuffer<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<T> StagingBuffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A panic elsewhere never loses staged deliveries: they still need settling
    fn entries(&self) -> MutexGuard<'_, Vec<(DeliveryTag, T)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, tag: DeliveryTag, item: T) {
        self.entries().push((tag, item));
    }

    pub fn extend<I: IntoIterator<Item = T>>(&self, tag: DeliveryTag, items: I) {
        self.entries()
            .extend(items.into_iter().map(|item| (tag, item)));
    }

    /// Take everything staged so far, in arrival order
    pub fn drain(&self) -> Drained<T> {
        let entries = std::mem::take(&mut *self.entries());

        let mut tags: Vec<DeliveryTag> = Vec::new();
        let mut items = Vec::with_capacity(entries.len());
        for (tag, item) in entries {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
            items.push(item);
        }
        Drained { items, tags }
    }

    /// Drop everything staged; returns how many items were discarded
    pub fn clear(&self) -> usize {
        let mut entries = self.entries();
        let n = entries.len();
        entries.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
