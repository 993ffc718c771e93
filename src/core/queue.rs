//! Unbounded async FIFO used for a proxy's inbound and outbound traffic.
//!
//! Pushes never block and may come from any number of tasks. `pop` suspends
//! until an item is available and is cancel-safe: an item is only removed
//! from the queue by the future that returns it.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::protocol::Envelope;

#[derive(Debug, Default)]
pub struct MessageQueue {
    items: Mutex<VecDeque<Envelope>>,
    notify: Notify,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the back. Never blocks.
    pub fn push(&self, envelope: Envelope) {
        self.lock().push_back(envelope);
        self.notify.notify_one();
    }

    /// Put an item back at the front, ahead of everything queued after it.
    pub fn push_front(&self, envelope: Envelope) {
        self.lock().push_front(envelope);
        self.notify.notify_one();
    }

    /// Take the next item, waiting while the queue is empty.
    pub async fn pop(&self) -> Envelope {
        loop {
            let notified = self.notify.notified();
            if let Some(envelope) = self.try_pop() {
                return envelope;
            }
            notified.await;
        }
    }

    /// Take the next item if one is queued.
    pub fn try_pop(&self) -> Option<Envelope> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return everything currently queued.
    pub fn drain(&self) -> Vec<Envelope> {
        self.lock().drain(..).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Envelope>> {
        // A panic while holding the lock cannot leave the deque half-modified.
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
