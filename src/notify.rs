//! Change Notification
//!
//! A single-consumer queue of change events. The engine publishes while it
//! holds `&mut self`; the consumer drains on its own task.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::debug;

use crate::projection::ChangeEvent;

#[derive(Debug, Default)]
struct Shared {
    queue: Mutex<VecDeque<ChangeEvent>>,
    notify: Notify,
    subscribed: AtomicBool,
    closed: AtomicBool,
}

impl Shared {
    fn queue(&self) -> MutexGuard<'_, VecDeque<ChangeEvent>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Publishing side, owned by the engine.
///
/// Events queue up even with nobody subscribed, so a consumer that attaches
/// late still starts from the latest full reload.
#[derive(Debug, Default)]
pub struct ChangeOutbox {
    shared: Arc<Shared>,
}

impl ChangeOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the consumer. `None` while another subscription is alive.
    pub fn subscribe(&self) -> Option<ChangeSubscription> {
        if self.shared.subscribed.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(ChangeSubscription {
            shared: Arc::clone(&self.shared),
        })
    }

    /// Queue an event. A full reload discards everything still undelivered.
    pub fn publish(&self, event: ChangeEvent) {
        {
            let mut queue = self.shared.queue();
            if event.is_full_reload() && !queue.is_empty() {
                debug!(superseded = queue.len(), "full reload supersedes pending events");
                queue.clear();
            }
            queue.push_back(event);
        }
        self.shared.notify.notify_one();
    }

    /// Events not yet taken by the consumer.
    pub fn pending(&self) -> usize {
        self.shared.queue().len()
    }
}

impl Drop for ChangeOutbox {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_one();
    }
}

/// Receiving side. Dropping it lets a new consumer subscribe.
#[derive(Debug)]
pub struct ChangeSubscription {
    shared: Arc<Shared>,
}

impl ChangeSubscription {
    /// Next event in publication order. `None` once the engine is gone and
    /// the queue is drained.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            if let Some(event) = self.try_recv() {
                return Some(event);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                return None;
            }
            self.shared.notify.notified().await;
        }
    }

    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.shared.queue().pop_front()
    }

    /// Everything queued right now.
    pub fn drain(&mut self) -> Vec<ChangeEvent> {
        self.shared.queue().drain(..).collect()
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.shared.subscribed.store(false, Ordering::Release);
    }
}
