//! Per-role event bus
//!
//! One bus per role instance fans decoded callbacks out to every current
//! subscriber. Publishing enqueues onto unbounded channels and never waits
//! on subscriber work, so the ingress can acknowledge receipt regardless of
//! how slow a consumer is. Delivery order per subscriber equals publish
//! order; there is no replay buffer, so a subscription created after a
//! publish never sees that event.
//!
//! Subscriptions are typed handles that detach themselves when dropped, so
//! listener registrations cannot leak across workflow boundaries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use veriflow_core::CallbackEvent;

struct BusInner {
    subscribers: Mutex<HashMap<u64, mpsc::UnboundedSender<Arc<CallbackEvent>>>>,
    next_id: AtomicU64,
}

/// Fan-out publish/subscribe point for one role instance.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register a new subscriber.
    ///
    /// The subscription only observes events published after this call.
    /// Dropping the returned handle unsubscribes.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().insert(id, sender);
        Subscription {
            id,
            receiver,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every current subscriber, in publish order.
    ///
    /// Never blocks on subscriber consumption. Subscribers whose receiving
    /// side has gone away are dropped here.
    pub fn publish(&self, event: Arc<CallbackEvent>) {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|_, sender| sender.send(event.clone()).is_ok());
    }

    /// Detach every subscriber at once.
    ///
    /// Outstanding [`Subscription`] handles keep draining events already
    /// queued for them but receive nothing further.
    pub fn unsubscribe_all(&self) {
        self.inner.subscribers.lock().clear();
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one bus subscription; detaches on drop.
pub struct Subscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<Arc<CallbackEvent>>,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Receive the next event, in publish order.
    ///
    /// Returns `None` once the subscription is detached and its queue is
    /// drained.
    pub async fn recv(&mut self) -> Option<Arc<CallbackEvent>> {
        self.receiver.recv().await
    }

    /// Non-blocking receive, for draining in tests.
    pub fn try_recv(&mut self) -> Option<Arc<CallbackEvent>> {
        self.receiver.try_recv().ok()
    }
}

impl futures::Stream for Subscription {
    type Item = Arc<CallbackEvent>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.subscribers.lock().remove(&self.id);
        }
    }
}
