//! Event correlation registry
//!
//! The workflow driver registers a waiter for the `(event kind, correlation
//! key)` pair it expects a future callback to carry, then drives the
//! platform call that will eventually cause it. When the dispatcher offers
//! a matching event, the waiter resolves with the full event, exactly once.
//!
//! Registration and the match-scan both run under the registry's single
//! mutex, so an event can never slip between a caller checking for an
//! existing waiter and inserting one. Resolution sends on the oneshot while
//! still holding the lock; the timeout path removes its own entry under the
//! same lock and treats "already removed" as proof that resolution won the
//! race, so exactly one of the two outcomes ever surfaces.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use veriflow_core::{CallbackEvent, CorrelationKey, EventKind, VeriflowError, VeriflowResult};

/// What to do when a second waiter registers for a key that already has an
/// unresolved one.
///
/// A driver normally has exactly one operation in flight per key, so a
/// duplicate usually indicates a driver bug; `Reject` makes that loud.
/// Drivers that intentionally race two operations on one key can opt into
/// `QueueFifo`, where waiters resolve in registration order, one event
/// each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateWaiterPolicy {
    /// Fail the second registration with
    /// [`VeriflowError::DuplicateWaiter`].
    #[default]
    Reject,
    /// Queue waiters; each published match resolves the oldest live one.
    QueueFifo,
}

/// Configuration for a [`CorrelationRegistry`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationConfig {
    /// Duplicate-waiter handling.
    pub duplicate_policy: DuplicateWaiterPolicy,
}

struct Waiter {
    id: u64,
    sender: oneshot::Sender<Arc<CallbackEvent>>,
}

type WaiterKey = (EventKind, CorrelationKey);

/// Maps expected events to pending waiters and resolves them as events
/// arrive.
pub struct CorrelationRegistry {
    config: CorrelationConfig,
    waiters: Mutex<HashMap<WaiterKey, VecDeque<Waiter>>>,
    next_waiter_id: AtomicU64,
}

impl CorrelationRegistry {
    /// Create a registry with the given configuration.
    pub fn new(config: CorrelationConfig) -> Self {
        Self {
            config,
            waiters: Mutex::new(HashMap::new()),
            next_waiter_id: AtomicU64::new(0),
        }
    }

    /// Offer a published event to the registry.
    ///
    /// Resolves at most one waiter (the oldest live one for the event's
    /// key) and returns whether a waiter was resolved. Events without a
    /// correlation contract, and events nobody is waiting for, are ignored
    /// here; the bus has already delivered them to every other subscriber.
    pub fn offer(&self, event: &Arc<CallbackEvent>) -> bool {
        let Some(key) = event.correlation_key() else {
            return false;
        };
        let kind = event.kind();
        let map_key = (kind, key);

        let mut waiters = self.waiters.lock();
        let mut resolved = None;
        let mut drained = false;
        if let Some(queue) = waiters.get_mut(&map_key) {
            // A send fails only when the awaiting future was dropped
            // without timing out; such a waiter forfeits its place and the
            // event goes to the next live one.
            while let Some(waiter) = queue.pop_front() {
                if waiter.sender.send(event.clone()).is_ok() {
                    resolved = Some(waiter.id);
                    break;
                }
            }
            drained = queue.is_empty();
        }
        if drained {
            waiters.remove(&map_key);
        }
        drop(waiters);

        if let Some(waiter_id) = resolved {
            tracing::debug!(
                kind = %map_key.0,
                key = %map_key.1,
                waiter = waiter_id,
                "resolved correlation waiter"
            );
            true
        } else {
            false
        }
    }

    /// Wait for the next event matching `(kind, key)`, up to `deadline`.
    ///
    /// Resolution delivers the full matched event. If nothing matches in
    /// time, fails with [`VeriflowError::CorrelationTimeout`] and removes
    /// the waiter, so a late event cannot resolve the already-failed call.
    pub async fn await_event(
        &self,
        kind: EventKind,
        key: CorrelationKey,
        deadline: Duration,
    ) -> VeriflowResult<Arc<CallbackEvent>> {
        let (sender, mut receiver) = oneshot::channel();
        let waiter_id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut waiters = self.waiters.lock();
            let queue = waiters.entry((kind, key.clone())).or_default();
            // Forget waiters whose futures were dropped; they can no
            // longer resolve and must not count as duplicates.
            queue.retain(|waiter| !waiter.sender.is_closed());
            if !queue.is_empty() && self.config.duplicate_policy == DuplicateWaiterPolicy::Reject {
                return Err(VeriflowError::DuplicateWaiter {
                    kind,
                    key: key.to_string(),
                });
            }
            queue.push_back(Waiter {
                id: waiter_id,
                sender,
            });
        }

        tokio::select! {
            resolved = &mut receiver => {
                match resolved {
                    Ok(event) => Ok(event),
                    // The registry (and its waiter map) was torn down while
                    // we waited; nothing can resolve us anymore.
                    Err(_) => Err(VeriflowError::CorrelationTimeout {
                        kind,
                        key: key.to_string(),
                    }),
                }
            }
            _ = tokio::time::sleep(deadline) => {
                let removed = {
                    let mut waiters = self.waiters.lock();
                    let mut removed = false;
                    let mut drained = false;
                    if let Some(queue) = waiters.get_mut(&(kind, key.clone())) {
                        let before = queue.len();
                        queue.retain(|waiter| waiter.id != waiter_id);
                        removed = queue.len() < before;
                        drained = queue.is_empty();
                    }
                    if drained {
                        waiters.remove(&(kind, key.clone()));
                    }
                    removed
                };

                if removed {
                    tracing::debug!(%kind, key = %key, "correlation waiter timed out");
                    Err(VeriflowError::CorrelationTimeout {
                        kind,
                        key: key.to_string(),
                    })
                } else {
                    // Resolution won the race: the send happened under the
                    // lock before our removal attempt, so the event is
                    // already buffered in the channel.
                    receiver.await.map_err(|_| VeriflowError::CorrelationTimeout {
                        kind,
                        key: key.to_string(),
                    })
                }
            }
        }
    }

    /// Number of keys with at least one pending waiter.
    pub fn pending_keys(&self) -> usize {
        self.waiters.lock().len()
    }
}

impl Default for CorrelationRegistry {
    fn default() -> Self {
        Self::new(CorrelationConfig::default())
    }
}
