//! Lifecycle notifications from the object graph, delivered by message passing.
//!
//! The graph owner publishes into an [`EventSource`]; each listener holds a
//! [`Subscription`] with its own inbox and drains it before rendering.
//! Dropping the subscription unregisters the inbox.

use crate::PartId;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphEvent {
    PartAttached(PartId),
    PartDetached(PartId),
    PoseChanged(PartId),
    VariantApplied(PartId),
    PartWillDie(PartId),
}

impl GraphEvent {
    pub fn part(&self) -> PartId {
        match *self {
            GraphEvent::PartAttached(part)
            | GraphEvent::PartDetached(part)
            | GraphEvent::PoseChanged(part)
            | GraphEvent::VariantApplied(part)
            | GraphEvent::PartWillDie(part) => part,
        }
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    inboxes: BTreeMap<u64, VecDeque<GraphEvent>>,
}

/// Fan-out point for graph events. Cloning shares the same subscriber set.
#[derive(Clone, Default)]
pub struct EventSource {
    registry: Arc<Mutex<Registry>>,
}

impl EventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `event` for every live subscriber, in publish order.
    pub fn publish(&self, event: GraphEvent) {
        let mut registry = self.registry.lock();
        log::trace!(
            "Publishing {event:?} to {} subscriber(s)",
            registry.inboxes.len()
        );
        for inbox in registry.inboxes.values_mut() {
            inbox.push_back(event);
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.inboxes.insert(id, VecDeque::new());

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().inboxes.len()
    }
}

/// A scoped registration with an [`EventSource`].
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Takes every event queued since the last drain, oldest first.
    pub fn drain(&self) -> Vec<GraphEvent> {
        let Some(registry) = self.registry.upgrade() else {
            return Vec::new();
        };
        let mut registry = registry.lock();
        registry
            .inboxes
            .get_mut(&self.id)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }

    /// False once the source has been dropped.
    pub fn is_connected(&self) -> bool {
        self.registry.strong_count() > 0
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().inboxes.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}
