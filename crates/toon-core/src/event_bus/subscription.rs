use super::bus::{EventBus, SharedHandler};
use super::types::EventKind;
use std::sync::Arc;
use tracing::debug;

/// Scoped registration of one handler on the bus.
///
/// The handler is registered for every kind in the set on construction and
/// removed from all of them on drop, so a session that ends by close, error,
/// panic or cancellation never leaves a handler behind.
pub struct Subscription {
    bus: Arc<EventBus>,
    handler: SharedHandler,
    kinds: Vec<EventKind>,
}

impl Subscription {
    /// Register `handler` for `kinds` (duplicates in `kinds` are ignored).
    pub fn new(bus: Arc<EventBus>, handler: SharedHandler, kinds: &[EventKind]) -> Self {
        let mut subscription = Self {
            bus,
            handler,
            kinds: Vec::new(),
        };
        subscription.set_kinds(kinds);
        subscription
    }

    /// Kinds the handler is currently registered for.
    pub fn kinds(&self) -> &[EventKind] {
        &self.kinds
    }

    /// The registered handler.
    pub fn handler(&self) -> &SharedHandler {
        &self.handler
    }

    /// Re-target the handler to exactly `kinds`.
    pub fn set_kinds(&mut self, kinds: &[EventKind]) {
        let mut wanted: Vec<EventKind> = kinds.to_vec();
        wanted.sort();
        wanted.dedup();

        for kind in self.kinds.iter().filter(|k| !wanted.contains(k)) {
            self.bus.unsubscribe(*kind, &self.handler);
        }
        for kind in wanted.iter().filter(|k| !self.kinds.contains(k)) {
            self.bus.subscribe(*kind, self.handler.clone());
        }
        self.kinds = wanted;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        for kind in &self.kinds {
            self.bus.unsubscribe(*kind, &self.handler);
        }
        debug!(kinds = self.kinds.len(), "Subscription released");
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kinds", &self.kinds)
            .finish_non_exhaustive()
    }
}
