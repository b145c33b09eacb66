use super::subscription::Subscription;
use super::types::{Event, EventKind, SharedEvent};
use crate::error::Result;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{trace, warn};

/// Receiver of bus events.
///
/// Handlers run synchronously inside [`EventBus::publish`], so they must not
/// block; anything slow belongs behind a queue (see
/// [`PushSession`](crate::session::PushSession)).
pub trait EventHandler: Send + Sync {
    /// Handle one event. An `Err` is logged by the bus and otherwise ignored.
    fn handle(&self, event: &SharedEvent) -> Result<()>;
}

impl<F> EventHandler for F
where
    F: Fn(&SharedEvent) -> Result<()> + Send + Sync,
{
    fn handle(&self, event: &SharedEvent) -> Result<()> {
        self(event)
    }
}

/// Handler reference held by the bus. Identity is the `Arc` allocation.
pub type SharedHandler = Arc<dyn EventHandler>;

fn same_handler(a: &SharedHandler, b: &SharedHandler) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// In-process publish/subscribe dispatcher keyed by [`EventKind`].
///
/// Delivery is synchronous: every handler registered for the event's kind has
/// run before `publish` returns. The subscriber map is the only state shared
/// between sessions and producers; a single lock guards it and is never held
/// while handlers run.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<SharedHandler>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<EventKind, usize> =
            handlers.iter().map(|(kind, list)| (*kind, list.len())).collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`. Registering the same pair twice is a no-op.
    pub fn subscribe(&self, kind: EventKind, handler: SharedHandler) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let list = handlers.entry(kind).or_default();
        if !list.iter().any(|h| same_handler(h, &handler)) {
            list.push(handler);
        }
    }

    /// Remove `handler` from `kind`. Removing an unknown pair is a no-op.
    pub fn unsubscribe(&self, kind: EventKind, handler: &SharedHandler) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = handlers.get_mut(&kind) {
            list.retain(|h| !same_handler(h, handler));
            if list.is_empty() {
                handlers.remove(&kind);
            }
        }
    }

    /// Register `handler` for every kind.
    pub fn subscribe_all(&self, handler: SharedHandler) {
        for kind in EventKind::ALL {
            self.subscribe(kind, handler.clone());
        }
    }

    /// Remove `handler` from every kind.
    pub fn unsubscribe_all(&self, handler: &SharedHandler) {
        for kind in EventKind::ALL {
            self.unsubscribe(kind, handler);
        }
    }

    /// Register `handler` for `kinds` and return a guard that removes it again
    /// when dropped.
    pub fn subscription(self: &Arc<Self>, handler: SharedHandler, kinds: &[EventKind]) -> Subscription {
        Subscription::new(Arc::clone(self), handler, kinds)
    }

    /// Remove every handler for `kind`, or for all kinds when `None`.
    pub fn clear(&self, kind: Option<EventKind>) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        match kind {
            Some(kind) => {
                handlers.remove(&kind);
            }
            None => handlers.clear(),
        }
    }

    /// Number of handlers currently registered for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Publish an event to every handler registered for its kind.
    ///
    /// Returns the number of handlers that accepted the event.
    pub fn publish(&self, event: Event) -> usize {
        self.publish_shared(Arc::new(event))
    }

    /// Publish an already shared event.
    ///
    /// Dispatch iterates a snapshot taken at the start of the call: handlers
    /// added or removed by another handler take effect on the next publish.
    /// A handler that errors or panics is logged and skipped; the remaining
    /// handlers still run and nothing propagates to the caller.
    pub fn publish_shared(&self, event: SharedEvent) -> usize {
        let kind = event.kind();
        let snapshot: Vec<SharedHandler> = {
            let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            match handlers.get(&kind) {
                Some(list) => list.clone(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for handler in &snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler.handle(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(kind = %kind, event_id = %event.id(), error = %e, "Event handler failed");
                }
                Err(_) => {
                    warn!(kind = %kind, event_id = %event.id(), "Event handler panicked");
                }
            }
        }

        trace!(kind = %kind, event_id = %event.id(), handlers = snapshot.len(), delivered, "Event published");
        delivered
    }
}
