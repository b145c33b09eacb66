//! Push sessions - per-connection delivery state shared by the server-push
//! stream and the socket transports.
//!
//! A session subscribes one queue handler to the bus. The handler never
//! blocks the publisher: when the bounded queue is full the event is dropped
//! and counted (at-most-once, best effort). The transport drains the queue in
//! FIFO order through [`PushSession::next_event`], which synthesizes a
//! heartbeat whenever the connection has been idle for the heartbeat interval.

use crate::error::{Error, Result};
use crate::event_bus::{Event, EventBus, EventHandler, EventKind, SharedEvent, SharedHandler, Subscription};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Default per-session queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default idle time before a heartbeat is sent
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Per-session delivery settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum number of undelivered events held for one connection
    pub queue_capacity: usize,
    /// Idle time after which a heartbeat is forwarded
    pub heartbeat_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl SessionConfig {
    /// Override the queue capacity (clamped to at least 1)
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Override the heartbeat interval
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

/// Bus handler that feeds one session's queue.
struct QueueHandler {
    session_id: Uuid,
    tx: mpsc::Sender<SharedEvent>,
    dropped: AtomicU64,
}

impl EventHandler for QueueHandler {
    fn handle(&self, event: &SharedEvent) -> Result<()> {
        match self.tx.try_send(Arc::clone(event)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    session_id = %self.session_id,
                    kind = %event.kind(),
                    event_id = %event.id(),
                    dropped,
                    "Session queue full, event dropped"
                );
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(Error::SessionClosed(self.session_id.to_string())),
        }
    }
}

/// Delivery state of one connected observer.
///
/// Dropping the session removes its handler from every kind on the bus.
pub struct PushSession {
    // Declared first so the bus registration goes away before the receiver.
    subscription: Subscription,
    id: Uuid,
    queue: Arc<QueueHandler>,
    receiver: mpsc::Receiver<SharedEvent>,
    capacity: usize,
    heartbeat_interval: Duration,
    // Moves only when something is handed out, not when a poll is abandoned.
    idle_deadline: Instant,
    cancel: CancellationToken,
}

impl PushSession {
    /// Open a session interested in every event kind.
    ///
    /// `cancel` ends the session's stream (server shutdown).
    pub fn open(bus: &Arc<EventBus>, config: &SessionConfig, cancel: CancellationToken) -> Self {
        let id = Uuid::new_v4();
        let capacity = config.queue_capacity.max(1);
        let (tx, receiver) = mpsc::channel(capacity);
        let queue = Arc::new(QueueHandler {
            session_id: id,
            tx,
            dropped: AtomicU64::new(0),
        });
        let handler: SharedHandler = queue.clone();
        let subscription = bus.subscription(handler, &EventKind::ALL);

        debug!(session_id = %id, capacity, "Push session opened");

        Self {
            subscription,
            id,
            queue,
            receiver,
            capacity,
            heartbeat_interval: config.heartbeat_interval,
            idle_deadline: Instant::now() + config.heartbeat_interval,
            cancel,
        }
    }

    /// Session identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Kinds currently delivered to this session
    pub fn interest(&self) -> &[EventKind] {
        self.subscription.kinds()
    }

    /// Narrow (or widen) the kinds delivered to this session.
    ///
    /// Heartbeats are synthesized locally and keep flowing regardless.
    pub fn set_interest(&mut self, kinds: &[EventKind]) {
        self.subscription.set_kinds(kinds);
        debug!(session_id = %self.id, kinds = ?self.subscription.kinds(), "Session interest changed");
    }

    /// Events dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }

    /// Events waiting in the queue
    pub fn queued(&self) -> usize {
        self.capacity - self.queue.tx.capacity()
    }

    /// Queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Next outbound event in FIFO order.
    ///
    /// Returns a fresh heartbeat once nothing has been handed out for the
    /// heartbeat interval. The idle clock keeps running when this future is
    /// dropped before completing, so callers racing it against other work
    /// (client frames on a socket) still get heartbeats on time.
    /// Returns `None` once the session is cancelled.
    pub async fn next_event(&mut self) -> Option<SharedEvent> {
        let next = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            received = tokio::time::timeout_at(self.idle_deadline, self.receiver.recv()) => {
                match received {
                    Ok(event) => event,
                    Err(_) => Some(Arc::new(Event::heartbeat())),
                }
            }
        };
        self.idle_deadline = Instant::now() + self.heartbeat_interval;
        next
    }
}

impl Drop for PushSession {
    fn drop(&mut self) {
        debug!(session_id = %self.id, dropped = self.dropped(), "Push session closed");
    }
}

impl std::fmt::Debug for PushSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushSession")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .finish_non_exhaustive()
    }
}
