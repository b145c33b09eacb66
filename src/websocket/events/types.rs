use serde::Deserialize;
use toon_core::EventKind;

/// Control message from client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubscriptionRequest {
    /// Add kinds to the delivered set
    Subscribe {
        /// Event kinds to subscribe to
        #[serde(default)]
        events: Vec<EventKind>,
    },
    /// Remove kinds from the delivered set
    Unsubscribe {
        /// Event kinds to unsubscribe from
        #[serde(default)]
        events: Vec<EventKind>,
    },
    /// Ping for keepalive
    Ping,
}
