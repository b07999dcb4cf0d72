use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationEvent {
    InvoicePaid,
    AccountChanged,
}

/// Fan-out of history events to whoever is listening.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<NotificationEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.tx.subscribe()
    }

    pub fn notify(&self, event: NotificationEvent) {
        // No receivers is fine; delivery is the listener's concern.
        if self.tx.send(event).is_err() {
            debug!(?event, "no notification listeners");
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}
