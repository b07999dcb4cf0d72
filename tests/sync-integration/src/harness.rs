use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use payhist_common::store::{MemoryStore, PaymentStore};
use payhist_daemon::backup::{BackupHook, BackupScheduler};
use payhist_daemon::history::PaymentHistory;
use payhist_daemon::notify::{NotificationEvent, Notifier};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::{MockNode, ROUTING_NODE};

/// Backup hook that only counts snapshots.
#[derive(Default)]
pub struct CountingBackup {
    pub snapshots: AtomicUsize,
}

impl CountingBackup {
    pub fn count(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackupHook for CountingBackup {
    async fn snapshot(&self) -> Result<(), String> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A payment history wired to a [`MockNode`], with its notifications captured.
pub struct Harness {
    pub node: Arc<MockNode>,
    pub store: Arc<dyn PaymentStore>,
    pub history: Arc<PaymentHistory>,
    pub events: broadcast::Receiver<NotificationEvent>,
    pub backups: Arc<CountingBackup>,
    pub shutdown: CancellationToken,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// Build around an existing store, e.g. a reopened file store.
    pub fn with_store(store: Arc<dyn PaymentStore>) -> Self {
        Self::with_node_and_store(Arc::new(MockNode::new()), store)
    }

    pub fn with_node_and_store(node: Arc<MockNode>, store: Arc<dyn PaymentStore>) -> Self {
        tracing_subscriber::fmt::try_init().ok();

        let shutdown = CancellationToken::new();
        let backups = Arc::new(CountingBackup::default());
        let (scheduler, _task) =
            BackupScheduler::spawn(backups.clone(), Duration::ZERO, shutdown.clone());
        let notifier = Notifier::default();
        let events = notifier.subscribe();
        let history = Arc::new(PaymentHistory::new(
            node.clone(),
            store.clone(),
            ROUTING_NODE.to_string(),
            notifier,
            scheduler,
        ));

        Self {
            node,
            store,
            history,
            events,
            backups,
            shutdown,
        }
    }

    /// Notifications received so far, without waiting.
    pub fn drain_events(&mut self) -> Vec<NotificationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
