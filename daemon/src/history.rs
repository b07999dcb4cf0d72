use std::sync::Arc;

use payhist_common::node::LightningNode;
use payhist_common::payment::PaymentView;
use payhist_common::store::PaymentStore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::assembler::PaymentListAssembler;
use crate::backup::BackupScheduler;
use crate::error::Result;
use crate::invoices::InvoiceService;
use crate::notify::Notifier;
use crate::pending::PendingResolver;
use crate::requests::RequestResolver;
use crate::sync::{SentPaymentSynchronizer, SyncReport};
use crate::watcher::{InvoiceWatcher, WatcherHandle};

/// All payment-history components wired to one node and one store.
pub struct PaymentHistory {
    pub node: Arc<dyn LightningNode>,
    pub store: Arc<dyn PaymentStore>,
    pub notifier: Notifier,
    pub synchronizer: Arc<SentPaymentSynchronizer>,
    pub watcher: Arc<InvoiceWatcher>,
    pub pending: Arc<PendingResolver>,
    pub assembler: PaymentListAssembler,
    pub invoices: InvoiceService,
}

impl PaymentHistory {
    pub fn new(
        node: Arc<dyn LightningNode>,
        store: Arc<dyn PaymentStore>,
        routing_node_pubkey: String,
        notifier: Notifier,
        backups: BackupScheduler,
    ) -> Self {
        let requests = Arc::new(RequestResolver::new(node.clone(), store.clone()));
        let synchronizer = Arc::new(SentPaymentSynchronizer::new(
            node.clone(),
            store.clone(),
            requests.clone(),
            routing_node_pubkey,
            notifier.clone(),
            backups.clone(),
        ));
        let watcher = Arc::new(InvoiceWatcher::new(
            node.clone(),
            store.clone(),
            requests.clone(),
            notifier.clone(),
            backups,
        ));
        let pending = Arc::new(PendingResolver::new(node.clone(), requests.clone()));
        let assembler = PaymentListAssembler::new(store.clone(), pending.clone());
        let invoices = InvoiceService::new(
            node.clone(),
            store.clone(),
            requests,
            synchronizer.clone(),
        );

        Self {
            node,
            store,
            notifier,
            synchronizer,
            watcher,
            pending,
            assembler,
            invoices,
        }
    }

    pub async fn sync(&self) -> Result<SyncReport> {
        self.synchronizer.sync().await
    }

    pub async fn payments(&self) -> Result<Vec<PaymentView>> {
        self.assembler.assemble().await
    }

    /// Catch up on sent payments, then watch settled invoices from the
    /// persisted settle index. Call again after the returned task ends to
    /// reconnect.
    pub async fn start_watching(&self, shutdown: CancellationToken) -> Result<WatcherHandle> {
        if let Err(e) = self.synchronizer.sync().await {
            warn!("Sent payment sync before watching failed: {}", e);
        }
        self.watcher.clone().start(shutdown).await
    }
}
