//! Incremental import of completed outbound payments from the node's ledger.

use std::sync::Arc;

use payhist_common::node::{LedgerPayment, LightningNode};
use payhist_common::payment::{PaymentRecord, PaymentType};
use payhist_common::store::PaymentStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backup::BackupScheduler;
use crate::error::Result;
use crate::notify::{NotificationEvent, Notifier};
use crate::requests::RequestResolver;

/// Outcome of one synchronization pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub added: usize,
    pub last_sent_payment_timestamp: i64,
}

pub struct SentPaymentSynchronizer {
    node: Arc<dyn LightningNode>,
    store: Arc<dyn PaymentStore>,
    requests: Arc<RequestResolver>,
    routing_node_pubkey: String,
    notifier: Notifier,
    backups: BackupScheduler,
}

impl SentPaymentSynchronizer {
    pub fn new(
        node: Arc<dyn LightningNode>,
        store: Arc<dyn PaymentStore>,
        requests: Arc<RequestResolver>,
        routing_node_pubkey: String,
        notifier: Notifier,
        backups: BackupScheduler,
    ) -> Self {
        Self {
            node,
            store,
            requests,
            routing_node_pubkey,
            notifier,
            backups,
        }
    }

    /// Import every ledger payment not yet in the store.
    ///
    /// Items at or after the cursor are considered, oldest first; hashes that
    /// are already persisted are skipped, so payments sharing the cursor's
    /// timestamp are not lost and a rerun adds nothing. An RPC failure stops
    /// the pass; everything imported before it stays, and so does the cursor.
    pub async fn sync(&self) -> Result<SyncReport> {
        let cursor = self.store.cursor()?.last_sent_payment_timestamp;
        let mut ledger = self.node.list_payments().await?;
        ledger.retain(|p| p.creation_date >= cursor);
        ledger.sort_by_key(|p| p.creation_date);
        debug!(cursor, candidates = ledger.len(), "syncing sent payments");

        let mut added = 0;
        let outcome = self.import(&ledger, &mut added).await;
        if added > 0 {
            self.notifier.notify(NotificationEvent::AccountChanged);
        }
        outcome?;

        let report = SyncReport {
            added,
            last_sent_payment_timestamp: self.store.cursor()?.last_sent_payment_timestamp,
        };
        if added > 0 {
            info!(
                "Imported {} sent payments (cursor now {})",
                added, report.last_sent_payment_timestamp
            );
        }
        Ok(report)
    }

    async fn import(&self, ledger: &[LedgerPayment], added: &mut usize) -> Result<()> {
        for item in ledger {
            if self.store.has_payment(&item.payment_hash)? {
                continue;
            }
            let record = self.normalize(item).await?;
            if self.store.add_payment(&record, 0, item.creation_date)? {
                *added += 1;
                self.backups.schedule();
            }
        }
        Ok(())
    }

    async fn normalize(&self, item: &LedgerPayment) -> Result<PaymentRecord> {
        let Some(metadata) = self.requests.outgoing(&item.payment_hash).await? else {
            warn!(
                payment_hash = %item.payment_hash,
                "sent payment has no saved payment request, storing without memo"
            );
            return Ok(PaymentRecord {
                payment_type: PaymentType::Sent,
                amount: item.value,
                creation_timestamp: item.creation_date,
                payment_hash: item.payment_hash.clone(),
                ..Default::default()
            });
        };

        let payment_type = self.classify(&metadata.decoded.destination);
        let mut record = PaymentRecord::from_memo(payment_type, &metadata.memo);
        record.amount = item.value;
        record.creation_timestamp = item.creation_date;
        record.payment_hash = metadata.decoded.payment_hash;
        record.destination = metadata.decoded.destination;
        Ok(record)
    }

    /// Payments to the routing node move funds out of the wallet.
    pub fn classify(&self, destination: &str) -> PaymentType {
        if !self.routing_node_pubkey.is_empty() && destination == self.routing_node_pubkey {
            PaymentType::Withdrawal
        } else {
            PaymentType::Sent
        }
    }
}
