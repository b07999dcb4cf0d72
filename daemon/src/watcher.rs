//! Background consumer of the node's invoice subscription.
//!
//! One task owns the stream and handles each settled invoice to completion
//! before reading the next. A stream error ends the task; reconnecting is the
//! owner's job (see [`crate::history::PaymentHistory::start_watching`]), which
//! resumes from the persisted settle index.

use std::sync::Arc;

use futures::StreamExt;
use payhist_common::memo::InvoiceMemo;
use payhist_common::node::{hash_key, InvoiceEvent, InvoiceStream, LightningNode};
use payhist_common::payment::{PaymentRecord, PaymentType};
use payhist_common::store::PaymentStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::backup::BackupScheduler;
use crate::error::{ReconcileError, Result};
use crate::notify::{NotificationEvent, Notifier};
use crate::requests::RequestResolver;

pub struct InvoiceWatcher {
    node: Arc<dyn LightningNode>,
    store: Arc<dyn PaymentStore>,
    requests: Arc<RequestResolver>,
    notifier: Notifier,
    backups: BackupScheduler,
}

/// Running watcher task.
pub struct WatcherHandle {
    shutdown: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl WatcherHandle {
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to end and return why it ended.
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| ReconcileError::Task(e.to_string()))?
    }
}

impl InvoiceWatcher {
    pub fn new(
        node: Arc<dyn LightningNode>,
        store: Arc<dyn PaymentStore>,
        requests: Arc<RequestResolver>,
        notifier: Notifier,
        backups: BackupScheduler,
    ) -> Self {
        Self {
            node,
            store,
            requests,
            notifier,
            backups,
        }
    }

    /// Subscribe from the persisted settle index and spawn the consuming task.
    pub async fn start(self: Arc<Self>, shutdown: CancellationToken) -> Result<WatcherHandle> {
        let resume_index = self.store.cursor()?.last_settle_index;
        info!("Subscribing to invoices from settle index {}", resume_index);
        let stream = self.node.subscribe_invoices(resume_index).await?;

        let token = shutdown.clone();
        let task = tokio::spawn(async move { self.run(stream, token).await });
        Ok(WatcherHandle { shutdown, task })
    }

    async fn run(&self, mut stream: InvoiceStream, shutdown: CancellationToken) -> Result<()> {
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Invoice watcher stopped");
                    return Ok(());
                }
                next = stream.next() => next,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    error!("Failed to receive an invoice: {}", e);
                    return Err(e.into());
                }
                None => {
                    error!("Invoice subscription closed by the node");
                    return Err(ReconcileError::StreamClosed);
                }
            };

            if !event.settled {
                debug!(settle_index = event.settle_index, "ignoring unsettled invoice");
                continue;
            }
            if let Err(e) = self.on_settled(&event).await {
                error!("Failed to record received payment: {}", e);
                return Err(e);
            }
        }
    }

    /// Persist a settled invoice and advance the settle index.
    /// Returns whether the payment was new.
    pub async fn on_settled(&self, event: &InvoiceEvent) -> Result<bool> {
        let memo = if event.payment_request.is_empty() {
            InvoiceMemo {
                amount: event.amt_paid_sat,
                ..Default::default()
            }
        } else {
            self.requests.decode(&event.payment_request).await?.memo
        };

        let payment_type = if memo.transfer_request {
            PaymentType::Deposit
        } else {
            PaymentType::Received
        };
        let mut record = PaymentRecord::from_memo(payment_type, &memo);
        record.amount = event.amt_paid_sat;
        record.creation_timestamp = event.settle_date;
        record.payment_hash = hash_key(&event.r_hash);

        let inserted = self.store.add_payment(&record, event.settle_index, 0)?;
        if inserted {
            info!(
                "Recorded {:?} of {} sat (settle index {})",
                payment_type, record.amount, event.settle_index
            );
            self.notifier.notify(NotificationEvent::InvoicePaid);
            self.backups.schedule();
            self.notifier.notify(NotificationEvent::AccountChanged);
        } else {
            debug!(settle_index = event.settle_index, "settled invoice already recorded");
        }
        Ok(inserted)
    }
}
