use std::sync::Arc;

use payhist_common::payment::{PaymentRecord, PaymentView};
use payhist_common::store::PaymentStore;

use crate::error::Result;
use crate::pending::PendingResolver;

/// Builds the caller-facing history: persisted and pending payments, newest first.
pub struct PaymentListAssembler {
    store: Arc<dyn PaymentStore>,
    pending: Arc<PendingResolver>,
}

impl PaymentListAssembler {
    pub fn new(store: Arc<dyn PaymentStore>, pending: Arc<PendingResolver>) -> Self {
        Self { store, pending }
    }

    pub async fn assemble(&self) -> Result<Vec<PaymentView>> {
        let mut records = self.store.payments()?;
        records.extend(self.pending.resolve().await?);
        sort_newest_first(&mut records);
        Ok(records.into_iter().map(PaymentView::from).collect())
    }
}

/// Order by creation time, most recent first. Ties keep no particular order.
pub fn sort_newest_first(records: &mut [PaymentRecord]) {
    records.sort_by(|a, b| b.creation_timestamp.cmp(&a.creation_timestamp));
}
