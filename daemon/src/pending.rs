//! Pending payments computed from in-flight HTLCs.
//!
//! Nothing here is persisted; every call reflects the node's current channels
//! and chain height.

use std::sync::Arc;

use chrono::Utc;
use payhist_common::node::{hash_key, LightningNode, PendingHtlc};
use payhist_common::payment::{PaymentRecord, PaymentType};
use tracing::{debug, error};

use crate::error::Result;
use crate::requests::RequestResolver;

/// Average block interval used to turn block deltas into wall-clock time.
pub const BLOCK_INTERVAL_MINUTES: i64 = 10;

/// Minutes until an HTLC expiring at `expiration_height` times out.
/// Negative once the height has passed: the HTLC is stuck, not invalid.
pub fn minutes_to_expire(expiration_height: u32, block_height: u32) -> i64 {
    (i64::from(expiration_height) - i64::from(block_height)) * BLOCK_INTERVAL_MINUTES
}

pub struct PendingResolver {
    node: Arc<dyn LightningNode>,
    requests: Arc<RequestResolver>,
}

impl PendingResolver {
    pub fn new(node: Arc<dyn LightningNode>, requests: Arc<RequestResolver>) -> Self {
        Self { node, requests }
    }

    /// Pending payments for every in-flight HTLC. Empty while the node is not ready.
    /// A failed lookup for any HTLC fails the whole call.
    pub async fn resolve(&self) -> Result<Vec<PaymentRecord>> {
        if !self.node.is_ready() {
            debug!("node not ready, no pending payments");
            return Ok(Vec::new());
        }

        let channels = self.node.list_channels().await?;
        let info = self.node.get_info().await.map_err(|e| {
            error!("Failed to get chain info: {}", e);
            e
        })?;
        if info.block_height == 0 {
            debug!("chain height unknown, no pending payments");
            return Ok(Vec::new());
        }

        let now = Utc::now().timestamp();
        let mut payments = Vec::new();
        for htlc in channels.iter().flat_map(|ch| ch.pending_htlcs.iter()) {
            payments.push(self.pending_payment(htlc, info.block_height, now).await?);
        }
        Ok(payments)
    }

    async fn pending_payment(
        &self,
        htlc: &PendingHtlc,
        block_height: u32,
        now: i64,
    ) -> Result<PaymentRecord> {
        let (payment_type, metadata) = if htlc.incoming {
            (PaymentType::Received, self.requests.incoming(&htlc.hash_lock).await)
        } else {
            let hash = hash_key(&htlc.hash_lock);
            (PaymentType::Sent, self.requests.outgoing(&hash).await)
        };
        let metadata = metadata.map_err(|e| {
            error!("Failed to resolve payment request of pending HTLC: {}", e);
            e
        })?;

        let minutes = minutes_to_expire(htlc.expiration_height, block_height);
        let mut record = PaymentRecord {
            payment_type,
            amount: htlc.amount,
            creation_timestamp: now,
            payment_hash: hash_key(&htlc.hash_lock),
            pending_expiration_height: htlc.expiration_height,
            pending_expiration_timestamp: now + minutes * 60,
            ..Default::default()
        };

        if let Some(metadata) = metadata {
            record.apply_memo(&metadata.memo);
            record.creation_timestamp = metadata.decoded.timestamp;
            record.payment_hash = metadata.decoded.payment_hash;
            record.destination = metadata.decoded.destination;
        }
        Ok(record)
    }
}
