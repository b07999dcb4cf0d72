use serde::{Deserialize, Serialize};

/// Durable watermarks for incremental synchronization. Both only move forward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncCursor {
    /// Highest ledger `creation_date` already processed.
    pub last_sent_payment_timestamp: i64,
    /// Resume token for the invoice settlement stream.
    pub last_settle_index: u64,
}

impl SyncCursor {
    /// Advance the sent-payment watermark. Returns whether it moved.
    pub fn advance_sent(&mut self, timestamp: i64) -> bool {
        if timestamp > self.last_sent_payment_timestamp {
            self.last_sent_payment_timestamp = timestamp;
            true
        } else {
            false
        }
    }

    /// Advance the settle index. Returns whether it moved.
    pub fn advance_settle_index(&mut self, settle_index: u64) -> bool {
        if settle_index > self.last_settle_index {
            self.last_settle_index = settle_index;
            true
        } else {
            false
        }
    }
}
