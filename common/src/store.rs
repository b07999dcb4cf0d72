use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::cursor::SyncCursor;
use crate::payment::PaymentRecord;

/// Errors from the payment store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreError {
    /// The record cannot be persisted (pending, or missing its hash).
    InvalidRecord(String),
    Io(String),
    Corrupt(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRecord(msg) => write!(f, "invalid record: {msg}"),
            Self::Io(msg) => write!(f, "store i/o failed: {msg}"),
            Self::Corrupt(msg) => write!(f, "store is corrupt: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Durable home of completed payments, saved outgoing requests and the sync cursor.
///
/// Implementations must make each call atomic with respect to the others so
/// concurrent synchronization passes cannot lose a cursor update.
pub trait PaymentStore: Send + Sync {
    /// Persist `record` unless a record with the same hash already exists, and
    /// advance the cursor fields that are nonzero. Returns whether the record
    /// was newly inserted. Safe to call again with the same record.
    fn add_payment(
        &self,
        record: &PaymentRecord,
        settle_index: u64,
        sent_timestamp: i64,
    ) -> Result<bool, StoreError>;

    fn has_payment(&self, payment_hash: &str) -> Result<bool, StoreError>;

    /// All persisted records, in no particular order.
    fn payments(&self) -> Result<Vec<PaymentRecord>, StoreError>;

    fn cursor(&self) -> Result<SyncCursor, StoreError>;

    /// Remember the text of an outgoing payment request, keyed by its hex hash.
    fn save_payment_request(&self, payment_hash: &str, payment_request: &str)
        -> Result<(), StoreError>;

    fn payment_request(&self, payment_hash: &str) -> Result<Option<String>, StoreError>;

    /// Drop all history, saved requests and cursors.
    fn reset(&self) -> Result<(), StoreError>;
}

/// Complete store contents. Shared by the in-memory and file-backed stores.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreState {
    pub payments: BTreeMap<String, PaymentRecord>,
    pub payment_requests: BTreeMap<String, String>,
    pub cursor: SyncCursor,
}

impl StoreState {
    /// Apply an insert. Returns whether anything changed and whether the record was new.
    pub fn apply_payment(
        &mut self,
        record: &PaymentRecord,
        settle_index: u64,
        sent_timestamp: i64,
    ) -> Result<(bool, bool), StoreError> {
        if record.payment_hash.is_empty() {
            return Err(StoreError::InvalidRecord("missing payment hash".into()));
        }
        if record.is_pending() {
            return Err(StoreError::InvalidRecord(format!(
                "pending payment {} cannot be persisted",
                record.payment_hash
            )));
        }

        let inserted = if self.payments.contains_key(&record.payment_hash) {
            false
        } else {
            self.payments
                .insert(record.payment_hash.clone(), record.clone());
            true
        };
        let mut changed = inserted;
        if settle_index > 0 {
            changed |= self.cursor.advance_settle_index(settle_index);
        }
        if sent_timestamp > 0 {
            changed |= self.cursor.advance_sent(sent_timestamp);
        }
        Ok((changed, inserted))
    }
}

/// Volatile store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PaymentStore for MemoryStore {
    fn add_payment(
        &self,
        record: &PaymentRecord,
        settle_index: u64,
        sent_timestamp: i64,
    ) -> Result<bool, StoreError> {
        let (_, inserted) = self
            .state
            .lock()
            .apply_payment(record, settle_index, sent_timestamp)?;
        Ok(inserted)
    }

    fn has_payment(&self, payment_hash: &str) -> Result<bool, StoreError> {
        Ok(self.state.lock().payments.contains_key(payment_hash))
    }

    fn payments(&self) -> Result<Vec<PaymentRecord>, StoreError> {
        Ok(self.state.lock().payments.values().cloned().collect())
    }

    fn cursor(&self) -> Result<SyncCursor, StoreError> {
        Ok(self.state.lock().cursor)
    }

    fn save_payment_request(
        &self,
        payment_hash: &str,
        payment_request: &str,
    ) -> Result<(), StoreError> {
        self.state
            .lock()
            .payment_requests
            .insert(payment_hash.to_string(), payment_request.to_string());
        Ok(())
    }

    fn payment_request(&self, payment_hash: &str) -> Result<Option<String>, StoreError> {
        Ok(self.state.lock().payment_requests.get(payment_hash).cloned())
    }

    fn reset(&self) -> Result<(), StoreError> {
        *self.state.lock() = StoreState::default();
        Ok(())
    }
}
