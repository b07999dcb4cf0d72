use serde::{Deserialize, Serialize};

use crate::memo::InvoiceMemo;

/// How a payment moved funds, as inferred from its source and memo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentType {
    #[default]
    Sent,
    Received,
    /// Inbound payment for an invoice whose memo carried the transfer flag.
    Deposit,
    /// Outbound payment whose destination is the routing node.
    Withdrawal,
}

impl PaymentType {
    pub fn category(self) -> PaymentCategory {
        match self {
            Self::Sent => PaymentCategory::Sent,
            Self::Received => PaymentCategory::Received,
            Self::Deposit => PaymentCategory::Deposit,
            Self::Withdrawal => PaymentCategory::Withdrawal,
        }
    }
}

/// Caller-facing payment category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentCategory {
    Sent,
    Received,
    Deposit,
    Withdrawal,
}

/// Canonical unit of payment history.
///
/// Persisted records are keyed by `payment_hash`. Pending records (built from
/// in-flight HTLCs) carry the `pending_*` fields and are never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentRecord {
    pub payment_type: PaymentType,
    /// Amount in satoshis.
    pub amount: i64,
    /// Unix seconds.
    pub creation_timestamp: i64,
    pub description: String,
    pub payee_name: String,
    pub payee_image_url: String,
    pub payer_name: String,
    pub payer_image_url: String,
    pub transfer_request: bool,
    pub payment_hash: String,
    pub redeem_tx_id: String,
    pub destination: String,
    pub pending_expiration_height: u32,
    pub pending_expiration_timestamp: i64,
}

impl PaymentRecord {
    /// Start a record of the given type from the memo fields of a decoded invoice.
    pub fn from_memo(payment_type: PaymentType, memo: &InvoiceMemo) -> Self {
        Self {
            payment_type,
            description: memo.description.clone(),
            payee_name: memo.payee_name.clone(),
            payee_image_url: memo.payee_image_url.clone(),
            payer_name: memo.payer_name.clone(),
            payer_image_url: memo.payer_image_url.clone(),
            transfer_request: memo.transfer_request,
            ..Default::default()
        }
    }

    /// Overwrite the memo fields with those of `memo`.
    pub fn apply_memo(&mut self, memo: &InvoiceMemo) {
        self.description = memo.description.clone();
        self.payee_name = memo.payee_name.clone();
        self.payee_image_url = memo.payee_image_url.clone();
        self.payer_name = memo.payer_name.clone();
        self.payer_image_url = memo.payer_image_url.clone();
        self.transfer_request = memo.transfer_request;
    }

    pub fn is_pending(&self) -> bool {
        self.pending_expiration_height > 0
    }
}

/// A payment as presented to callers of the history list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentView {
    pub category: PaymentCategory,
    pub amount: i64,
    pub creation_timestamp: i64,
    pub redeem_tx_id: String,
    pub payment_hash: String,
    pub destination: String,
    pub invoice_memo: InvoiceMemo,
    pub pending_expiration_height: u32,
    pub pending_expiration_timestamp: i64,
}

impl From<PaymentRecord> for PaymentView {
    fn from(record: PaymentRecord) -> Self {
        let invoice_memo = InvoiceMemo {
            description: record.description,
            amount: record.amount,
            payee_name: record.payee_name,
            payee_image_url: record.payee_image_url,
            payer_name: record.payer_name,
            payer_image_url: record.payer_image_url,
            transfer_request: record.transfer_request,
            expiry: 0,
        };
        Self {
            category: record.payment_type.category(),
            amount: record.amount,
            creation_timestamp: record.creation_timestamp,
            redeem_tx_id: record.redeem_tx_id,
            payment_hash: record.payment_hash,
            destination: record.destination,
            invoice_memo,
            pending_expiration_height: record.pending_expiration_height,
            pending_expiration_timestamp: record.pending_expiration_timestamp,
        }
    }
}
