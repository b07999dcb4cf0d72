//! Invoice creation, decoding and outbound payments.

use std::sync::Arc;

use payhist_common::memo::{self, InvoiceMemo};
use payhist_common::node::LightningNode;
use payhist_common::store::PaymentStore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ReconcileError, Result};
use crate::requests::RequestResolver;
use crate::sync::{SentPaymentSynchronizer, SyncReport};

pub const DEFAULT_INVOICE_EXPIRY_SECS: i64 = 3600;

/// Payee's view of an invoice it issued.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedInvoice {
    pub memo: InvoiceMemo,
    pub amt_paid: i64,
    pub settled: bool,
}

pub struct InvoiceService {
    node: Arc<dyn LightningNode>,
    store: Arc<dyn PaymentStore>,
    requests: Arc<RequestResolver>,
    synchronizer: Arc<SentPaymentSynchronizer>,
}

fn effective_expiry(expiry: i64) -> i64 {
    if expiry <= 0 {
        DEFAULT_INVOICE_EXPIRY_SECS
    } else {
        expiry
    }
}

impl InvoiceService {
    pub fn new(
        node: Arc<dyn LightningNode>,
        store: Arc<dyn PaymentStore>,
        requests: Arc<RequestResolver>,
        synchronizer: Arc<SentPaymentSynchronizer>,
    ) -> Self {
        Self {
            node,
            store,
            requests,
            synchronizer,
        }
    }

    /// Create an invoice carrying the full structured memo.
    pub async fn add_invoice(&self, invoice: &InvoiceMemo) -> Result<String> {
        let description =
            memo::encode(invoice).map_err(|e| ReconcileError::InvalidMemo(e.to_string()))?;
        let payment_request = self
            .node
            .add_invoice(
                &description,
                effective_expiry(invoice.expiry),
                invoice.amount,
            )
            .await?;
        info!("Generated invoice: {}", payment_request);
        Ok(payment_request)
    }

    /// Create an invoice other wallets can display: the memo is written as
    /// `description | payee name | payee image url`.
    pub async fn add_standard_invoice(&self, invoice: &InvoiceMemo) -> Result<String> {
        let payment_request = self
            .node
            .add_invoice(
                &memo::encode_legacy(invoice),
                effective_expiry(invoice.expiry),
                invoice.amount,
            )
            .await?;
        info!("Generated standard invoice: {}", payment_request);
        Ok(payment_request)
    }

    /// Read the memo of a payment request before paying it.
    pub async fn decode_payment_request(&self, payment_request: &str) -> Result<InvoiceMemo> {
        Ok(self.requests.decode(payment_request).await?.memo)
    }

    /// Look up the settlement state of an invoice this wallet issued.
    /// Only invoices with a structured memo qualify.
    pub async fn related_invoice(&self, payment_request: &str) -> Result<RelatedInvoice> {
        let decoded = self.node.decode_pay_req(payment_request).await?;
        let memo = memo::decode_structured(&decoded.description).ok_or_else(|| {
            ReconcileError::InvalidMemo(format!(
                "invoice {} has no structured memo",
                decoded.payment_hash
            ))
        })?;
        let r_hash = hex::decode(&decoded.payment_hash)
            .map_err(|e| ReconcileError::InvalidHash(format!("{}: {}", decoded.payment_hash, e)))?;
        let lookup = self.node.lookup_invoice(&r_hash).await?;
        Ok(RelatedInvoice {
            memo,
            amt_paid: lookup.amt_paid_sat,
            settled: lookup.settled,
        })
    }

    /// Pay `payment_request`, then import the result into history.
    ///
    /// The request text is saved first so the synchronizer can recover its
    /// memo later. A failure reported by the node is returned as
    /// [`ReconcileError::PaymentFailed`] and nothing is recorded.
    pub async fn send_payment(&self, payment_request: &str, amount_sats: i64) -> Result<SyncReport> {
        info!("Sending payment: amount = {}", amount_sats);
        let decoded = self.node.decode_pay_req(payment_request).await?;
        self.store
            .save_payment_request(&decoded.payment_hash, payment_request)?;

        let outcome = self.node.send_payment(payment_request, amount_sats).await?;
        if let Some(reason) = outcome.payment_error.filter(|e| !e.is_empty()) {
            warn!("Payment {} failed: {}", decoded.payment_hash, reason);
            return Err(ReconcileError::PaymentFailed(reason));
        }
        info!("Payment {} sent", decoded.payment_hash);

        self.synchronizer.sync().await
    }
}
