//! LND binding of the [`LightningNode`] collaborator.
//!
//! Wraps `tonic_openssl_lnd`; every call takes the client lock only for the
//! duration of the RPC.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use payhist_common::node::{
    DecodedPayReq, InvoiceEvent, InvoiceLookup, InvoiceStream, LedgerPayment, LightningNode,
    NodeError, NodeInfo, OpenChannel, PendingHtlc, SendOutcome,
};
use tokio::sync::Mutex;
use tonic_openssl_lnd::lnrpc;
use tonic_openssl_lnd::routerrpc;
use tonic_openssl_lnd::LndClient;
use tracing::{info, warn};

/// Configuration for the LND connection.
#[derive(Clone, Debug)]
pub struct LndConfig {
    pub host: String,
    pub port: u32,
    pub cert_path: String,
    pub macaroon_path: String,
}

// lnrpc::Invoice::state: 0=OPEN, 1=SETTLED, 2=CANCELED, 3=ACCEPTED
const INVOICE_SETTLED: i32 = 1;
// lnrpc::Payment::status: 0=UNKNOWN, 1=IN_FLIGHT, 2=SUCCEEDED, 3=FAILED
const PAYMENT_SUCCEEDED: i32 = 2;
const PAYMENT_FAILED: i32 = 3;

pub struct LndNode {
    client: Mutex<LndClient>,
    config: LndConfig,
    ready: AtomicBool,
}

impl LndNode {
    /// Connect to LND via gRPC with TLS cert + macaroon.
    pub async fn connect(config: LndConfig) -> Result<Self, NodeError> {
        let client = tonic_openssl_lnd::connect(
            config.host.clone(),
            config.port,
            config.cert_path.clone(),
            config.macaroon_path.clone(),
        )
        .await
        .map_err(|e| NodeError::Unavailable(format!("failed to connect to LND: {}", e)))?;

        info!("Connected to LND at {}:{}", config.host, config.port);

        Ok(Self {
            client: Mutex::new(client),
            config,
            ready: AtomicBool::new(false),
        })
    }
}

fn invoice_event(invoice: lnrpc::Invoice) -> InvoiceEvent {
    InvoiceEvent {
        settled: invoice.state == INVOICE_SETTLED,
        amt_paid_sat: invoice.amt_paid_sat,
        settle_date: invoice.settle_date,
        settle_index: invoice.settle_index,
        payment_request: invoice.payment_request,
        r_hash: invoice.r_hash,
    }
}

#[async_trait]
impl LightningNode for LndNode {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// Ready once `GetInfo` answers and LND reports being synced to chain.
    async fn refresh_readiness(&self) -> bool {
        let ready = match self.get_info().await {
            Ok(info) => info.synced_to_chain,
            Err(e) => {
                warn!("LND at {}:{} not reachable: {}", self.config.host, self.config.port, e);
                false
            }
        };
        self.ready.store(ready, Ordering::Relaxed);
        ready
    }

    async fn list_payments(&self) -> Result<Vec<LedgerPayment>, NodeError> {
        let resp = self
            .client
            .lock()
            .await
            .lightning()
            .list_payments(lnrpc::ListPaymentsRequest {
                ..Default::default()
            })
            .await
            .map_err(|e| NodeError::rpc("ListPayments", e))?;

        Ok(resp
            .into_inner()
            .payments
            .into_iter()
            .filter(|p| p.status == PAYMENT_SUCCEEDED)
            .map(|p| LedgerPayment {
                payment_hash: p.payment_hash,
                value: p.value_sat,
                creation_date: p.creation_time_ns / 1_000_000_000,
            })
            .collect())
    }

    async fn subscribe_invoices(&self, settle_index: u64) -> Result<InvoiceStream, NodeError> {
        let stream = self
            .client
            .lock()
            .await
            .lightning()
            .subscribe_invoices(lnrpc::InvoiceSubscription {
                settle_index,
                ..Default::default()
            })
            .await
            .map_err(|e| NodeError::rpc("SubscribeInvoices", e))?
            .into_inner();

        Ok(stream
            .map(|update| {
                update
                    .map(invoice_event)
                    .map_err(|e| NodeError::Stream(e.to_string()))
            })
            .boxed())
    }

    async fn list_channels(&self) -> Result<Vec<OpenChannel>, NodeError> {
        let resp = self
            .client
            .lock()
            .await
            .lightning()
            .list_channels(lnrpc::ListChannelsRequest {
                ..Default::default()
            })
            .await
            .map_err(|e| NodeError::rpc("ListChannels", e))?;

        Ok(resp
            .into_inner()
            .channels
            .into_iter()
            .map(|ch| OpenChannel {
                pending_htlcs: ch
                    .pending_htlcs
                    .into_iter()
                    .map(|htlc| PendingHtlc {
                        incoming: htlc.incoming,
                        amount: htlc.amount,
                        expiration_height: htlc.expiration_height,
                        hash_lock: htlc.hash_lock,
                    })
                    .collect(),
            })
            .collect())
    }

    async fn get_info(&self) -> Result<NodeInfo, NodeError> {
        let resp = self
            .client
            .lock()
            .await
            .lightning()
            .get_info(lnrpc::GetInfoRequest {})
            .await
            .map_err(|e| NodeError::rpc("GetInfo", e))?;

        let info = resp.into_inner();
        Ok(NodeInfo {
            block_height: info.block_height,
            synced_to_chain: info.synced_to_chain,
        })
    }

    async fn decode_pay_req(&self, payment_request: &str) -> Result<DecodedPayReq, NodeError> {
        let resp = self
            .client
            .lock()
            .await
            .lightning()
            .decode_pay_req(lnrpc::PayReqString {
                pay_req: payment_request.to_string(),
            })
            .await
            .map_err(|e| NodeError::rpc("DecodePayReq", e))?;

        let req = resp.into_inner();
        Ok(DecodedPayReq {
            payment_hash: req.payment_hash,
            destination: req.destination,
            description: req.description,
            num_satoshis: req.num_satoshis,
            timestamp: req.timestamp,
        })
    }

    async fn lookup_invoice(&self, r_hash: &[u8]) -> Result<InvoiceLookup, NodeError> {
        let resp = self
            .client
            .lock()
            .await
            .lightning()
            .lookup_invoice(lnrpc::PaymentHash {
                r_hash: r_hash.to_vec(),
                ..Default::default()
            })
            .await
            .map_err(|e| NodeError::rpc("LookupInvoice", e))?;

        let invoice = resp.into_inner();
        Ok(InvoiceLookup {
            settled: invoice.state == INVOICE_SETTLED,
            amt_paid_sat: invoice.amt_paid_sat,
            payment_request: invoice.payment_request,
        })
    }

    /// Uses SendPaymentV2 and waits for a terminal status.
    async fn send_payment(
        &self,
        payment_request: &str,
        amount_sats: i64,
    ) -> Result<SendOutcome, NodeError> {
        let mut stream = self
            .client
            .lock()
            .await
            .router()
            .send_payment_v2(routerrpc::SendPaymentRequest {
                payment_request: payment_request.to_string(),
                amt: amount_sats,
                timeout_seconds: 60,
                fee_limit_sat: 100,
                ..Default::default()
            })
            .await
            .map_err(|e| NodeError::rpc("SendPaymentV2", e))?
            .into_inner();

        while let Some(update) = stream.next().await {
            let payment = update.map_err(|e| NodeError::Stream(e.to_string()))?;
            match payment.status {
                PAYMENT_SUCCEEDED => return Ok(SendOutcome { payment_error: None }),
                PAYMENT_FAILED => {
                    return Ok(SendOutcome {
                        payment_error: Some(format!(
                            "payment failed (reason {})",
                            payment.failure_reason
                        )),
                    })
                }
                _ => continue,
            }
        }

        Err(NodeError::Stream(
            "payment stream ended without terminal status".to_string(),
        ))
    }

    async fn add_invoice(
        &self,
        memo: &str,
        expiry_secs: i64,
        amount_sats: i64,
    ) -> Result<String, NodeError> {
        let resp = self
            .client
            .lock()
            .await
            .lightning()
            .add_invoice(lnrpc::Invoice {
                memo: memo.to_string(),
                value: amount_sats,
                expiry: expiry_secs,
                private: true,
                ..Default::default()
            })
            .await
            .map_err(|e| NodeError::rpc("AddInvoice", e))?;

        Ok(resp.into_inner().payment_request)
    }

    fn node_name(&self) -> &str {
        "lnd"
    }
}
