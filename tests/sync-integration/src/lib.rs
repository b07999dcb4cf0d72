//! Scripted lightning node for exercising the payment history end to end.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use payhist_common::node::{
    hash_key, DecodedPayReq, InvoiceEvent, InvoiceLookup, InvoiceStream, LedgerPayment,
    LightningNode, NodeError, NodeInfo, OpenChannel, PendingHtlc, SendOutcome,
};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

pub mod harness;

pub const TIMEOUT: Duration = Duration::from_secs(5);
pub const ROUTING_NODE: &str = "02routingnode0000000000000000000000000000000000000000000000000000";
pub const SHOP_NODE: &str = "03shopnode000000000000000000000000000000000000000000000000000000000";

/// 32-byte hash filled with `n`.
pub fn hash_bytes(n: u8) -> Vec<u8> {
    vec![n; 32]
}

pub fn hash_hex(n: u8) -> String {
    hash_key(&hash_bytes(n))
}

/// Everything the mock node will answer with. Tests mutate it freely.
#[derive(Default)]
pub struct MockState {
    pub ready: bool,
    pub block_height: u32,
    pub ledger: Vec<LedgerPayment>,
    pub channels: Vec<OpenChannel>,
    /// Payment request text → decoded form.
    pub pay_reqs: HashMap<String, DecodedPayReq>,
    /// Hex payment hash → invoice.
    pub invoices: HashMap<String, InvoiceLookup>,
    /// RPC method names that fail on every call.
    pub failing_methods: HashSet<&'static str>,
    /// Payment requests whose decode fails.
    pub failing_requests: HashSet<String>,
    /// Reported by the next send as the payment error.
    pub send_error: Option<String>,
    pub sent: Vec<(String, i64)>,
    pub added_invoices: Vec<(String, i64, i64)>,
    pub subscribed_from: Vec<u64>,
    pub calls: HashMap<&'static str, usize>,
}

type InvoiceSender = mpsc::UnboundedSender<Result<InvoiceEvent, NodeError>>;

#[derive(Default)]
pub struct MockNode {
    pub state: Mutex<MockState>,
    subscription: Mutex<Option<InvoiceSender>>,
}

impl MockNode {
    pub fn new() -> Self {
        let node = Self::default();
        {
            let mut state = node.state.lock();
            state.ready = true;
            state.block_height = 100;
        }
        node
    }

    fn call(&self, method: &'static str) -> Result<(), NodeError> {
        let mut state = self.state.lock();
        *state.calls.entry(method).or_default() += 1;
        if state.failing_methods.contains(method) {
            return Err(NodeError::rpc(method, "injected failure"));
        }
        Ok(())
    }

    pub fn calls(&self, method: &'static str) -> usize {
        self.state.lock().calls.get(method).copied().unwrap_or(0)
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().ready = ready;
    }

    pub fn fail(&self, method: &'static str) {
        self.state.lock().failing_methods.insert(method);
    }

    /// Register a payment request the node can decode.
    pub fn register_request(
        &self,
        payment_request: &str,
        hash: u8,
        destination: &str,
        description: &str,
        num_satoshis: i64,
        timestamp: i64,
    ) {
        self.state.lock().pay_reqs.insert(
            payment_request.to_string(),
            DecodedPayReq {
                payment_hash: hash_hex(hash),
                destination: destination.to_string(),
                description: description.to_string(),
                num_satoshis,
                timestamp,
            },
        );
    }

    /// Register an invoice issued by this node.
    pub fn register_invoice(
        &self,
        hash: u8,
        payment_request: &str,
        settled: bool,
        amt_paid_sat: i64,
    ) {
        self.state.lock().invoices.insert(
            hash_hex(hash),
            InvoiceLookup {
                payment_request: payment_request.to_string(),
                amt_paid_sat,
                settled,
            },
        );
    }

    pub fn add_ledger_payment(&self, hash: u8, value: i64, creation_date: i64) {
        self.state.lock().ledger.push(LedgerPayment {
            payment_hash: hash_hex(hash),
            value,
            creation_date,
        });
    }

    pub fn add_htlc(&self, incoming: bool, amount: i64, expiration_height: u32, hash: u8) {
        let mut state = self.state.lock();
        let htlc = PendingHtlc {
            incoming,
            amount,
            expiration_height,
            hash_lock: hash_bytes(hash),
        };
        match state.channels.first_mut() {
            Some(channel) => channel.pending_htlcs.push(htlc),
            None => state.channels.push(OpenChannel {
                pending_htlcs: vec![htlc],
            }),
        }
    }

    /// Deliver an event on the current invoice subscription.
    pub fn push_invoice(&self, event: InvoiceEvent) {
        self.send_on_subscription(Ok(event));
    }

    pub fn fail_subscription(&self, message: &str) {
        self.send_on_subscription(Err(NodeError::Stream(message.to_string())));
    }

    /// End the current subscription stream.
    pub fn close_subscription(&self) {
        self.subscription.lock().take();
    }

    fn send_on_subscription(&self, item: Result<InvoiceEvent, NodeError>) {
        let subscription = self.subscription.lock();
        let sender = subscription.as_ref().expect("no active invoice subscription");
        sender.send(item).expect("invoice subscriber went away");
    }
}

/// A settled invoice event for `hash`.
pub fn settled_event(
    hash: u8,
    payment_request: &str,
    amount: i64,
    settle_date: i64,
    settle_index: u64,
) -> InvoiceEvent {
    InvoiceEvent {
        settled: true,
        amt_paid_sat: amount,
        settle_date,
        settle_index,
        payment_request: payment_request.to_string(),
        r_hash: hash_bytes(hash),
    }
}

#[async_trait]
impl LightningNode for MockNode {
    fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    async fn list_payments(&self) -> Result<Vec<LedgerPayment>, NodeError> {
        self.call("ListPayments")?;
        Ok(self.state.lock().ledger.clone())
    }

    async fn subscribe_invoices(&self, settle_index: u64) -> Result<InvoiceStream, NodeError> {
        self.call("SubscribeInvoices")?;
        self.state.lock().subscribed_from.push(settle_index);
        let (tx, rx) = mpsc::unbounded_channel();
        *self.subscription.lock() = Some(tx);
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn list_channels(&self) -> Result<Vec<OpenChannel>, NodeError> {
        self.call("ListChannels")?;
        Ok(self.state.lock().channels.clone())
    }

    async fn get_info(&self) -> Result<NodeInfo, NodeError> {
        self.call("GetInfo")?;
        let state = self.state.lock();
        Ok(NodeInfo {
            block_height: state.block_height,
            synced_to_chain: state.ready,
        })
    }

    async fn decode_pay_req(&self, payment_request: &str) -> Result<DecodedPayReq, NodeError> {
        self.call("DecodePayReq")?;
        let state = self.state.lock();
        if state.failing_requests.contains(payment_request) {
            return Err(NodeError::rpc("DecodePayReq", "injected failure"));
        }
        state
            .pay_reqs
            .get(payment_request)
            .cloned()
            .ok_or_else(|| NodeError::rpc("DecodePayReq", "invalid payment request"))
    }

    async fn lookup_invoice(&self, r_hash: &[u8]) -> Result<InvoiceLookup, NodeError> {
        self.call("LookupInvoice")?;
        self.state
            .lock()
            .invoices
            .get(&hash_key(r_hash))
            .cloned()
            .ok_or_else(|| NodeError::rpc("LookupInvoice", "unable to locate invoice"))
    }

    async fn send_payment(
        &self,
        payment_request: &str,
        amount_sats: i64,
    ) -> Result<SendOutcome, NodeError> {
        self.call("SendPayment")?;
        let mut state = self.state.lock();
        state.sent.push((payment_request.to_string(), amount_sats));
        if let Some(error) = state.send_error.take() {
            return Ok(SendOutcome {
                payment_error: Some(error),
            });
        }
        let decoded = state
            .pay_reqs
            .get(payment_request)
            .cloned()
            .ok_or_else(|| NodeError::rpc("SendPayment", "invalid payment request"))?;
        let value = if amount_sats > 0 {
            amount_sats
        } else {
            decoded.num_satoshis
        };
        state.ledger.push(LedgerPayment {
            payment_hash: decoded.payment_hash,
            value,
            creation_date: decoded.timestamp + 1,
        });
        Ok(SendOutcome::default())
    }

    async fn add_invoice(
        &self,
        memo: &str,
        expiry_secs: i64,
        amount_sats: i64,
    ) -> Result<String, NodeError> {
        self.call("AddInvoice")?;
        let mut state = self.state.lock();
        state
            .added_invoices
            .push((memo.to_string(), expiry_secs, amount_sats));
        let n = u8::try_from(state.added_invoices.len()).unwrap_or(u8::MAX);
        let hash = 0xa0u8.wrapping_add(n);
        let payment_request = format!("lnmock{}", n);
        state.pay_reqs.insert(
            payment_request.clone(),
            DecodedPayReq {
                payment_hash: hash_hex(hash),
                destination: "02mocknode".to_string(),
                description: memo.to_string(),
                num_satoshis: amount_sats,
                timestamp: chrono::Utc::now().timestamp(),
            },
        );
        state.invoices.insert(
            hash_hex(hash),
            InvoiceLookup {
                payment_request: payment_request.clone(),
                amt_paid_sat: 0,
                settled: false,
            },
        );
        Ok(payment_request)
    }

    fn node_name(&self) -> &str {
        "mock"
    }
}

/// Wait for the next notification matching `pred`, or `None` on timeout.
pub async fn recv_matching<T: Clone>(
    rx: &mut broadcast::Receiver<T>,
    pred: impl Fn(&T) -> bool,
    timeout: Duration,
) -> Option<T> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Ok(item)) if pred(&item) => return Some(item),
            Ok(Ok(_)) => continue,
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return None,
        }
    }
}
