use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// A completed outbound payment from the node's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPayment {
    pub payment_hash: String,
    /// Amount in satoshis.
    pub value: i64,
    /// Unix seconds.
    pub creation_date: i64,
}

/// One update from the invoice subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceEvent {
    pub settled: bool,
    pub amt_paid_sat: i64,
    pub settle_date: i64,
    pub settle_index: u64,
    pub payment_request: String,
    pub r_hash: Vec<u8>,
}

/// An in-flight HTLC on an open channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingHtlc {
    pub incoming: bool,
    pub amount: i64,
    pub expiration_height: u32,
    pub hash_lock: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenChannel {
    pub pending_htlcs: Vec<PendingHtlc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub block_height: u32,
    pub synced_to_chain: bool,
}

/// Fields of a decoded BOLT11 payment request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedPayReq {
    pub payment_hash: String,
    pub destination: String,
    pub description: String,
    pub num_satoshis: i64,
    /// Unix seconds the request was created.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLookup {
    pub payment_request: String,
    pub amt_paid_sat: i64,
    pub settled: bool,
}

/// Result of a payment attempt that reached the node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    /// Set when the node reports the payment as failed.
    pub payment_error: Option<String>,
}

/// Errors from the lightning node collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeError {
    Rpc { method: String, message: String },
    Stream(String),
    Unavailable(String),
}

impl NodeError {
    pub fn rpc(method: &str, message: impl ToString) -> Self {
        Self::Rpc {
            method: method.to_string(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rpc { method, message } => write!(f, "{method} failed: {message}"),
            Self::Stream(msg) => write!(f, "stream error: {msg}"),
            Self::Unavailable(msg) => write!(f, "node unavailable: {msg}"),
        }
    }
}

impl std::error::Error for NodeError {}

pub type InvoiceStream = BoxStream<'static, Result<InvoiceEvent, NodeError>>;

/// The slice of a lightning node's RPC surface the payment history consumes.
///
/// The daemon binds this to LND; tests script it.
#[async_trait]
pub trait LightningNode: Send + Sync {
    /// Whether the node is up and its chain view is usable.
    fn is_ready(&self) -> bool;

    /// Re-check readiness against the node and return it. Backends that
    /// track readiness passively just report [`Self::is_ready`].
    async fn refresh_readiness(&self) -> bool {
        self.is_ready()
    }

    async fn list_payments(&self) -> Result<Vec<LedgerPayment>, NodeError>;

    /// Subscribe to invoice updates with settle index greater than `settle_index`.
    async fn subscribe_invoices(&self, settle_index: u64) -> Result<InvoiceStream, NodeError>;

    async fn list_channels(&self) -> Result<Vec<OpenChannel>, NodeError>;

    async fn get_info(&self) -> Result<NodeInfo, NodeError>;

    async fn decode_pay_req(&self, payment_request: &str) -> Result<DecodedPayReq, NodeError>;

    async fn lookup_invoice(&self, r_hash: &[u8]) -> Result<InvoiceLookup, NodeError>;

    /// Pay a BOLT11 request. `amount_sats` is only used for zero-amount requests.
    async fn send_payment(
        &self,
        payment_request: &str,
        amount_sats: i64,
    ) -> Result<SendOutcome, NodeError>;

    /// Create a private invoice and return its payment request.
    async fn add_invoice(
        &self,
        memo: &str,
        expiry_secs: i64,
        amount_sats: i64,
    ) -> Result<String, NodeError>;

    /// Human-readable name of this node backend.
    fn node_name(&self) -> &str;
}

/// Hex form used as the key for payment hashes everywhere in the store.
pub fn hash_key(hash: &[u8]) -> String {
    hex::encode(hash)
}
