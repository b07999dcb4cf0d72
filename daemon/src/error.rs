use payhist_common::node::NodeError;
use payhist_common::store::StoreError;
use thiserror::Error;

/// Errors surfaced by the reconciliation engine.
///
/// `Clone` so a single-flight lookup can hand the same failure to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("lightning node: {0}")]
    Node(#[from] NodeError),

    #[error("payment store: {0}")]
    Store(#[from] StoreError),

    /// The node accepted the request but reported the payment as failed.
    #[error("payment failed: {0}")]
    PaymentFailed(String),

    #[error("invalid invoice memo: {0}")]
    InvalidMemo(String),

    #[error("invalid payment hash: {0}")]
    InvalidHash(String),

    #[error("invoice subscription ended")]
    StreamClosed,

    #[error("background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
