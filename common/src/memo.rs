//! Invoice memo codec.
//!
//! Payment metadata travels inside the BOLT11 `description` field in one of
//! three shapes:
//!
//! 1. **Structured**: bincode-encoded [`InvoiceMemo`], carried as URL-safe
//!    unpadded base64 so the description stays valid UTF-8.
//! 2. **Legacy**: `"<description> | <payee name> | <payee image url>"`, used
//!    for standard invoices that other wallets will display.
//! 3. **Free text**: anything else, taken as the description.
//!
//! In the last two shapes the amount always comes from the invoice itself.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use bincode::Options;
use serde::{Deserialize, Serialize};

/// Delimiter of the legacy human-readable memo format.
pub const LEGACY_DELIMITER: &str = " | ";

/// BOLT11 caps the description well below this; anything larger is not ours.
const MAX_STRUCTURED_BYTES: u64 = 4096;

/// Structured metadata describing the purpose of a payment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceMemo {
    pub description: String,
    /// Amount in satoshis.
    pub amount: i64,
    pub payee_name: String,
    pub payee_image_url: String,
    pub payer_name: String,
    pub payer_image_url: String,
    /// Set on invoices created to move funds into the wallet from the routing node.
    pub transfer_request: bool,
    /// Invoice expiry in seconds; `<= 0` means the default.
    pub expiry: i64,
}

fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_STRUCTURED_BYTES)
        .reject_trailing_bytes()
}

/// A memo that cannot be carried in the structured form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoError {
    TooLarge(String),
}

impl std::fmt::Display for MemoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooLarge(msg) => write!(
                f,
                "memo exceeds {MAX_STRUCTURED_BYTES} encoded bytes: {msg}"
            ),
        }
    }
}

impl std::error::Error for MemoError {}

/// Encode `memo` in the structured form. Fails when the encoded memo would
/// not decode back under the size limit.
pub fn encode(memo: &InvoiceMemo) -> Result<String, MemoError> {
    let bytes = bincode_options()
        .serialize(memo)
        .map_err(|e| MemoError::TooLarge(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Encode `memo` in the legacy human-readable form.
pub fn encode_legacy(memo: &InvoiceMemo) -> String {
    [
        memo.description.as_str(),
        memo.payee_name.as_str(),
        memo.payee_image_url.as_str(),
    ]
    .join(LEGACY_DELIMITER)
}

/// Decode only the structured form.
pub fn decode_structured(description: &str) -> Option<InvoiceMemo> {
    let bytes = URL_SAFE_NO_PAD.decode(description).ok()?;
    bincode_options().deserialize(&bytes).ok()
}

/// Best-effort decode of a BOLT11 description. Never fails.
///
/// `fallback_amount` is the invoice's own declared amount and is used whenever
/// the description is not in the structured form.
pub fn decode(description: &str, fallback_amount: i64) -> InvoiceMemo {
    if let Some(memo) = decode_structured(description) {
        return memo;
    }

    let mut memo = InvoiceMemo {
        amount: fallback_amount,
        ..Default::default()
    };
    if description.matches(LEGACY_DELIMITER).count() == 2 {
        let mut fields = description.splitn(3, LEGACY_DELIMITER);
        memo.description = fields.next().unwrap_or_default().to_string();
        memo.payee_name = fields.next().unwrap_or_default().to_string();
        memo.payee_image_url = fields.next().unwrap_or_default().to_string();
    } else {
        memo.description = description.to_string();
    }
    memo
}
