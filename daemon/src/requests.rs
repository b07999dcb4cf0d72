use std::sync::Arc;

use payhist_common::memo::{self, InvoiceMemo};
use payhist_common::node::{hash_key, DecodedPayReq, LightningNode};
use payhist_common::store::PaymentStore;
use tracing::debug;

use crate::error::Result;
use crate::singleflight::SingleFlight;

/// A payment request decoded by the node, plus the memo recovered from its description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestMetadata {
    pub decoded: DecodedPayReq,
    pub memo: InvoiceMemo,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum FlightKey {
    Outgoing(String),
    Incoming(String),
}

/// Resolves payment hashes to the payment requests they were paid or issued
/// for. Concurrent lookups of the same hash share one round trip.
pub struct RequestResolver {
    node: Arc<dyn LightningNode>,
    store: Arc<dyn PaymentStore>,
    flights: SingleFlight<FlightKey, Result<Option<RequestMetadata>>>,
}

impl RequestResolver {
    pub fn new(node: Arc<dyn LightningNode>, store: Arc<dyn PaymentStore>) -> Self {
        Self {
            node,
            store,
            flights: SingleFlight::new(),
        }
    }

    /// Decode `payment_request` and its memo. The memo never fails to decode;
    /// only the node call can.
    pub async fn decode(&self, payment_request: &str) -> Result<RequestMetadata> {
        let decoded = self.node.decode_pay_req(payment_request).await?;
        let memo = memo::decode(&decoded.description, decoded.num_satoshis);
        Ok(RequestMetadata { decoded, memo })
    }

    /// Metadata of an outgoing payment, from the request text saved when it was sent.
    pub async fn outgoing(&self, payment_hash: &str) -> Result<Option<RequestMetadata>> {
        let key = FlightKey::Outgoing(payment_hash.to_string());
        self.flights
            .run(key, || async {
                match self.store.payment_request(payment_hash)? {
                    Some(request) if !request.is_empty() => self.decode(&request).await.map(Some),
                    _ => {
                        debug!(payment_hash, "no saved payment request");
                        Ok(None)
                    }
                }
            })
            .await
    }

    /// Metadata of an incoming payment, from the node's own invoice.
    pub async fn incoming(&self, r_hash: &[u8]) -> Result<Option<RequestMetadata>> {
        let key = FlightKey::Incoming(hash_key(r_hash));
        self.flights
            .run(key, || async {
                let invoice = self.node.lookup_invoice(r_hash).await?;
                if invoice.payment_request.is_empty() {
                    return Ok(None);
                }
                self.decode(&invoice.payment_request).await.map(Some)
            })
            .await
    }
}
