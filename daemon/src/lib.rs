//! Lightning payment history reconciliation.
//!
//! Merges three sources into one ordered history:
//!
//! 1. **Ledger** → [`sync::SentPaymentSynchronizer`] imports completed outbound payments
//! 2. **Invoice stream** → [`watcher::InvoiceWatcher`] records settled inbound invoices
//! 3. **In-flight HTLCs** → [`pending::PendingResolver`] computes pending payments per query
//!
//! [`assembler::PaymentListAssembler`] merges the persisted and pending records
//! for callers; [`history::PaymentHistory`] wires everything to one node and store.

pub mod api;
pub mod assembler;
pub mod backup;
pub mod config;
pub mod error;
pub mod history;
pub mod invoices;
pub mod lightning;
pub mod notify;
pub mod pending;
pub mod requests;
pub mod singleflight;
pub mod store;
pub mod supervisor;
pub mod sync;
pub mod watcher;
