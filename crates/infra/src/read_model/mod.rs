//! Ledger-isolated read model storage abstractions.

pub mod ledger_store;

pub use ledger_store::{InMemoryLedgerStore, LedgerStore};
