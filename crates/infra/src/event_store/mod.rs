//! Append-only event store boundary.
//!
//! Streams are ledger-scoped; the trait makes no storage assumptions. The
//! in-memory store serves dev and tests, the Postgres store (feature
//! `postgres`) is the durable backend.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};
