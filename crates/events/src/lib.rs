//! `renqing-events` — event abstractions shared by the domain and infra crates.
//!
//! Domain crates emit typed events; infra wraps them in ledger-scoped
//! envelopes for persistence and fan-out. Nothing here does IO.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::InMemoryEventBus;
