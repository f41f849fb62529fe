//! Aggregate execution contract for the event-sourced domain crates.

use crate::error::{DomainError, DomainResult};

/// Minimal aggregate-root interface: identity plus a stream version.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state; for
    /// event-sourced aggregates this is the number of applied events.
    fn version(&self) -> u64;
}

/// Version expectation for optimistic concurrency on append.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip the check (idempotent commands, migrations).
    Any,
    /// Require the stream to be at exactly this version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "version check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Decision/evolution split for event-sourced aggregates.
///
/// `handle` is a pure decision function: current state + command → events, no
/// mutation, no IO. `apply` evolves state from one event and must stay
/// deterministic so streams replay to identical state.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Evolve in-memory state from a single event (and advance `version()`).
    fn apply(&mut self, event: &Self::Event);

    /// Decide which events to emit for a command against current state.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}
