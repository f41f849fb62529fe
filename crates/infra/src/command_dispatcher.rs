//! Command execution pipeline for single-aggregate operations.
//!
//! One consistent path for every command: load the stream, rehydrate the
//! aggregate, let it decide, append with an exact-version expectation, then
//! publish the committed events. Cross-aggregate operations that need an
//! atomic multi-stream commit live in [`crate::workflows`] and reuse the
//! rehydration helpers exported here.
//!
//! Concurrency is optimistic: the append expects the exact version that was
//! loaded, so a concurrent writer surfaces as `DispatchError::Concurrency`
//! and the caller may retry with fresh state.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use renqing_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, LedgerId};
use renqing_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug)]
pub enum DispatchError {
    /// Optimistic concurrency failure; retry with fresh state.
    Concurrency(String),
    /// Ledger isolation violation (cross-ledger stream mixing).
    LedgerIsolation(String),
    /// Deterministic domain validation failure.
    Validation(String),
    /// Deterministic domain invariant failure.
    InvariantViolation(String),
    /// Illegal state transition or duplicate creation.
    StateConflict(String),
    /// Domain-level not found.
    NotFound,
    /// Historical event payload failed to deserialize.
    Deserialize(String),
    /// The event store rejected the append.
    Store(EventStoreError),
    /// Publication failed after a successful append (at-least-once; the
    /// events are durable, only fan-out is missing).
    Publish(String),
}

impl core::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DispatchError::Concurrency(msg) => write!(f, "concurrency conflict: {msg}"),
            DispatchError::LedgerIsolation(msg) => write!(f, "ledger isolation: {msg}"),
            DispatchError::Validation(msg) => write!(f, "validation failed: {msg}"),
            DispatchError::InvariantViolation(msg) => write!(f, "invariant violated: {msg}"),
            DispatchError::StateConflict(msg) => write!(f, "state conflict: {msg}"),
            DispatchError::NotFound => write!(f, "not found"),
            DispatchError::Deserialize(msg) => write!(f, "deserialize failed: {msg}"),
            DispatchError::Store(e) => write!(f, "store error: {e}"),
            DispatchError::Publish(msg) => write!(f, "publish failed: {msg}"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            EventStoreError::LedgerIsolation(msg) => DispatchError::LedgerIsolation(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::StateConflict(msg),
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Load and rehydrate an aggregate from its stream.
///
/// Returns the aggregate plus the exact version to expect on append.
/// Workflows use this to pre-validate several aggregates before committing
/// a multi-stream append.
pub fn rehydrate<A, S>(
    store: &S,
    ledger_id: LedgerId,
    aggregate_id: AggregateId,
    make_aggregate: impl FnOnce(LedgerId, AggregateId) -> A,
) -> Result<(A, ExpectedVersion), DispatchError>
where
    A: Aggregate<Error = DomainError>,
    A::Event: DeserializeOwned,
    S: EventStore + ?Sized,
{
    let history = store.load_stream(ledger_id, aggregate_id)?;
    validate_loaded_stream(ledger_id, aggregate_id, &history)?;
    let expected = ExpectedVersion::Exact(stream_version(&history));

    let mut aggregate = make_aggregate(ledger_id, aggregate_id);
    apply_history::<A>(&mut aggregate, &history)?;

    Ok((aggregate, expected))
}

/// Serialize decided events into uncommitted store events.
pub fn to_uncommitted<E>(
    ledger_id: LedgerId,
    aggregate_id: AggregateId,
    aggregate_type: &str,
    events: &[E],
) -> Result<Vec<UncommittedEvent>, DispatchError>
where
    E: renqing_events::Event + Serialize,
{
    events
        .iter()
        .map(|ev| {
            UncommittedEvent::from_typed(ledger_id, aggregate_id, aggregate_type, Uuid::now_v7(), ev)
                .map_err(DispatchError::from)
        })
        .collect()
}

/// Publish committed events to the bus, after the append has succeeded.
pub fn publish_committed<B>(bus: &B, committed: &[StoredEvent]) -> Result<(), DispatchError>
where
    B: EventBus<EventEnvelope<JsonValue>> + ?Sized,
{
    for stored in committed {
        bus.publish(stored.to_envelope())
            .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
    }
    Ok(())
}

/// Reusable command execution engine for event-sourced aggregates.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Execute one command against one aggregate stream.
    ///
    /// Pipeline: load → rehydrate → decide → append (exact version) →
    /// publish. A no-op decision (no events) skips the append entirely.
    pub fn dispatch<A>(
        &self,
        ledger_id: LedgerId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(LedgerId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: renqing_events::Event + Serialize + DeserializeOwned,
    {
        let (aggregate, expected) = rehydrate(&self.store, ledger_id, aggregate_id, make_aggregate)?;

        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let uncommitted = to_uncommitted(ledger_id, aggregate_id, aggregate_type, &decided)?;
        let committed = self.store.append(uncommitted, expected)?;

        publish_committed(&self.bus, &committed)?;

        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    ledger_id: LedgerId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Defense in depth: even a buggy backend must not leak another ledger's
    // events or a non-monotonic stream into rehydration.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.ledger_id != ledger_id {
            return Err(DispatchError::LedgerIsolation(format!(
                "loaded stream contains wrong ledger_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::LedgerIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
