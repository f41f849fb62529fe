use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use renqing_core::{AggregateId, ExpectedVersion, LedgerId};
use std::sync::Arc;

/// An event ready for persistence, not yet assigned a sequence number.
///
/// Built from a typed domain event via [`UncommittedEvent::from_typed`]; the
/// store assigns sequence numbers during append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub ledger_id: LedgerId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A persisted event with its position in the aggregate stream.
///
/// Sequence numbers are per (ledger, aggregate) stream, start at 1, and
/// never change once assigned; they double as the stream version for
/// optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub ledger_id: LedgerId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Envelope form for publication on the event bus.
    pub fn to_envelope(&self) -> renqing_events::EventEnvelope<JsonValue> {
        renqing_events::EventEnvelope::new(
            self.event_id,
            self.ledger_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.payload.clone(),
        )
    }
}

/// One stream's contribution to a multi-stream append: its new events plus
/// the version the stream is expected to be at.
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub events: Vec<UncommittedEvent>,
    pub expected_version: ExpectedVersion,
}

/// Infrastructure-level store failure.
///
/// Domain failures (validation, invariants) never reach this type; these are
/// storage, concurrency, and isolation errors.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("ledger isolation violation: {0}")]
    LedgerIsolation(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("event publication failed: {0}")]
    Publish(String),
}

/// Append-only, ledger-isolated event store.
///
/// Streams are keyed by (ledger, aggregate); within a stream sequence
/// numbers increase monotonically from 1. Implementations must:
/// - enforce ledger isolation on both read and write;
/// - check `ExpectedVersion` against the current stream version;
/// - persist each append atomically — and for [`append_streams`], persist
///   *all* batches atomically: a conflict or failure in any batch commits
///   nothing. The reply/cancel workflows depend on that all-or-nothing
///   guarantee to keep gift status and inventory quantities in step.
///
/// [`append_streams`]: EventStore::append_streams
pub trait EventStore: Send + Sync {
    /// Append events to a single aggregate stream.
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Atomically append to several streams of the same ledger.
    ///
    /// Every batch must pass its own version check; on any failure the whole
    /// operation is rejected with nothing persisted. Returns the committed
    /// events in batch order. Batches must target distinct streams.
    fn append_streams(
        &self,
        batches: Vec<StreamAppend>,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full stream for a ledger + aggregate.
    fn load_stream(
        &self,
        ledger_id: LedgerId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn append_streams(
        &self,
        batches: Vec<StreamAppend>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append_streams(batches)
    }

    fn load_stream(
        &self,
        ledger_id: LedgerId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(ledger_id, aggregate_id)
    }
}

impl UncommittedEvent {
    /// Wrap a typed domain event with stream metadata, serializing the
    /// payload to JSON.
    pub fn from_typed<E>(
        ledger_id: LedgerId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: renqing_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            ledger_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
