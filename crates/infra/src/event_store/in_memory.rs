use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use renqing_core::{AggregateId, ExpectedVersion, LedgerId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    ledger_id: LedgerId,
    aggregate_id: AggregateId,
}

/// In-memory append-only event store.
///
/// Default wiring for dev and the substrate for tests. A single write lock
/// over all streams makes the multi-stream append trivially atomic.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Validate one batch: non-empty, single stream, single aggregate type.
    fn batch_key(events: &[UncommittedEvent]) -> Result<StreamKey, EventStoreError> {
        let first = events.first().ok_or_else(|| {
            EventStoreError::InvalidAppend("empty batch in multi-stream append".to_string())
        })?;

        let key = StreamKey {
            ledger_id: first.ledger_id,
            aggregate_id: first.aggregate_id,
        };

        for (idx, e) in events.iter().enumerate() {
            if e.ledger_id != key.ledger_id {
                return Err(EventStoreError::LedgerIsolation(format!(
                    "batch contains multiple ledger_ids (index {idx})"
                )));
            }
            if e.aggregate_id != key.aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != first.aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        Ok(key)
    }

    fn check_batch(
        stream: &[StoredEvent],
        events: &[UncommittedEvent],
        expected_version: ExpectedVersion,
    ) -> Result<(), EventStoreError> {
        let current = Self::current_version(stream);
        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        // Aggregate type is pinned by the first event ever appended.
        if let (Some(existing), Some(incoming)) = (stream.first(), events.first()) {
            if existing.aggregate_type != incoming.aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    existing.aggregate_type, incoming.aggregate_type
                )));
            }
        }

        Ok(())
    }

    fn commit_batch(stream: &mut Vec<StoredEvent>, events: Vec<UncommittedEvent>) -> Vec<StoredEvent> {
        let mut next = Self::current_version(stream) + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                ledger_id: e.ledger_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            stream.push(stored.clone());
            committed.push(stored);
        }
        committed
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }
        self.append_streams(vec![StreamAppend {
            events,
            expected_version,
        }])
    }

    fn append_streams(
        &self,
        batches: Vec<StreamAppend>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if batches.is_empty() {
            return Ok(vec![]);
        }

        // Validate batch shapes before taking the lock.
        let mut keys = Vec::with_capacity(batches.len());
        let mut seen = HashSet::new();
        let mut ledger_id = None;
        for batch in &batches {
            let key = Self::batch_key(&batch.events)?;
            if !seen.insert(key) {
                return Err(EventStoreError::InvalidAppend(
                    "multi-stream append targets the same stream twice".to_string(),
                ));
            }
            match ledger_id {
                None => ledger_id = Some(key.ledger_id),
                Some(l) if l != key.ledger_id => {
                    return Err(EventStoreError::LedgerIsolation(
                        "multi-stream append spans multiple ledgers".to_string(),
                    ));
                }
                Some(_) => {}
            }
            keys.push(key);
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        // Phase 1: every batch must pass its version check before anything
        // is written — all-or-nothing.
        for (key, batch) in keys.iter().zip(&batches) {
            let stream = streams.get(key).map(Vec::as_slice).unwrap_or(&[]);
            Self::check_batch(stream, &batch.events, batch.expected_version)?;
        }

        // Phase 2: commit all batches under the same lock.
        let mut committed = Vec::new();
        for (key, batch) in keys.into_iter().zip(batches) {
            let stream = streams.entry(key).or_default();
            committed.extend(Self::commit_batch(stream, batch.events));
        }

        Ok(committed)
    }

    fn load_stream(
        &self,
        ledger_id: LedgerId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            ledger_id,
            aggregate_id,
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams.get(&key).cloned().unwrap_or_default())
    }
}
