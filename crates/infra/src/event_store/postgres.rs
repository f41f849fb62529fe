//! Postgres-backed event store (feature `postgres`).
//!
//! Streams live in a single `events` table keyed by (ledger_id,
//! aggregate_id, sequence_number) with a unique constraint on that triple.
//! Optimistic concurrency is enforced twice: the version check inside the
//! transaction, and the unique constraint catching appends that race past
//! it (surfaced as `Concurrency`).
//!
//! The multi-stream append runs all batches in one transaction, which is
//! what makes the reply/cancel workflows atomic against this backend.
//!
//! The sync [`EventStore`] impl bridges into the async pool via
//! `block_in_place`, so it must run on a multi-threaded Tokio runtime.

use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::instrument;

use renqing_core::{AggregateId, ExpectedVersion, LedgerId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    event_id        UUID PRIMARY KEY,
    ledger_id       UUID NOT NULL,
    aggregate_id    UUID NOT NULL,
    aggregate_type  TEXT NOT NULL,
    sequence_number BIGINT NOT NULL CHECK (sequence_number > 0),
    event_type      TEXT NOT NULL,
    event_version   INT NOT NULL,
    occurred_at     TIMESTAMPTZ NOT NULL,
    payload         JSONB NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (ledger_id, aggregate_id, sequence_number)
);
CREATE INDEX IF NOT EXISTS events_stream_idx
    ON events (ledger_id, aggregate_id, sequence_number);
"#;

#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: Arc<PgPool>,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the events table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<(), EventStoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(ledger_id = %ledger_id, aggregate_id = %aggregate_id))]
    pub async fn load_stream_async(
        &self,
        ledger_id: LedgerId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, ledger_id, aggregate_id, aggregate_type,
                   sequence_number, event_type, event_version, occurred_at, payload
            FROM events
            WHERE ledger_id = $1 AND aggregate_id = $2
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(ledger_id.as_uuid())
        .bind(aggregate_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_stream", e))?;

        rows.iter().map(row_to_stored).collect()
    }

    #[instrument(skip(self, batches), fields(batch_count = batches.len()))]
    pub async fn append_streams_async(
        &self,
        batches: Vec<StreamAppend>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if batches.is_empty() {
            return Ok(vec![]);
        }

        for batch in &batches {
            validate_batch(&batch.events)?;
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let mut committed = Vec::new();

        for batch in batches {
            let first = &batch.events[0];
            let ledger_id = first.ledger_id;
            let aggregate_id = first.aggregate_id;
            let aggregate_type = first.aggregate_type.clone();

            let row = sqlx::query(
                r#"
                SELECT COALESCE(MAX(sequence_number), 0) AS version,
                       MAX(aggregate_type) AS aggregate_type
                FROM events
                WHERE ledger_id = $1 AND aggregate_id = $2
                "#,
            )
            .bind(ledger_id.as_uuid())
            .bind(aggregate_id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("check_version", e))?;

            let current_version: i64 = row
                .try_get("version")
                .map_err(|e| EventStoreError::InvalidAppend(e.to_string()))?;
            let existing_type: Option<String> = row
                .try_get("aggregate_type")
                .map_err(|e| EventStoreError::InvalidAppend(e.to_string()))?;

            if let Some(existing) = existing_type {
                if existing != aggregate_type {
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "stream aggregate_type is '{existing}', attempted append with '{aggregate_type}'"
                    )));
                }
            }

            let current_version = current_version as u64;
            if !batch.expected_version.matches(current_version) {
                // Dropping the transaction rolls everything back: nothing
                // from earlier batches is kept either.
                return Err(EventStoreError::Concurrency(format!(
                    "expected {:?}, found {current_version}",
                    batch.expected_version
                )));
            }

            let mut next_sequence = current_version + 1;
            for event in batch.events {
                sqlx::query(
                    r#"
                    INSERT INTO events (
                        event_id, ledger_id, aggregate_id, aggregate_type,
                        sequence_number, event_type, event_version, occurred_at, payload
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(event.event_id)
                .bind(ledger_id.as_uuid())
                .bind(aggregate_id.as_uuid())
                .bind(&aggregate_type)
                .bind(next_sequence as i64)
                .bind(&event.event_type)
                .bind(event.event_version as i32)
                .bind(event.occurred_at)
                .bind(&event.payload)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        EventStoreError::Concurrency(format!(
                            "concurrent append detected: sequence_number {next_sequence} already exists"
                        ))
                    } else {
                        map_sqlx_error("insert_event", e)
                    }
                })?;

                committed.push(StoredEvent {
                    event_id: event.event_id,
                    ledger_id: event.ledger_id,
                    aggregate_id: event.aggregate_id,
                    aggregate_type: event.aggregate_type,
                    sequence_number: next_sequence,
                    event_type: event.event_type,
                    event_version: event.event_version,
                    occurred_at: event.occurred_at,
                    payload: event.payload,
                });
                next_sequence += 1;
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        Ok(committed)
    }
}

fn validate_batch(events: &[UncommittedEvent]) -> Result<(), EventStoreError> {
    let first = events.first().ok_or_else(|| {
        EventStoreError::InvalidAppend("empty batch in multi-stream append".to_string())
    })?;

    for (idx, e) in events.iter().enumerate() {
        if e.ledger_id != first.ledger_id {
            return Err(EventStoreError::LedgerIsolation(format!(
                "batch contains multiple ledger_ids (index {idx})"
            )));
        }
        if e.aggregate_id != first.aggregate_id {
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

    Ok(())
}

fn row_to_stored(row: &sqlx::postgres::PgRow) -> Result<StoredEvent, EventStoreError> {
    let read = |e: sqlx::Error| EventStoreError::InvalidAppend(format!("bad event row: {e}"));

    Ok(StoredEvent {
        event_id: row.try_get("event_id").map_err(read)?,
        ledger_id: LedgerId::from_uuid(row.try_get("ledger_id").map_err(read)?),
        aggregate_id: AggregateId::from_uuid(row.try_get("aggregate_id").map_err(read)?),
        aggregate_type: row.try_get("aggregate_type").map_err(read)?,
        sequence_number: row.try_get::<i64, _>("sequence_number").map_err(read)? as u64,
        event_type: row.try_get("event_type").map_err(read)?,
        event_version: row.try_get::<i32, _>("event_version").map_err(read)? as u32,
        occurred_at: row.try_get("occurred_at").map_err(read)?,
        payload: row.try_get("payload").map_err(read)?,
    })
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

fn map_sqlx_error(operation: &str, e: sqlx::Error) -> EventStoreError {
    EventStoreError::InvalidAppend(format!("{operation} failed: {e}"))
}

/// Sync bridge for the dispatcher and workflows.
///
/// Requires a multi-threaded Tokio runtime: `block_in_place` moves the
/// caller off the async worker before blocking on the pool.
impl EventStore for PostgresEventStore {
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
        let store = self.clone();
        tokio::task::block_in_place(move || {
            tokio::runtime::Handle::current().block_on(store.append_streams_async(batches))
        })
    }

    fn load_stream(
        &self,
        ledger_id: LedgerId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let store = self.clone();
        tokio::task::block_in_place(move || {
            tokio::runtime::Handle::current().block_on(store.load_stream_async(ledger_id, aggregate_id))
        })
    }
}
