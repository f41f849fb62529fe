use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use renqing_core::LedgerId;
use renqing_events::EventEnvelope;
use renqing_outgoing::{OutgoingGiftEvent, OutgoingGiftId, OutgoingLine};

use crate::read_model::LedgerStore;

use super::ProjectionError;
use super::cursor::StreamCursors;

/// Queryable outgoing-gift entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingReadModel {
    pub outgoing_id: OutgoingGiftId,
    pub to_person: String,
    pub to_company: Option<String>,
    pub send_date: NaiveDate,
    pub notes: Option<String>,
    pub photos: Vec<String>,
    pub lines: Vec<OutgoingLine>,
    pub total_cost: u64,
}

/// Outgoing ledger projection.
#[derive(Debug)]
pub struct OutgoingLedgerProjection<S>
where
    S: LedgerStore<OutgoingGiftId, OutgoingReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> OutgoingLedgerProjection<S>
where
    S: LedgerStore<OutgoingGiftId, OutgoingReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, ledger_id: LedgerId, outgoing_id: &OutgoingGiftId) -> Option<OutgoingReadModel> {
        self.store.get(ledger_id, outgoing_id)
    }

    /// All outgoing gifts, most recent send date first.
    pub fn list(&self, ledger_id: LedgerId) -> Vec<OutgoingReadModel> {
        let mut gifts = self.store.list(ledger_id);
        gifts.sort_by(|a, b| b.send_date.cmp(&a.send_date));
        gifts
    }

    /// Outgoing gifts to one recipient, most recent first, capped at
    /// `limit`.
    pub fn history_to(
        &self,
        ledger_id: LedgerId,
        to_person: &str,
        limit: usize,
    ) -> Vec<OutgoingReadModel> {
        self.list(ledger_id)
            .into_iter()
            .filter(|g| g.to_person == to_person)
            .take(limit)
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let ledger_id = envelope.ledger_id();
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .apply_guarded(ledger_id, aggregate_id, envelope.sequence_number(), || {
                let event: OutgoingGiftEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                let (event_ledger, outgoing_id) = match &event {
                    OutgoingGiftEvent::OutgoingGiftRecorded(e) => (e.ledger_id, e.outgoing_id),
                    OutgoingGiftEvent::OutgoingGiftDeleted(e) => (e.ledger_id, e.outgoing_id),
                };

                if event_ledger != ledger_id {
                    return Err(ProjectionError::LedgerIsolation(
                        "event ledger_id does not match envelope".to_string(),
                    ));
                }
                if outgoing_id.0 != aggregate_id {
                    return Err(ProjectionError::LedgerIsolation(
                        "event outgoing_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                match event {
                    OutgoingGiftEvent::OutgoingGiftRecorded(e) => {
                        self.store.upsert(
                            ledger_id,
                            e.outgoing_id,
                            OutgoingReadModel {
                                outgoing_id: e.outgoing_id,
                                to_person: e.to_person,
                                to_company: e.to_company,
                                send_date: e.send_date,
                                notes: e.notes,
                                photos: e.photos,
                                lines: e.lines,
                                total_cost: e.total_cost,
                            },
                        );
                    }
                    OutgoingGiftEvent::OutgoingGiftDeleted(e) => {
                        self.store.remove(ledger_id, &e.outgoing_id);
                    }
                }

                Ok(())
            })
    }
}
