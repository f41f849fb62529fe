use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use renqing_core::LedgerId;
use renqing_events::EventEnvelope;
use renqing_gifts::{GiftEvent, GiftId, GiftLine, GiftStatus, ReplyLine};

use crate::read_model::LedgerStore;

use super::ProjectionError;
use super::cursor::StreamCursors;

/// Queryable received-gift ledger entry, reply fields included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftReadModel {
    pub gift_id: GiftId,
    pub from_person: String,
    pub from_company: Option<String>,
    pub received_date: NaiveDate,
    pub notes: Option<String>,
    pub photos: Vec<String>,
    pub lines: Vec<GiftLine>,
    pub estimated_value: u64,
    pub status: GiftStatus,
    pub reply_date: Option<NaiveDate>,
    pub reply_cost: Option<u64>,
    pub reply_items: Vec<ReplyLine>,
}

/// Gift ledger projection.
#[derive(Debug)]
pub struct GiftLedgerProjection<S>
where
    S: LedgerStore<GiftId, GiftReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> GiftLedgerProjection<S>
where
    S: LedgerStore<GiftId, GiftReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, ledger_id: LedgerId, gift_id: &GiftId) -> Option<GiftReadModel> {
        self.store.get(ledger_id, gift_id)
    }

    /// All gifts, most recent received date first.
    pub fn list(&self, ledger_id: LedgerId) -> Vec<GiftReadModel> {
        let mut gifts = self.store.list(ledger_id);
        gifts.sort_by(|a, b| b.received_date.cmp(&a.received_date));
        gifts
    }

    pub fn list_pending(&self, ledger_id: LedgerId) -> Vec<GiftReadModel> {
        self.list(ledger_id)
            .into_iter()
            .filter(|g| g.status == GiftStatus::Pending)
            .collect()
    }

    /// Gifts from one sender, most recent first, capped at `limit`
    /// (exchange-history input for the package prompt).
    pub fn history_from(
        &self,
        ledger_id: LedgerId,
        from_person: &str,
        limit: usize,
    ) -> Vec<GiftReadModel> {
        self.list(ledger_id)
            .into_iter()
            .filter(|g| g.from_person == from_person)
            .take(limit)
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let ledger_id = envelope.ledger_id();
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .apply_guarded(ledger_id, aggregate_id, envelope.sequence_number(), || {
                let event: GiftEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                let (event_ledger, gift_id) = match &event {
                    GiftEvent::GiftRecorded(e) => (e.ledger_id, e.gift_id),
                    GiftEvent::GiftDetailsUpdated(e) => (e.ledger_id, e.gift_id),
                    GiftEvent::ReplyRecorded(e) => (e.ledger_id, e.gift_id),
                    GiftEvent::ReplyCancelled(e) => (e.ledger_id, e.gift_id),
                    GiftEvent::GiftDeleted(e) => (e.ledger_id, e.gift_id),
                };

                if event_ledger != ledger_id {
                    return Err(ProjectionError::LedgerIsolation(
                        "event ledger_id does not match envelope".to_string(),
                    ));
                }
                if gift_id.0 != aggregate_id {
                    return Err(ProjectionError::LedgerIsolation(
                        "event gift_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                match event {
                    GiftEvent::GiftRecorded(e) => {
                        let estimated_value = e.lines.iter().map(GiftLine::subtotal).sum();
                        self.store.upsert(
                            ledger_id,
                            e.gift_id,
                            GiftReadModel {
                                gift_id: e.gift_id,
                                from_person: e.from_person,
                                from_company: e.from_company,
                                received_date: e.received_date,
                                notes: e.notes,
                                photos: e.photos,
                                lines: e.lines,
                                estimated_value,
                                status: GiftStatus::Pending,
                                reply_date: None,
                                reply_cost: None,
                                reply_items: Vec::new(),
                            },
                        );
                    }
                    GiftEvent::GiftDetailsUpdated(e) => {
                        if let Some(mut rm) = self.store.get(ledger_id, &e.gift_id) {
                            if let Some(from_person) = e.from_person {
                                rm.from_person = from_person;
                            }
                            if let Some(from_company) = e.from_company {
                                rm.from_company = Some(from_company);
                            }
                            if let Some(received_date) = e.received_date {
                                rm.received_date = received_date;
                            }
                            if let Some(notes) = e.notes {
                                rm.notes = Some(notes);
                            }
                            if let Some(photos) = e.photos {
                                rm.photos = photos;
                            }
                            self.store.upsert(ledger_id, e.gift_id, rm);
                        }
                    }
                    GiftEvent::ReplyRecorded(e) => {
                        if let Some(mut rm) = self.store.get(ledger_id, &e.gift_id) {
                            rm.status = GiftStatus::Replied;
                            rm.reply_date = Some(e.reply_date);
                            rm.reply_cost = Some(e.reply_cost);
                            rm.reply_items = e.items;
                            self.store.upsert(ledger_id, e.gift_id, rm);
                        }
                    }
                    GiftEvent::ReplyCancelled(e) => {
                        if let Some(mut rm) = self.store.get(ledger_id, &e.gift_id) {
                            rm.status = GiftStatus::Pending;
                            rm.reply_date = None;
                            rm.reply_cost = None;
                            rm.reply_items = Vec::new();
                            self.store.upsert(ledger_id, e.gift_id, rm);
                        }
                    }
                    GiftEvent::GiftDeleted(e) => {
                        self.store.remove(ledger_id, &e.gift_id);
                    }
                }

                Ok(())
            })
    }
}
