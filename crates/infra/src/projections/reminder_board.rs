use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use renqing_core::LedgerId;
use renqing_events::EventEnvelope;
use renqing_gifts::{GiftId, ReminderEvent, ReminderId, ReminderKind};

use crate::read_model::LedgerStore;

use super::ProjectionError;
use super::cursor::StreamCursors;

/// Queryable reminder entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderReadModel {
    pub reminder_id: ReminderId,
    pub gift_id: GiftId,
    pub kind: ReminderKind,
    pub remind_on: NaiveDate,
    pub message: Option<String>,
    pub completed: bool,
}

/// Reminder board projection.
#[derive(Debug)]
pub struct ReminderBoardProjection<S>
where
    S: LedgerStore<ReminderId, ReminderReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ReminderBoardProjection<S>
where
    S: LedgerStore<ReminderId, ReminderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, ledger_id: LedgerId, reminder_id: &ReminderId) -> Option<ReminderReadModel> {
        self.store.get(ledger_id, reminder_id)
    }

    /// All reminders, earliest date first.
    pub fn list(&self, ledger_id: LedgerId) -> Vec<ReminderReadModel> {
        let mut reminders = self.store.list(ledger_id);
        reminders.sort_by(|a, b| a.remind_on.cmp(&b.remind_on));
        reminders
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let ledger_id = envelope.ledger_id();
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .apply_guarded(ledger_id, aggregate_id, envelope.sequence_number(), || {
                let event: ReminderEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                let (event_ledger, reminder_id) = match &event {
                    ReminderEvent::ReminderCreated(e) => (e.ledger_id, e.reminder_id),
                    ReminderEvent::ReminderCompleted(e) => (e.ledger_id, e.reminder_id),
                    ReminderEvent::ReminderDeleted(e) => (e.ledger_id, e.reminder_id),
                };

                if event_ledger != ledger_id {
                    return Err(ProjectionError::LedgerIsolation(
                        "event ledger_id does not match envelope".to_string(),
                    ));
                }
                if reminder_id.0 != aggregate_id {
                    return Err(ProjectionError::LedgerIsolation(
                        "event reminder_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                match event {
                    ReminderEvent::ReminderCreated(e) => {
                        self.store.upsert(
                            ledger_id,
                            e.reminder_id,
                            ReminderReadModel {
                                reminder_id: e.reminder_id,
                                gift_id: e.gift_id,
                                kind: e.kind,
                                remind_on: e.remind_on,
                                message: e.message,
                                completed: false,
                            },
                        );
                    }
                    ReminderEvent::ReminderCompleted(e) => {
                        if let Some(mut rm) = self.store.get(ledger_id, &e.reminder_id) {
                            rm.completed = true;
                            self.store.upsert(ledger_id, e.reminder_id, rm);
                        }
                    }
                    ReminderEvent::ReminderDeleted(e) => {
                        self.store.remove(ledger_id, &e.reminder_id);
                    }
                }

                Ok(())
            })
    }
}
