use serde_json::Value as JsonValue;

use renqing_contacts::{ContactEvent, ContactId, ContactProfile, normalize_name};
use renqing_core::LedgerId;
use renqing_events::EventEnvelope;

use crate::read_model::LedgerStore;

use super::ProjectionError;
use super::cursor::StreamCursors;

/// Queryable contact entry; `normalized_name` is the identity key used for
/// lookups and the auto-create-on-record checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactReadModel {
    pub contact_id: ContactId,
    pub name: String,
    pub normalized_name: String,
    pub profile: ContactProfile,
}

/// Contact directory projection.
#[derive(Debug)]
pub struct ContactDirectoryProjection<S>
where
    S: LedgerStore<ContactId, ContactReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ContactDirectoryProjection<S>
where
    S: LedgerStore<ContactId, ContactReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, ledger_id: LedgerId, contact_id: &ContactId) -> Option<ContactReadModel> {
        self.store.get(ledger_id, contact_id)
    }

    pub fn list(&self, ledger_id: LedgerId) -> Vec<ContactReadModel> {
        let mut contacts = self.store.list(ledger_id);
        contacts.sort_by(|a, b| a.normalized_name.cmp(&b.normalized_name));
        contacts
    }

    /// Case/whitespace-insensitive lookup by name.
    pub fn find_by_name(&self, ledger_id: LedgerId, name: &str) -> Option<ContactReadModel> {
        let needle = normalize_name(name);
        self.store
            .list(ledger_id)
            .into_iter()
            .find(|c| c.normalized_name == needle)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let ledger_id = envelope.ledger_id();
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .apply_guarded(ledger_id, aggregate_id, envelope.sequence_number(), || {
                let event: ContactEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                let (event_ledger, contact_id) = match &event {
                    ContactEvent::ContactCreated(e) => (e.ledger_id, e.contact_id),
                    ContactEvent::ContactProfileUpdated(e) => (e.ledger_id, e.contact_id),
                    ContactEvent::ContactDeleted(e) => (e.ledger_id, e.contact_id),
                };

                if event_ledger != ledger_id {
                    return Err(ProjectionError::LedgerIsolation(
                        "event ledger_id does not match envelope".to_string(),
                    ));
                }
                if contact_id.0 != aggregate_id {
                    return Err(ProjectionError::LedgerIsolation(
                        "event contact_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                match event {
                    ContactEvent::ContactCreated(e) => {
                        self.store.upsert(
                            ledger_id,
                            e.contact_id,
                            ContactReadModel {
                                contact_id: e.contact_id,
                                normalized_name: normalize_name(&e.name),
                                name: e.name,
                                profile: e.profile,
                            },
                        );
                    }
                    ContactEvent::ContactProfileUpdated(e) => {
                        if let Some(mut rm) = self.store.get(ledger_id, &e.contact_id) {
                            if let Some(name) = e.name {
                                rm.normalized_name = normalize_name(&name);
                                rm.name = name;
                            }
                            if let Some(phone) = e.phone {
                                rm.profile.phone = Some(phone);
                            }
                            if let Some(email) = e.email {
                                rm.profile.email = Some(email);
                            }
                            if let Some(address) = e.address {
                                rm.profile.address = Some(address);
                            }
                            if let Some(company) = e.company {
                                rm.profile.company = Some(company);
                            }
                            if let Some(notes) = e.notes {
                                rm.profile.notes = Some(notes);
                            }
                            if let Some(age) = e.age {
                                rm.profile.age = Some(age);
                            }
                            if let Some(gender) = e.gender {
                                rm.profile.gender = Some(gender);
                            }
                            self.store.upsert(ledger_id, e.contact_id, rm);
                        }
                    }
                    ContactEvent::ContactDeleted(e) => {
                        self.store.remove(ledger_id, &e.contact_id);
                    }
                }

                Ok(())
            })
    }
}
