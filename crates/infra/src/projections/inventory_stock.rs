use serde_json::Value as JsonValue;

use renqing_core::AggregateId;
use renqing_events::EventEnvelope;
use renqing_inventory::{InventoryEvent, InventoryItemId, Provenance};

use crate::read_model::LedgerStore;

use super::cursor::StreamCursors;
use super::ProjectionError;
use renqing_core::LedgerId;

/// Queryable stock: current quantity and details per item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryReadModel {
    pub item_id: InventoryItemId,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: u64,
    pub description: Option<String>,
    pub photos: Vec<String>,
    pub provenance: Provenance,
}

/// Inventory stock projection.
#[derive(Debug)]
pub struct InventoryStockProjection<S>
where
    S: LedgerStore<InventoryItemId, InventoryReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> InventoryStockProjection<S>
where
    S: LedgerStore<InventoryItemId, InventoryReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, ledger_id: LedgerId, item_id: &InventoryItemId) -> Option<InventoryReadModel> {
        self.store.get(ledger_id, item_id)
    }

    pub fn list(&self, ledger_id: LedgerId) -> Vec<InventoryReadModel> {
        self.store.list(ledger_id)
    }

    /// Items with stock on hand (scorer input).
    pub fn list_in_stock(&self, ledger_id: LedgerId) -> Vec<InventoryReadModel> {
        let mut items: Vec<_> = self
            .store
            .list(ledger_id)
            .into_iter()
            .filter(|rm| rm.quantity > 0)
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        items
    }

    /// Items converted from a given received gift (deletion cascade input).
    pub fn items_from_gift(&self, ledger_id: LedgerId, gift_id: AggregateId) -> Vec<InventoryItemId> {
        self.store
            .list(ledger_id)
            .into_iter()
            .filter(|rm| rm.provenance.origin_gift() == Some(gift_id))
            .map(|rm| rm.item_id)
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let ledger_id = envelope.ledger_id();
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .apply_guarded(ledger_id, aggregate_id, envelope.sequence_number(), || {
                let event: InventoryEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                let (event_ledger, item_id) = match &event {
                    InventoryEvent::ItemCreated(e) => (e.ledger_id, e.item_id),
                    InventoryEvent::ItemDetailsUpdated(e) => (e.ledger_id, e.item_id),
                    InventoryEvent::StockAdjusted(e) => (e.ledger_id, e.item_id),
                    InventoryEvent::ItemDeleted(e) => (e.ledger_id, e.item_id),
                };

                if event_ledger != ledger_id {
                    return Err(ProjectionError::LedgerIsolation(
                        "event ledger_id does not match envelope".to_string(),
                    ));
                }
                if item_id.0 != aggregate_id {
                    return Err(ProjectionError::LedgerIsolation(
                        "event item_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                match event {
                    InventoryEvent::ItemCreated(e) => {
                        self.store.upsert(
                            ledger_id,
                            e.item_id,
                            InventoryReadModel {
                                item_id: e.item_id,
                                name: e.name,
                                category: e.category,
                                quantity: e.quantity,
                                unit_price: e.unit_price,
                                description: e.description,
                                photos: e.photos,
                                provenance: e.provenance,
                            },
                        );
                    }
                    InventoryEvent::ItemDetailsUpdated(e) => {
                        if let Some(mut rm) = self.store.get(ledger_id, &e.item_id) {
                            if let Some(name) = e.name {
                                rm.name = name;
                            }
                            if let Some(category) = e.category {
                                rm.category = category;
                            }
                            if let Some(unit_price) = e.unit_price {
                                rm.unit_price = unit_price;
                            }
                            if let Some(description) = e.description {
                                rm.description = Some(description);
                            }
                            if let Some(photos) = e.photos {
                                rm.photos = photos;
                            }
                            self.store.upsert(ledger_id, e.item_id, rm);
                        }
                    }
                    InventoryEvent::StockAdjusted(e) => {
                        if let Some(mut rm) = self.store.get(ledger_id, &e.item_id) {
                            rm.quantity += e.delta;
                            self.store.upsert(ledger_id, e.item_id, rm);
                        }
                    }
                    InventoryEvent::ItemDeleted(e) => {
                        self.store.remove(ledger_id, &e.item_id);
                    }
                }

                Ok(())
            })
    }
}
