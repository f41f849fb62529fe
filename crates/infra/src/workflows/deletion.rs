//! Gift deletion with its converted stock swept along.
//!
//! Inventory items converted from a received gift carry its id in their
//! provenance; deleting the gift removes those items in the same atomic
//! append. The caller looks the converted items up in the stock read model
//! and passes them in, keeping this workflow free of read-model coupling.

use serde_json::Value as JsonValue;

use renqing_core::{Aggregate, DomainError};
use renqing_events::{EventBus, EventEnvelope};
use renqing_gifts::{DeleteGift, GiftCommand, GiftId, ReceivedGift};
use renqing_inventory::{DeleteItem, InventoryCommand, InventoryItem, InventoryItemId};

use crate::command_dispatcher::{DispatchError, publish_committed, rehydrate, to_uncommitted};
use crate::event_store::{EventStore, StoredEvent, StreamAppend};

use super::{GIFT_AGGREGATE, INVENTORY_AGGREGATE};

pub struct GiftRemovalWorkflow<S, B> {
    store: S,
    bus: B,
}

impl<S, B> GiftRemovalWorkflow<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }
}

impl<S, B> GiftRemovalWorkflow<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Delete a gift together with the inventory items converted from it.
    ///
    /// An already-deleted converted item is skipped rather than failing the
    /// whole deletion; the read model may lag the streams slightly.
    #[tracing::instrument(skip(self, cmd, converted_items), fields(gift_id = %cmd.gift_id))]
    pub fn delete_gift(
        &self,
        cmd: DeleteGift,
        converted_items: &[InventoryItemId],
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let ledger_id = cmd.ledger_id;
        let gift_agg = cmd.gift_id.0;

        let (gift, gift_expected) = rehydrate::<ReceivedGift, _>(
            &self.store,
            ledger_id,
            gift_agg,
            |_, id| ReceivedGift::empty(GiftId::new(id)),
        )?;

        let occurred_at = cmd.occurred_at;
        let gift_events = gift
            .handle(&GiftCommand::DeleteGift(cmd))
            .map_err(DispatchError::from)?;

        let mut batches = vec![StreamAppend {
            events: to_uncommitted(ledger_id, gift_agg, GIFT_AGGREGATE, &gift_events)?,
            expected_version: gift_expected,
        }];

        for &item_id in converted_items {
            let item_agg = item_id.0;
            let (item, expected) = rehydrate::<InventoryItem, _>(
                &self.store,
                ledger_id,
                item_agg,
                |_, id| InventoryItem::empty(InventoryItemId::new(id)),
            )?;

            let decided = item.handle(&InventoryCommand::DeleteItem(DeleteItem {
                ledger_id,
                item_id,
                occurred_at,
            }));

            match decided {
                Ok(events) => batches.push(StreamAppend {
                    events: to_uncommitted(ledger_id, item_agg, INVENTORY_AGGREGATE, &events)?,
                    expected_version: expected,
                }),
                Err(DomainError::NotFound) => {
                    tracing::debug!(%item_id, "converted item already gone, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let committed = self.store.append_streams(batches)?;
        publish_committed(&self.bus, &committed)?;

        tracing::info!(events = committed.len(), "gift deleted");
        Ok(committed)
    }
}
