//! Reply / cancel-reply: gift status and inventory move together or not at
//! all.

use serde_json::Value as JsonValue;

use renqing_core::{Aggregate, LedgerId};
use renqing_events::{EventBus, EventEnvelope};
use renqing_gifts::{
    CancelReply, GiftCommand, GiftEvent, GiftId, ReceivedGift, RecordReply, ReplyLine,
};
use renqing_inventory::{AdjustStock, InventoryCommand, InventoryItem, InventoryItemId};

use crate::command_dispatcher::{DispatchError, publish_committed, rehydrate, to_uncommitted};
use crate::event_store::{EventStore, StoredEvent, StreamAppend};

use super::{GIFT_AGGREGATE, INVENTORY_AGGREGATE, net_draws};

pub struct ReplyWorkflow<S, B> {
    store: S,
    bus: B,
}

impl<S, B> ReplyWorkflow<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }
}

impl<S, B> ReplyWorkflow<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Record a reply: mark the gift `Replied`, persist the reply lines, and
    /// decrement every referenced inventory row — atomically.
    ///
    /// Every aggregate decides before anything is appended, so insufficient
    /// stock (or a reply on an already-replied gift) rejects the operation
    /// with no partial state.
    #[tracing::instrument(skip(self, cmd), fields(gift_id = %cmd.gift_id))]
    pub fn record_reply(&self, cmd: RecordReply) -> Result<Vec<StoredEvent>, DispatchError> {
        let ledger_id = cmd.ledger_id;
        let gift_agg = cmd.gift_id.0;

        let (gift, gift_expected) = rehydrate::<ReceivedGift, _>(
            &self.store,
            ledger_id,
            gift_agg,
            |_, id| ReceivedGift::empty(GiftId::new(id)),
        )?;

        let items = cmd.items.clone();
        let occurred_at = cmd.occurred_at;
        let gift_events = gift
            .handle(&GiftCommand::RecordReply(cmd))
            .map_err(DispatchError::from)?;

        let mut batches = vec![StreamAppend {
            events: to_uncommitted(ledger_id, gift_agg, GIFT_AGGREGATE, &gift_events)?,
            expected_version: gift_expected,
        }];

        batches.extend(self.stock_adjustments(
            ledger_id,
            &items,
            -1,
            occurred_at,
        )?);

        let committed = self.store.append_streams(batches)?;
        publish_committed(&self.bus, &committed)?;

        tracing::info!(events = committed.len(), "reply recorded");
        Ok(committed)
    }

    /// Cancel a reply: restore every referenced inventory row by the
    /// recorded quantity, drop the reply, mark the gift `Pending` —
    /// atomically. Exact inverse of [`Self::record_reply`].
    #[tracing::instrument(skip(self, cmd), fields(gift_id = %cmd.gift_id))]
    pub fn cancel_reply(&self, cmd: CancelReply) -> Result<Vec<StoredEvent>, DispatchError> {
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
            .handle(&GiftCommand::CancelReply(cmd))
            .map_err(DispatchError::from)?;

        // Restoration uses the quantities the cancellation event carries —
        // what the reply recorded, not a recomputation.
        let restored: Vec<ReplyLine> = gift_events
            .iter()
            .find_map(|e| match e {
                GiftEvent::ReplyCancelled(e) => Some(e.restored_items.clone()),
                _ => None,
            })
            .unwrap_or_default();

        let mut batches = vec![StreamAppend {
            events: to_uncommitted(ledger_id, gift_agg, GIFT_AGGREGATE, &gift_events)?,
            expected_version: gift_expected,
        }];

        batches.extend(self.stock_adjustments(ledger_id, &restored, 1, occurred_at)?);

        let committed = self.store.append_streams(batches)?;
        publish_committed(&self.bus, &committed)?;

        tracing::info!(events = committed.len(), "reply cancelled");
        Ok(committed)
    }

    /// One decided `StockAdjusted` batch per referenced inventory item,
    /// with `sign` −1 for draws and +1 for restoration.
    fn stock_adjustments(
        &self,
        ledger_id: LedgerId,
        items: &[ReplyLine],
        sign: i64,
        occurred_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<StreamAppend>, DispatchError> {
        let mut batches = Vec::new();

        for (item_id, quantity) in net_draws(items.iter().map(|l| (l.inventory_ref, l.quantity))) {
            let item_agg = item_id.0;
            let (item, expected) = rehydrate::<InventoryItem, _>(
                &self.store,
                ledger_id,
                item_agg,
                |_, id| InventoryItem::empty(InventoryItemId::new(id)),
            )?;

            let events = item
                .handle(&InventoryCommand::AdjustStock(AdjustStock {
                    ledger_id,
                    item_id,
                    delta: sign * quantity,
                    occurred_at,
                }))
                .map_err(DispatchError::from)?;

            batches.push(StreamAppend {
                events: to_uncommitted(ledger_id, item_agg, INVENTORY_AGGREGATE, &events)?,
                expected_version: expected,
            });
        }

        Ok(batches)
    }
}
