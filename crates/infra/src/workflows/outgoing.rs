//! Outgoing gifts: the record/delete pair mirrors reply/cancel.

use serde_json::Value as JsonValue;

use renqing_core::{Aggregate, LedgerId};
use renqing_events::{EventBus, EventEnvelope};
use renqing_inventory::{AdjustStock, InventoryCommand, InventoryItem, InventoryItemId};
use renqing_outgoing::{
    DeleteOutgoingGift, OutgoingGift, OutgoingGiftCommand, OutgoingGiftEvent, OutgoingGiftId,
    OutgoingLine, RecordOutgoingGift,
};

use crate::command_dispatcher::{DispatchError, publish_committed, rehydrate, to_uncommitted};
use crate::event_store::{EventStore, StoredEvent, StreamAppend};

use super::{INVENTORY_AGGREGATE, OUTGOING_AGGREGATE, net_draws};

pub struct OutgoingWorkflow<S, B> {
    store: S,
    bus: B,
}

impl<S, B> OutgoingWorkflow<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }
}

impl<S, B> OutgoingWorkflow<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Record an outgoing gift and decrement every stock-drawn line,
    /// atomically. Insufficient stock rejects the whole record.
    #[tracing::instrument(skip(self, cmd), fields(outgoing_id = %cmd.outgoing_id))]
    pub fn record(&self, cmd: RecordOutgoingGift) -> Result<Vec<StoredEvent>, DispatchError> {
        let ledger_id = cmd.ledger_id;
        let outgoing_agg = cmd.outgoing_id.0;

        let (outgoing, expected) = rehydrate::<OutgoingGift, _>(
            &self.store,
            ledger_id,
            outgoing_agg,
            |_, id| OutgoingGift::empty(OutgoingGiftId::new(id)),
        )?;

        let lines = cmd.lines.clone();
        let occurred_at = cmd.occurred_at;
        let events = outgoing
            .handle(&OutgoingGiftCommand::RecordOutgoingGift(cmd))
            .map_err(DispatchError::from)?;

        let mut batches = vec![StreamAppend {
            events: to_uncommitted(ledger_id, outgoing_agg, OUTGOING_AGGREGATE, &events)?,
            expected_version: expected,
        }];

        batches.extend(self.stock_adjustments(ledger_id, &lines, -1, occurred_at)?);

        let committed = self.store.append_streams(batches)?;
        publish_committed(&self.bus, &committed)?;

        tracing::info!(events = committed.len(), "outgoing gift recorded");
        Ok(committed)
    }

    /// Delete an outgoing gift and restore every stock-drawn line by the
    /// recorded quantity, atomically.
    #[tracing::instrument(skip(self, cmd), fields(outgoing_id = %cmd.outgoing_id))]
    pub fn delete(&self, cmd: DeleteOutgoingGift) -> Result<Vec<StoredEvent>, DispatchError> {
        let ledger_id = cmd.ledger_id;
        let outgoing_agg = cmd.outgoing_id.0;

        let (outgoing, expected) = rehydrate::<OutgoingGift, _>(
            &self.store,
            ledger_id,
            outgoing_agg,
            |_, id| OutgoingGift::empty(OutgoingGiftId::new(id)),
        )?;

        let occurred_at = cmd.occurred_at;
        let events = outgoing
            .handle(&OutgoingGiftCommand::DeleteOutgoingGift(cmd))
            .map_err(DispatchError::from)?;

        let restored: Vec<OutgoingLine> = events
            .iter()
            .find_map(|e| match e {
                OutgoingGiftEvent::OutgoingGiftDeleted(e) => Some(e.restored_lines.clone()),
                _ => None,
            })
            .unwrap_or_default();

        let mut batches = vec![StreamAppend {
            events: to_uncommitted(ledger_id, outgoing_agg, OUTGOING_AGGREGATE, &events)?,
            expected_version: expected,
        }];

        batches.extend(self.stock_adjustments(ledger_id, &restored, 1, occurred_at)?);

        let committed = self.store.append_streams(batches)?;
        publish_committed(&self.bus, &committed)?;

        tracing::info!(events = committed.len(), "outgoing gift deleted");
        Ok(committed)
    }

    fn stock_adjustments(
        &self,
        ledger_id: LedgerId,
        lines: &[OutgoingLine],
        sign: i64,
        occurred_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<StreamAppend>, DispatchError> {
        let mut batches = Vec::new();

        for (item_id, quantity) in net_draws(lines.iter().map(|l| (l.inventory_ref, l.quantity))) {
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
