//! Cross-aggregate operations that must commit as one unit.
//!
//! A reply touches the gift stream and one inventory stream per referenced
//! item; recording an outgoing gift and deleting either kind of record have
//! the same shape. Each workflow rehydrates every involved aggregate, lets
//! each decide its own events (so every invariant is checked before any
//! write), then commits all streams through one atomic
//! [`append_streams`](crate::event_store::EventStore::append_streams) call.
//! A version conflict on any stream aborts the whole operation and surfaces
//! as a retryable [`DispatchError::Concurrency`](crate::command_dispatcher::DispatchError).

mod deletion;
mod outgoing;
mod reply;

pub use deletion::GiftRemovalWorkflow;
pub use outgoing::OutgoingWorkflow;
pub use reply::ReplyWorkflow;

use renqing_inventory::InventoryItemId;

/// Aggregate type tags used in stream metadata.
pub const GIFT_AGGREGATE: &str = "gift";
pub const INVENTORY_AGGREGATE: &str = "inventory.item";
pub const CONTACT_AGGREGATE: &str = "contact";
pub const OUTGOING_AGGREGATE: &str = "outgoing_gift";
pub const REMINDER_AGGREGATE: &str = "reminder";

/// Net stock draw per referenced inventory item, in first-seen order.
///
/// Several lines may draw on the same item; the store rejects duplicate
/// streams in one append, so the deltas are combined up front.
fn net_draws<I>(lines: I) -> Vec<(InventoryItemId, i64)>
where
    I: IntoIterator<Item = (Option<InventoryItemId>, i64)>,
{
    let mut order: Vec<InventoryItemId> = Vec::new();
    let mut totals: std::collections::HashMap<InventoryItemId, i64> = std::collections::HashMap::new();

    for (item_ref, quantity) in lines {
        let Some(item_id) = item_ref else { continue };
        if !totals.contains_key(&item_id) {
            order.push(item_id);
        }
        *totals.entry(item_id).or_insert(0) += quantity;
    }

    order
        .into_iter()
        .map(|id| {
            let total = totals[&id];
            (id, total)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use renqing_core::AggregateId;

    #[test]
    fn net_draws_combines_repeated_refs_and_skips_unlinked_lines() {
        let a = InventoryItemId::new(AggregateId::new());
        let b = InventoryItemId::new(AggregateId::new());

        let draws = net_draws(vec![
            (Some(a), 2),
            (None, 5),
            (Some(b), 1),
            (Some(a), 3),
        ]);

        assert_eq!(draws, vec![(a, 5), (b, 1)]);
    }
}
