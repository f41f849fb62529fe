//! `renqing-inventory` — the re-giftable stock of a ledger.
//!
//! Each inventory item is an aggregate whose stream records creation,
//! detail edits, stock adjustments, and deletion. The one hard invariant is
//! that stock never goes negative: any adjustment that would cross zero is
//! rejected at decision time, before anything is persisted.

mod item;

pub use item::{
    AdjustStock, CreateItem, DeleteItem, InventoryCommand, InventoryEvent, InventoryItem,
    InventoryItemId, ItemCreated, ItemDeleted, ItemDetailsUpdated, Provenance, StockAdjusted,
    UpdateItemDetails,
};
