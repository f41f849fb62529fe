//! `renqing-outgoing` — gifts sent on the ledger owner's own initiative.
//!
//! Unlike a reply, an outgoing gift is not tied to a received one; it only
//! records what was sent and, for lines drawn from stock, which inventory
//! rows to decrement. Deleting an outgoing record restores those rows, so
//! the record/delete pair mirrors the reply/cancel pair in the gifts crate.
//! The atomic coupling with inventory is done by the workflow layer.

mod gift;

pub use gift::{
    DeleteOutgoingGift, OutgoingGift, OutgoingGiftCommand, OutgoingGiftDeleted, OutgoingGiftEvent,
    OutgoingGiftId, OutgoingGiftRecorded, OutgoingLine, RecordOutgoingGift,
};
