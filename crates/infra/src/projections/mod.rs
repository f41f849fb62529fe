//! Disposable, ledger-isolated read models fed from published envelopes.
//!
//! Every projection is idempotent for at-least-once delivery: a per-stream
//! cursor skips replays and rejects sequence gaps. Read models can always be
//! rebuilt by replaying the streams.

mod contact_directory;
mod cursor;
mod gift_ledger;
mod inventory_stock;
mod outgoing_ledger;
mod reminder_board;

pub use contact_directory::{ContactDirectoryProjection, ContactReadModel};
pub use gift_ledger::{GiftLedgerProjection, GiftReadModel};
pub use inventory_stock::{InventoryReadModel, InventoryStockProjection};
pub use outgoing_ledger::{OutgoingLedgerProjection, OutgoingReadModel};
pub use reminder_board::{ReminderBoardProjection, ReminderReadModel};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("ledger isolation violation: {0}")]
    LedgerIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}
