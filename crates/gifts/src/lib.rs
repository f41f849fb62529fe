//! `renqing-gifts` — received gifts and their reply lifecycle.
//!
//! The central state machine of the system lives here: a received gift is
//! `Pending` until a reply is recorded (`Pending → Replied`) and a reply can
//! be cancelled (`Replied → Pending`). Those are the only legal transitions;
//! both directions fail with a conflict error when attempted from the wrong
//! state. The `ReplyCancelled` event carries the recorded reply lines so that
//! inventory restoration is an exact inverse, never a recomputation.
//!
//! Cross-aggregate effects (inventory decrement/restore) are coordinated by
//! the workflow layer in `renqing-infra`; this crate only decides gift-local
//! events.

mod gift;
mod reminder;

pub use gift::{
    CancelReply, DeleteGift, GiftCommand, GiftDeleted, GiftDetailsUpdated, GiftEvent, GiftId,
    GiftLine, GiftRecorded, GiftStatus, ReceivedGift, RecordGift, RecordReply, Reply,
    ReplyCancelled, ReplyLine, ReplyRecorded, UpdateGiftDetails,
};
pub use reminder::{
    CompleteReminder, CreateReminder, DeleteReminder, Reminder, ReminderCommand, ReminderCompleted,
    ReminderCreated, ReminderDeleted, ReminderEvent, ReminderId, ReminderKind,
};
