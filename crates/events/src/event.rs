use chrono::{DateTime, Utc};

/// A domain event: an immutable, versioned fact.
///
/// Events are append-only; schema changes bump `version()` rather than
/// mutating history.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name (e.g. "gift.reply_recorded").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// Business time at which the event occurred.
    fn occurred_at(&self) -> DateTime<Utc>;
}
