use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use renqing_core::{Aggregate, AggregateId, AggregateRoot, DomainError, LedgerId};
use renqing_events::Event;
use renqing_inventory::InventoryItemId;

/// Received-gift identifier (ledger-scoped via `ledger_id` in events).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GiftId(pub AggregateId);

impl GiftId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for GiftId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Reply lifecycle of a received gift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GiftStatus {
    Pending,
    Replied,
}

/// One line of what was received: name, category, quantity, unit price (fen).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftLine {
    pub item_name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: u64,
}

impl GiftLine {
    pub fn subtotal(&self) -> u64 {
        (self.quantity.max(0) as u64) * self.unit_price
    }
}

/// One line of what was given back. A line drawn from stock carries the
/// inventory reference used for the decrement and later restoration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyLine {
    pub item_name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: u64,
    pub inventory_ref: Option<InventoryItemId>,
}

impl ReplyLine {
    pub fn subtotal(&self) -> u64 {
        (self.quantity.max(0) as u64) * self.unit_price
    }
}

/// Recorded reply: date, lines, and the derived total cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub date: NaiveDate,
    pub items: Vec<ReplyLine>,
    pub cost: u64,
}

/// Aggregate root: ReceivedGift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedGift {
    id: GiftId,
    ledger_id: Option<LedgerId>,
    from_person: String,
    from_company: Option<String>,
    received_date: NaiveDate,
    notes: Option<String>,
    photos: Vec<String>,
    lines: Vec<GiftLine>,
    status: GiftStatus,
    reply: Option<Reply>,
    deleted: bool,
    version: u64,
    created: bool,
}

impl ReceivedGift {
    /// Empty, not-yet-created instance for stream rehydration.
    pub fn empty(id: GiftId) -> Self {
        Self {
            id,
            ledger_id: None,
            from_person: String::new(),
            from_company: None,
            received_date: NaiveDate::MIN,
            notes: None,
            photos: Vec::new(),
            lines: Vec::new(),
            status: GiftStatus::Pending,
            reply: None,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> GiftId {
        self.id
    }

    pub fn ledger_id(&self) -> Option<LedgerId> {
        self.ledger_id
    }

    pub fn from_person(&self) -> &str {
        &self.from_person
    }

    pub fn from_company(&self) -> Option<&str> {
        self.from_company.as_deref()
    }

    pub fn received_date(&self) -> NaiveDate {
        self.received_date
    }

    pub fn lines(&self) -> &[GiftLine] {
        &self.lines
    }

    pub fn status(&self) -> GiftStatus {
        self.status
    }

    pub fn reply(&self) -> Option<&Reply> {
        self.reply.as_ref()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Total value of the received lines, in fen.
    pub fn estimated_value(&self) -> u64 {
        self.lines.iter().map(GiftLine::subtotal).sum()
    }
}

impl AggregateRoot for ReceivedGift {
    type Id = GiftId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordGift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordGift {
    pub ledger_id: LedgerId,
    pub gift_id: GiftId,
    pub from_person: String,
    pub from_company: Option<String>,
    pub received_date: NaiveDate,
    pub notes: Option<String>,
    pub photos: Vec<String>,
    pub lines: Vec<GiftLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateGiftDetails. `None` fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateGiftDetails {
    pub ledger_id: LedgerId,
    pub gift_id: GiftId,
    pub from_person: Option<String>,
    pub from_company: Option<String>,
    pub received_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub photos: Option<Vec<String>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordReply (`Pending → Replied`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReply {
    pub ledger_id: LedgerId,
    pub gift_id: GiftId,
    pub reply_date: NaiveDate,
    pub items: Vec<ReplyLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelReply (`Replied → Pending`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReply {
    pub ledger_id: LedgerId,
    pub gift_id: GiftId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteGift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteGift {
    pub ledger_id: LedgerId,
    pub gift_id: GiftId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GiftCommand {
    RecordGift(RecordGift),
    UpdateGiftDetails(UpdateGiftDetails),
    RecordReply(RecordReply),
    CancelReply(CancelReply),
    DeleteGift(DeleteGift),
}

/// Event: GiftRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftRecorded {
    pub ledger_id: LedgerId,
    pub gift_id: GiftId,
    pub from_person: String,
    pub from_company: Option<String>,
    pub received_date: NaiveDate,
    pub notes: Option<String>,
    pub photos: Vec<String>,
    pub lines: Vec<GiftLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GiftDetailsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftDetailsUpdated {
    pub ledger_id: LedgerId,
    pub gift_id: GiftId,
    pub from_person: Option<String>,
    pub from_company: Option<String>,
    pub received_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub photos: Option<Vec<String>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReplyRecorded. `reply_cost` is derived at decision time so every
/// consumer sees the same figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRecorded {
    pub ledger_id: LedgerId,
    pub gift_id: GiftId,
    pub reply_date: NaiveDate,
    pub items: Vec<ReplyLine>,
    pub reply_cost: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReplyCancelled. Carries the lines that were recorded by the reply
/// being undone, so restoration is item-for-item exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyCancelled {
    pub ledger_id: LedgerId,
    pub gift_id: GiftId,
    pub restored_items: Vec<ReplyLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GiftDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftDeleted {
    pub ledger_id: LedgerId,
    pub gift_id: GiftId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GiftEvent {
    GiftRecorded(GiftRecorded),
    GiftDetailsUpdated(GiftDetailsUpdated),
    ReplyRecorded(ReplyRecorded),
    ReplyCancelled(ReplyCancelled),
    GiftDeleted(GiftDeleted),
}

impl Event for GiftEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GiftEvent::GiftRecorded(_) => "gift.recorded",
            GiftEvent::GiftDetailsUpdated(_) => "gift.details_updated",
            GiftEvent::ReplyRecorded(_) => "gift.reply_recorded",
            GiftEvent::ReplyCancelled(_) => "gift.reply_cancelled",
            GiftEvent::GiftDeleted(_) => "gift.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GiftEvent::GiftRecorded(e) => e.occurred_at,
            GiftEvent::GiftDetailsUpdated(e) => e.occurred_at,
            GiftEvent::ReplyRecorded(e) => e.occurred_at,
            GiftEvent::ReplyCancelled(e) => e.occurred_at,
            GiftEvent::GiftDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ReceivedGift {
    type Command = GiftCommand;
    type Event = GiftEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            GiftEvent::GiftRecorded(e) => {
                self.id = e.gift_id;
                self.ledger_id = Some(e.ledger_id);
                self.from_person = e.from_person.clone();
                self.from_company = e.from_company.clone();
                self.received_date = e.received_date;
                self.notes = e.notes.clone();
                self.photos = e.photos.clone();
                self.lines = e.lines.clone();
                self.status = GiftStatus::Pending;
                self.reply = None;
                self.deleted = false;
                self.created = true;
            }
            GiftEvent::GiftDetailsUpdated(e) => {
                if let Some(from_person) = &e.from_person {
                    self.from_person = from_person.clone();
                }
                if let Some(from_company) = &e.from_company {
                    self.from_company = Some(from_company.clone());
                }
                if let Some(received_date) = e.received_date {
                    self.received_date = received_date;
                }
                if let Some(notes) = &e.notes {
                    self.notes = Some(notes.clone());
                }
                if let Some(photos) = &e.photos {
                    self.photos = photos.clone();
                }
            }
            GiftEvent::ReplyRecorded(e) => {
                // Status, reply date, items, and cost change as one unit.
                self.status = GiftStatus::Replied;
                self.reply = Some(Reply {
                    date: e.reply_date,
                    items: e.items.clone(),
                    cost: e.reply_cost,
                });
            }
            GiftEvent::ReplyCancelled(_) => {
                self.status = GiftStatus::Pending;
                self.reply = None;
            }
            GiftEvent::GiftDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            GiftCommand::RecordGift(cmd) => self.handle_record(cmd),
            GiftCommand::UpdateGiftDetails(cmd) => self.handle_update(cmd),
            GiftCommand::RecordReply(cmd) => self.handle_reply(cmd),
            GiftCommand::CancelReply(cmd) => self.handle_cancel_reply(cmd),
            GiftCommand::DeleteGift(cmd) => self.handle_delete(cmd),
        }
    }
}

impl ReceivedGift {
    fn ensure_ledger(&self, ledger_id: LedgerId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.ledger_id != Some(ledger_id) {
            return Err(DomainError::invariant("ledger mismatch"));
        }
        Ok(())
    }

    fn ensure_gift_id(&self, gift_id: GiftId) -> Result<(), DomainError> {
        if self.id != gift_id {
            return Err(DomainError::invariant("gift_id mismatch"));
        }
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_record(&self, cmd: &RecordGift) -> Result<Vec<GiftEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("gift already recorded"));
        }
        if cmd.from_person.trim().is_empty() {
            return Err(DomainError::validation("sender name cannot be empty"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("gift must have at least one line"));
        }
        for line in &cmd.lines {
            if line.item_name.trim().is_empty() {
                return Err(DomainError::validation("line item name cannot be empty"));
            }
            if line.quantity <= 0 {
                return Err(DomainError::validation("line quantity must be positive"));
            }
        }

        Ok(vec![GiftEvent::GiftRecorded(GiftRecorded {
            ledger_id: cmd.ledger_id,
            gift_id: cmd.gift_id,
            from_person: cmd.from_person.trim().to_string(),
            from_company: cmd.from_company.clone(),
            received_date: cmd.received_date,
            notes: cmd.notes.clone(),
            photos: cmd.photos.clone(),
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateGiftDetails) -> Result<Vec<GiftEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_ledger(cmd.ledger_id)?;
        self.ensure_gift_id(cmd.gift_id)?;

        if let Some(from_person) = &cmd.from_person {
            if from_person.trim().is_empty() {
                return Err(DomainError::validation("sender name cannot be empty"));
            }
        }

        Ok(vec![GiftEvent::GiftDetailsUpdated(GiftDetailsUpdated {
            ledger_id: cmd.ledger_id,
            gift_id: cmd.gift_id,
            from_person: cmd.from_person.as_ref().map(|s| s.trim().to_string()),
            from_company: cmd.from_company.clone(),
            received_date: cmd.received_date,
            notes: cmd.notes.clone(),
            photos: cmd.photos.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reply(&self, cmd: &RecordReply) -> Result<Vec<GiftEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_ledger(cmd.ledger_id)?;
        self.ensure_gift_id(cmd.gift_id)?;

        if self.status != GiftStatus::Pending {
            return Err(DomainError::conflict("gift has already been replied to"));
        }

        if cmd.items.is_empty() {
            return Err(DomainError::validation(
                "reply must contain at least one item",
            ));
        }
        for item in &cmd.items {
            if item.item_name.trim().is_empty() {
                return Err(DomainError::validation("reply item name cannot be empty"));
            }
            if item.quantity <= 0 {
                return Err(DomainError::validation(
                    "reply item quantity must be positive",
                ));
            }
        }

        let reply_cost = cmd.items.iter().map(ReplyLine::subtotal).sum();

        Ok(vec![GiftEvent::ReplyRecorded(ReplyRecorded {
            ledger_id: cmd.ledger_id,
            gift_id: cmd.gift_id,
            reply_date: cmd.reply_date,
            items: cmd.items.clone(),
            reply_cost,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel_reply(&self, cmd: &CancelReply) -> Result<Vec<GiftEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_ledger(cmd.ledger_id)?;
        self.ensure_gift_id(cmd.gift_id)?;

        if self.status != GiftStatus::Replied {
            return Err(DomainError::conflict("gift has no reply to cancel"));
        }

        let reply = self
            .reply
            .as_ref()
            .ok_or_else(|| DomainError::invariant("replied gift is missing its reply record"))?;

        Ok(vec![GiftEvent::ReplyCancelled(ReplyCancelled {
            ledger_id: cmd.ledger_id,
            gift_id: cmd.gift_id,
            restored_items: reply.items.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteGift) -> Result<Vec<GiftEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_ledger(cmd.ledger_id)?;
        self.ensure_gift_id(cmd.gift_id)?;

        Ok(vec![GiftEvent::GiftDeleted(GiftDeleted {
            ledger_id: cmd.ledger_id,
            gift_id: cmd.gift_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ledger_id() -> LedgerId {
        LedgerId::new()
    }

    fn test_gift_id() -> GiftId {
        GiftId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn tea_line() -> GiftLine {
        GiftLine {
            item_name: "龙井茶".to_string(),
            category: "茶叶".to_string(),
            quantity: 2,
            unit_price: 30_000,
        }
    }

    fn reply_line(inventory_ref: Option<InventoryItemId>) -> ReplyLine {
        ReplyLine {
            item_name: "五粮液".to_string(),
            category: "酒类".to_string(),
            quantity: 1,
            unit_price: 80_000,
            inventory_ref,
        }
    }

    fn recorded_gift(ledger_id: LedgerId, gift_id: GiftId) -> ReceivedGift {
        let mut gift = ReceivedGift::empty(gift_id);
        let cmd = RecordGift {
            ledger_id,
            gift_id,
            from_person: "李明".to_string(),
            from_company: Some("华信贸易".to_string()),
            received_date: day("2025-09-18"),
            notes: None,
            photos: vec![],
            lines: vec![tea_line()],
            occurred_at: test_time(),
        };
        let events = gift.handle(&GiftCommand::RecordGift(cmd)).unwrap();
        gift.apply(&events[0]);
        gift
    }

    fn replied_gift(ledger_id: LedgerId, gift_id: GiftId) -> ReceivedGift {
        let mut gift = recorded_gift(ledger_id, gift_id);
        let cmd = RecordReply {
            ledger_id,
            gift_id,
            reply_date: day("2025-09-20"),
            items: vec![reply_line(Some(InventoryItemId::new(AggregateId::new())))],
            occurred_at: test_time(),
        };
        let events = gift.handle(&GiftCommand::RecordReply(cmd)).unwrap();
        gift.apply(&events[0]);
        gift
    }

    #[test]
    fn record_gift_starts_pending() {
        let gift = recorded_gift(test_ledger_id(), test_gift_id());
        assert_eq!(gift.status(), GiftStatus::Pending);
        assert!(gift.reply().is_none());
        assert_eq!(gift.estimated_value(), 60_000);
    }

    #[test]
    fn record_gift_trims_sender_name() {
        let ledger_id = test_ledger_id();
        let gift_id = test_gift_id();
        let gift = ReceivedGift::empty(gift_id);
        let cmd = RecordGift {
            ledger_id,
            gift_id,
            from_person: "  王芳  ".to_string(),
            from_company: None,
            received_date: day("2025-01-02"),
            notes: None,
            photos: vec![],
            lines: vec![tea_line()],
            occurred_at: test_time(),
        };
        let events = gift.handle(&GiftCommand::RecordGift(cmd)).unwrap();
        match &events[0] {
            GiftEvent::GiftRecorded(e) => assert_eq!(e.from_person, "王芳"),
            other => panic!("expected GiftRecorded, got {other:?}"),
        }
    }

    #[test]
    fn record_gift_requires_lines() {
        let gift_id = test_gift_id();
        let gift = ReceivedGift::empty(gift_id);
        let cmd = RecordGift {
            ledger_id: test_ledger_id(),
            gift_id,
            from_person: "李明".to_string(),
            from_company: None,
            received_date: day("2025-01-02"),
            notes: None,
            photos: vec![],
            lines: vec![],
            occurred_at: test_time(),
        };
        assert!(matches!(
            gift.handle(&GiftCommand::RecordGift(cmd)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn reply_moves_pending_to_replied_and_derives_cost() {
        let ledger_id = test_ledger_id();
        let gift_id = test_gift_id();
        let mut gift = recorded_gift(ledger_id, gift_id);

        let items = vec![
            ReplyLine {
                item_name: "大红袍".to_string(),
                category: "茶叶".to_string(),
                quantity: 2,
                unit_price: 25_000,
                inventory_ref: None,
            },
            reply_line(None),
        ];
        let cmd = RecordReply {
            ledger_id,
            gift_id,
            reply_date: day("2025-09-21"),
            items,
            occurred_at: test_time(),
        };
        let events = gift.handle(&GiftCommand::RecordReply(cmd)).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            GiftEvent::ReplyRecorded(e) => {
                assert_eq!(e.reply_cost, 2 * 25_000 + 80_000);
            }
            other => panic!("expected ReplyRecorded, got {other:?}"),
        }

        gift.apply(&events[0]);
        assert_eq!(gift.status(), GiftStatus::Replied);
        let reply = gift.reply().unwrap();
        assert_eq!(reply.date, day("2025-09-21"));
        assert_eq!(reply.items.len(), 2);
        assert_eq!(reply.cost, 130_000);
    }

    #[test]
    fn reply_on_replied_gift_is_a_conflict() {
        let ledger_id = test_ledger_id();
        let gift_id = test_gift_id();
        let gift = replied_gift(ledger_id, gift_id);

        let cmd = RecordReply {
            ledger_id,
            gift_id,
            reply_date: day("2025-09-22"),
            items: vec![reply_line(None)],
            occurred_at: test_time(),
        };
        let err = gift.handle(&GiftCommand::RecordReply(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn cancel_on_pending_gift_is_a_conflict() {
        let ledger_id = test_ledger_id();
        let gift_id = test_gift_id();
        let gift = recorded_gift(ledger_id, gift_id);

        let cmd = CancelReply {
            ledger_id,
            gift_id,
            occurred_at: test_time(),
        };
        let err = gift.handle(&GiftCommand::CancelReply(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn reply_requires_positive_quantities() {
        let ledger_id = test_ledger_id();
        let gift_id = test_gift_id();
        let gift = recorded_gift(ledger_id, gift_id);

        let mut bad = reply_line(None);
        bad.quantity = 0;
        let cmd = RecordReply {
            ledger_id,
            gift_id,
            reply_date: day("2025-09-21"),
            items: vec![bad],
            occurred_at: test_time(),
        };
        assert!(matches!(
            gift.handle(&GiftCommand::RecordReply(cmd)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn reply_requires_nonempty_items() {
        let ledger_id = test_ledger_id();
        let gift_id = test_gift_id();
        let gift = recorded_gift(ledger_id, gift_id);

        let cmd = RecordReply {
            ledger_id,
            gift_id,
            reply_date: day("2025-09-21"),
            items: vec![],
            occurred_at: test_time(),
        };
        assert!(matches!(
            gift.handle(&GiftCommand::RecordReply(cmd)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn cancel_carries_the_recorded_items() {
        let ledger_id = test_ledger_id();
        let gift_id = test_gift_id();
        let gift = replied_gift(ledger_id, gift_id);
        let recorded_items = gift.reply().unwrap().items.clone();

        let cmd = CancelReply {
            ledger_id,
            gift_id,
            occurred_at: test_time(),
        };
        let events = gift.handle(&GiftCommand::CancelReply(cmd)).unwrap();
        match &events[0] {
            GiftEvent::ReplyCancelled(e) => {
                assert_eq!(e.restored_items, recorded_items);
            }
            other => panic!("expected ReplyCancelled, got {other:?}"),
        }
    }

    #[test]
    fn cancel_restores_pre_reply_state() {
        let ledger_id = test_ledger_id();
        let gift_id = test_gift_id();
        let before = recorded_gift(ledger_id, gift_id);

        let mut gift = before.clone();
        let reply_cmd = RecordReply {
            ledger_id,
            gift_id,
            reply_date: day("2025-09-21"),
            items: vec![reply_line(None)],
            occurred_at: test_time(),
        };
        let events = gift.handle(&GiftCommand::RecordReply(reply_cmd)).unwrap();
        gift.apply(&events[0]);

        let cancel_cmd = CancelReply {
            ledger_id,
            gift_id,
            occurred_at: test_time(),
        };
        let events = gift.handle(&GiftCommand::CancelReply(cancel_cmd)).unwrap();
        gift.apply(&events[0]);

        assert_eq!(gift.status(), before.status());
        assert_eq!(gift.reply(), before.reply());
        assert_eq!(gift.lines(), before.lines());
        assert_eq!(gift.version(), before.version() + 2);
    }

    #[test]
    fn deleted_gift_rejects_reply() {
        let ledger_id = test_ledger_id();
        let gift_id = test_gift_id();
        let mut gift = recorded_gift(ledger_id, gift_id);

        let delete = DeleteGift {
            ledger_id,
            gift_id,
            occurred_at: test_time(),
        };
        let events = gift.handle(&GiftCommand::DeleteGift(delete)).unwrap();
        gift.apply(&events[0]);

        let cmd = RecordReply {
            ledger_id,
            gift_id,
            reply_date: day("2025-09-21"),
            items: vec![reply_line(None)],
            occurred_at: test_time(),
        };
        assert!(matches!(
            gift.handle(&GiftCommand::RecordReply(cmd)),
            Err(DomainError::NotFound)
        ));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let ledger_id = test_ledger_id();
        let gift_id = test_gift_id();
        let gift = recorded_gift(ledger_id, gift_id);
        let snapshot = gift.clone();

        let cmd = RecordReply {
            ledger_id,
            gift_id,
            reply_date: day("2025-09-21"),
            items: vec![reply_line(None)],
            occurred_at: test_time(),
        };
        let first = gift.handle(&GiftCommand::RecordReply(cmd.clone())).unwrap();
        let second = gift.handle(&GiftCommand::RecordReply(cmd)).unwrap();

        assert_eq!(gift, snapshot);
        assert_eq!(first, second);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_reply_line() -> impl Strategy<Value = ReplyLine> {
            (
                "[a-zA-Z0-9]{1,12}",
                prop_oneof![
                    Just("茶叶".to_string()),
                    Just("酒类".to_string()),
                    Just("礼品".to_string()),
                    Just("保健品".to_string()),
                ],
                1i64..20,
                0u64..1_000_000,
                proptest::option::of(any::<u128>()),
            )
                .prop_map(|(name, category, quantity, unit_price, inv)| ReplyLine {
                    item_name: name,
                    category,
                    quantity,
                    unit_price,
                    inventory_ref: inv.map(|raw| {
                        InventoryItemId::new(AggregateId::from_uuid(uuid::Uuid::from_u128(raw)))
                    }),
                })
        }

        proptest! {
            /// Cancel is the exact inverse of reply: for any non-empty valid
            /// reply, `cancel ∘ reply` restores the gift's observable state.
            #[test]
            fn cancel_after_reply_is_identity(
                items in proptest::collection::vec(arb_reply_line(), 1..6)
            ) {
                let ledger_id = test_ledger_id();
                let gift_id = test_gift_id();
                let before = recorded_gift(ledger_id, gift_id);

                let mut gift = before.clone();
                let reply_cmd = RecordReply {
                    ledger_id,
                    gift_id,
                    reply_date: day("2025-09-21"),
                    items: items.clone(),
                    occurred_at: test_time(),
                };
                let events = gift.handle(&GiftCommand::RecordReply(reply_cmd)).unwrap();
                gift.apply(&events[0]);

                let cancel_cmd = CancelReply {
                    ledger_id,
                    gift_id,
                    occurred_at: test_time(),
                };
                let events = gift.handle(&GiftCommand::CancelReply(cancel_cmd)).unwrap();

                // The cancellation must restore exactly what the reply recorded.
                match &events[0] {
                    GiftEvent::ReplyCancelled(e) => prop_assert_eq!(&e.restored_items, &items),
                    other => prop_assert!(false, "expected ReplyCancelled, got {:?}", other),
                }

                gift.apply(&events[0]);
                prop_assert_eq!(gift.status(), before.status());
                prop_assert_eq!(gift.reply(), before.reply());
            }

            /// reply_cost is always the sum of quantity × unit_price.
            #[test]
            fn reply_cost_is_sum_of_lines(
                items in proptest::collection::vec(arb_reply_line(), 1..6)
            ) {
                let ledger_id = test_ledger_id();
                let gift_id = test_gift_id();
                let gift = recorded_gift(ledger_id, gift_id);

                let expected: u64 = items
                    .iter()
                    .map(|i| i.quantity as u64 * i.unit_price)
                    .sum();

                let cmd = RecordReply {
                    ledger_id,
                    gift_id,
                    reply_date: day("2025-09-21"),
                    items,
                    occurred_at: test_time(),
                };
                let events = gift.handle(&GiftCommand::RecordReply(cmd)).unwrap();
                match &events[0] {
                    GiftEvent::ReplyRecorded(e) => prop_assert_eq!(e.reply_cost, expected),
                    other => prop_assert!(false, "expected ReplyRecorded, got {:?}", other),
                }
            }
        }
    }
}
