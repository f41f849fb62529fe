use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use renqing_core::{Aggregate, AggregateId, AggregateRoot, DomainError, LedgerId};
use renqing_events::Event;
use renqing_inventory::InventoryItemId;

/// Outgoing-gift identifier (ledger-scoped via `ledger_id` in events).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutgoingGiftId(pub AggregateId);

impl OutgoingGiftId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OutgoingGiftId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One sent line; stock-drawn lines keep the inventory reference for the
/// decrement and for restoration on delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingLine {
    pub item_name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: u64,
    pub inventory_ref: Option<InventoryItemId>,
}

impl OutgoingLine {
    pub fn subtotal(&self) -> u64 {
        (self.quantity.max(0) as u64) * self.unit_price
    }
}

/// Aggregate root: OutgoingGift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingGift {
    id: OutgoingGiftId,
    ledger_id: Option<LedgerId>,
    to_person: String,
    to_company: Option<String>,
    send_date: NaiveDate,
    notes: Option<String>,
    photos: Vec<String>,
    lines: Vec<OutgoingLine>,
    total_cost: u64,
    deleted: bool,
    version: u64,
    created: bool,
}

impl OutgoingGift {
    pub fn empty(id: OutgoingGiftId) -> Self {
        Self {
            id,
            ledger_id: None,
            to_person: String::new(),
            to_company: None,
            send_date: NaiveDate::MIN,
            notes: None,
            photos: Vec::new(),
            lines: Vec::new(),
            total_cost: 0,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OutgoingGiftId {
        self.id
    }

    pub fn ledger_id(&self) -> Option<LedgerId> {
        self.ledger_id
    }

    pub fn to_person(&self) -> &str {
        &self.to_person
    }

    pub fn send_date(&self) -> NaiveDate {
        self.send_date
    }

    pub fn lines(&self) -> &[OutgoingLine] {
        &self.lines
    }

    pub fn total_cost(&self) -> u64 {
        self.total_cost
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

impl AggregateRoot for OutgoingGift {
    type Id = OutgoingGiftId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordOutgoingGift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutgoingGift {
    pub ledger_id: LedgerId,
    pub outgoing_id: OutgoingGiftId,
    pub to_person: String,
    pub to_company: Option<String>,
    pub send_date: NaiveDate,
    pub notes: Option<String>,
    pub photos: Vec<String>,
    pub lines: Vec<OutgoingLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteOutgoingGift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutgoingGift {
    pub ledger_id: LedgerId,
    pub outgoing_id: OutgoingGiftId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutgoingGiftCommand {
    RecordOutgoingGift(RecordOutgoingGift),
    DeleteOutgoingGift(DeleteOutgoingGift),
}

/// Event: OutgoingGiftRecorded. `total_cost` is derived at decision time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingGiftRecorded {
    pub ledger_id: LedgerId,
    pub outgoing_id: OutgoingGiftId,
    pub to_person: String,
    pub to_company: Option<String>,
    pub send_date: NaiveDate,
    pub notes: Option<String>,
    pub photos: Vec<String>,
    pub lines: Vec<OutgoingLine>,
    pub total_cost: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OutgoingGiftDeleted. Carries the recorded lines so stock-drawn
/// quantities are restored exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingGiftDeleted {
    pub ledger_id: LedgerId,
    pub outgoing_id: OutgoingGiftId,
    pub restored_lines: Vec<OutgoingLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutgoingGiftEvent {
    OutgoingGiftRecorded(OutgoingGiftRecorded),
    OutgoingGiftDeleted(OutgoingGiftDeleted),
}

impl Event for OutgoingGiftEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OutgoingGiftEvent::OutgoingGiftRecorded(_) => "outgoing_gift.recorded",
            OutgoingGiftEvent::OutgoingGiftDeleted(_) => "outgoing_gift.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OutgoingGiftEvent::OutgoingGiftRecorded(e) => e.occurred_at,
            OutgoingGiftEvent::OutgoingGiftDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for OutgoingGift {
    type Command = OutgoingGiftCommand;
    type Event = OutgoingGiftEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OutgoingGiftEvent::OutgoingGiftRecorded(e) => {
                self.id = e.outgoing_id;
                self.ledger_id = Some(e.ledger_id);
                self.to_person = e.to_person.clone();
                self.to_company = e.to_company.clone();
                self.send_date = e.send_date;
                self.notes = e.notes.clone();
                self.photos = e.photos.clone();
                self.lines = e.lines.clone();
                self.total_cost = e.total_cost;
                self.deleted = false;
                self.created = true;
            }
            OutgoingGiftEvent::OutgoingGiftDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OutgoingGiftCommand::RecordOutgoingGift(cmd) => self.handle_record(cmd),
            OutgoingGiftCommand::DeleteOutgoingGift(cmd) => self.handle_delete(cmd),
        }
    }
}

impl OutgoingGift {
    fn ensure_ledger(&self, ledger_id: LedgerId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.ledger_id != Some(ledger_id) {
            return Err(DomainError::invariant("ledger mismatch"));
        }
        Ok(())
    }

    fn handle_record(&self, cmd: &RecordOutgoingGift) -> Result<Vec<OutgoingGiftEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("outgoing gift already recorded"));
        }
        if cmd.to_person.trim().is_empty() {
            return Err(DomainError::validation("recipient name cannot be empty"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "outgoing gift must have at least one line",
            ));
        }
        for line in &cmd.lines {
            if line.item_name.trim().is_empty() {
                return Err(DomainError::validation("line item name cannot be empty"));
            }
            if line.quantity <= 0 {
                return Err(DomainError::validation("line quantity must be positive"));
            }
        }

        let total_cost = cmd.lines.iter().map(OutgoingLine::subtotal).sum();

        Ok(vec![OutgoingGiftEvent::OutgoingGiftRecorded(
            OutgoingGiftRecorded {
                ledger_id: cmd.ledger_id,
                outgoing_id: cmd.outgoing_id,
                to_person: cmd.to_person.trim().to_string(),
                to_company: cmd.to_company.clone(),
                send_date: cmd.send_date,
                notes: cmd.notes.clone(),
                photos: cmd.photos.clone(),
                lines: cmd.lines.clone(),
                total_cost,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_delete(&self, cmd: &DeleteOutgoingGift) -> Result<Vec<OutgoingGiftEvent>, DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        self.ensure_ledger(cmd.ledger_id)?;

        Ok(vec![OutgoingGiftEvent::OutgoingGiftDeleted(
            OutgoingGiftDeleted {
                ledger_id: cmd.ledger_id,
                outgoing_id: cmd.outgoing_id,
                restored_lines: self.lines.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ledger_id() -> LedgerId {
        LedgerId::new()
    }

    fn test_outgoing_id() -> OutgoingGiftId {
        OutgoingGiftId::new(AggregateId::new())
    }

    fn stock_line() -> OutgoingLine {
        OutgoingLine {
            item_name: "大红袍".to_string(),
            category: "茶叶".to_string(),
            quantity: 2,
            unit_price: 25_000,
            inventory_ref: Some(InventoryItemId::new(AggregateId::new())),
        }
    }

    fn recorded(ledger_id: LedgerId, outgoing_id: OutgoingGiftId) -> OutgoingGift {
        let mut gift = OutgoingGift::empty(outgoing_id);
        let cmd = RecordOutgoingGift {
            ledger_id,
            outgoing_id,
            to_person: "王总".to_string(),
            to_company: Some("恒达地产".to_string()),
            send_date: "2025-10-01".parse().unwrap(),
            notes: None,
            photos: vec![],
            lines: vec![stock_line()],
            occurred_at: Utc::now(),
        };
        let events = gift
            .handle(&OutgoingGiftCommand::RecordOutgoingGift(cmd))
            .unwrap();
        gift.apply(&events[0]);
        gift
    }

    #[test]
    fn record_derives_total_cost() {
        let gift = recorded(test_ledger_id(), test_outgoing_id());
        assert_eq!(gift.total_cost(), 50_000);
        assert_eq!(gift.lines().len(), 1);
    }

    #[test]
    fn record_requires_lines() {
        let outgoing_id = test_outgoing_id();
        let gift = OutgoingGift::empty(outgoing_id);
        let cmd = RecordOutgoingGift {
            ledger_id: test_ledger_id(),
            outgoing_id,
            to_person: "王总".to_string(),
            to_company: None,
            send_date: "2025-10-01".parse().unwrap(),
            notes: None,
            photos: vec![],
            lines: vec![],
            occurred_at: Utc::now(),
        };
        assert!(matches!(
            gift.handle(&OutgoingGiftCommand::RecordOutgoingGift(cmd)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn delete_carries_recorded_lines_for_restoration() {
        let ledger_id = test_ledger_id();
        let outgoing_id = test_outgoing_id();
        let gift = recorded(ledger_id, outgoing_id);
        let lines = gift.lines().to_vec();

        let cmd = DeleteOutgoingGift {
            ledger_id,
            outgoing_id,
            occurred_at: Utc::now(),
        };
        let events = gift
            .handle(&OutgoingGiftCommand::DeleteOutgoingGift(cmd))
            .unwrap();
        match &events[0] {
            OutgoingGiftEvent::OutgoingGiftDeleted(e) => {
                assert_eq!(e.restored_lines, lines);
            }
            other => panic!("expected OutgoingGiftDeleted, got {other:?}"),
        }
    }

    #[test]
    fn delete_twice_is_not_found() {
        let ledger_id = test_ledger_id();
        let outgoing_id = test_outgoing_id();
        let mut gift = recorded(ledger_id, outgoing_id);

        let cmd = DeleteOutgoingGift {
            ledger_id,
            outgoing_id,
            occurred_at: Utc::now(),
        };
        let events = gift
            .handle(&OutgoingGiftCommand::DeleteOutgoingGift(cmd.clone()))
            .unwrap();
        gift.apply(&events[0]);

        assert!(matches!(
            gift.handle(&OutgoingGiftCommand::DeleteOutgoingGift(cmd)),
            Err(DomainError::NotFound)
        ));
    }
}
