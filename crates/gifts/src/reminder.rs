use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use renqing_core::{Aggregate, AggregateId, AggregateRoot, DomainError, LedgerId};
use renqing_events::Event;

use crate::GiftId;

/// Reminder identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderId(pub AggregateId);

impl ReminderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ReminderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    PendingReply,
    Birthday,
    Holiday,
    Custom,
}

/// Aggregate root: a dated nudge attached to a received gift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    id: ReminderId,
    ledger_id: Option<LedgerId>,
    gift_id: Option<GiftId>,
    kind: ReminderKind,
    remind_on: NaiveDate,
    message: Option<String>,
    completed: bool,
    deleted: bool,
    version: u64,
    created: bool,
}

impl Reminder {
    pub fn empty(id: ReminderId) -> Self {
        Self {
            id,
            ledger_id: None,
            gift_id: None,
            kind: ReminderKind::Custom,
            remind_on: NaiveDate::MIN,
            message: None,
            completed: false,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ReminderId {
        self.id
    }

    pub fn kind(&self) -> ReminderKind {
        self.kind
    }

    pub fn remind_on(&self) -> NaiveDate {
        self.remind_on
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

impl AggregateRoot for Reminder {
    type Id = ReminderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReminder {
    pub ledger_id: LedgerId,
    pub reminder_id: ReminderId,
    pub gift_id: GiftId,
    pub kind: ReminderKind,
    pub remind_on: NaiveDate,
    pub message: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteReminder {
    pub ledger_id: LedgerId,
    pub reminder_id: ReminderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReminder {
    pub ledger_id: LedgerId,
    pub reminder_id: ReminderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderCommand {
    CreateReminder(CreateReminder),
    CompleteReminder(CompleteReminder),
    DeleteReminder(DeleteReminder),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderCreated {
    pub ledger_id: LedgerId,
    pub reminder_id: ReminderId,
    pub gift_id: GiftId,
    pub kind: ReminderKind,
    pub remind_on: NaiveDate,
    pub message: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderCompleted {
    pub ledger_id: LedgerId,
    pub reminder_id: ReminderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderDeleted {
    pub ledger_id: LedgerId,
    pub reminder_id: ReminderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderEvent {
    ReminderCreated(ReminderCreated),
    ReminderCompleted(ReminderCompleted),
    ReminderDeleted(ReminderDeleted),
}

impl Event for ReminderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReminderEvent::ReminderCreated(_) => "reminder.created",
            ReminderEvent::ReminderCompleted(_) => "reminder.completed",
            ReminderEvent::ReminderDeleted(_) => "reminder.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReminderEvent::ReminderCreated(e) => e.occurred_at,
            ReminderEvent::ReminderCompleted(e) => e.occurred_at,
            ReminderEvent::ReminderDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Reminder {
    type Command = ReminderCommand;
    type Event = ReminderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReminderEvent::ReminderCreated(e) => {
                self.id = e.reminder_id;
                self.ledger_id = Some(e.ledger_id);
                self.gift_id = Some(e.gift_id);
                self.kind = e.kind;
                self.remind_on = e.remind_on;
                self.message = e.message.clone();
                self.completed = false;
                self.deleted = false;
                self.created = true;
            }
            ReminderEvent::ReminderCompleted(_) => {
                self.completed = true;
            }
            ReminderEvent::ReminderDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReminderCommand::CreateReminder(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("reminder already exists"));
                }
                Ok(vec![ReminderEvent::ReminderCreated(ReminderCreated {
                    ledger_id: cmd.ledger_id,
                    reminder_id: cmd.reminder_id,
                    gift_id: cmd.gift_id,
                    kind: cmd.kind,
                    remind_on: cmd.remind_on,
                    message: cmd.message.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            ReminderCommand::CompleteReminder(cmd) => {
                self.ensure_live()?;
                self.ensure_ledger(cmd.ledger_id)?;
                if self.completed {
                    return Err(DomainError::conflict("reminder already completed"));
                }
                Ok(vec![ReminderEvent::ReminderCompleted(ReminderCompleted {
                    ledger_id: cmd.ledger_id,
                    reminder_id: cmd.reminder_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            ReminderCommand::DeleteReminder(cmd) => {
                self.ensure_live()?;
                self.ensure_ledger(cmd.ledger_id)?;
                Ok(vec![ReminderEvent::ReminderDeleted(ReminderDeleted {
                    ledger_id: cmd.ledger_id,
                    reminder_id: cmd.reminder_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Reminder {
    fn ensure_ledger(&self, ledger_id: LedgerId) -> Result<(), DomainError> {
        if self.ledger_id != Some(ledger_id) {
            return Err(DomainError::invariant("ledger mismatch"));
        }
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created_reminder(ledger_id: LedgerId, reminder_id: ReminderId) -> Reminder {
        let mut reminder = Reminder::empty(reminder_id);
        let cmd = CreateReminder {
            ledger_id,
            reminder_id,
            gift_id: GiftId::new(AggregateId::new()),
            kind: ReminderKind::PendingReply,
            remind_on: "2025-10-01".parse().unwrap(),
            message: Some("中秋收礼待回".to_string()),
            occurred_at: Utc::now(),
        };
        let events = reminder
            .handle(&ReminderCommand::CreateReminder(cmd))
            .unwrap();
        reminder.apply(&events[0]);
        reminder
    }

    #[test]
    fn complete_marks_reminder_done_once() {
        let ledger_id = LedgerId::new();
        let reminder_id = ReminderId::new(AggregateId::new());
        let mut reminder = created_reminder(ledger_id, reminder_id);

        let cmd = CompleteReminder {
            ledger_id,
            reminder_id,
            occurred_at: Utc::now(),
        };
        let events = reminder
            .handle(&ReminderCommand::CompleteReminder(cmd.clone()))
            .unwrap();
        reminder.apply(&events[0]);
        assert!(reminder.is_completed());

        let err = reminder
            .handle(&ReminderCommand::CompleteReminder(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn deleted_reminder_is_gone() {
        let ledger_id = LedgerId::new();
        let reminder_id = ReminderId::new(AggregateId::new());
        let mut reminder = created_reminder(ledger_id, reminder_id);

        let cmd = DeleteReminder {
            ledger_id,
            reminder_id,
            occurred_at: Utc::now(),
        };
        let events = reminder
            .handle(&ReminderCommand::DeleteReminder(cmd))
            .unwrap();
        reminder.apply(&events[0]);

        let complete = CompleteReminder {
            ledger_id,
            reminder_id,
            occurred_at: Utc::now(),
        };
        assert!(matches!(
            reminder.handle(&ReminderCommand::CompleteReminder(complete)),
            Err(DomainError::NotFound)
        ));
    }
}
