use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use renqing_core::{Aggregate, AggregateId, AggregateRoot, DomainError, LedgerId};
use renqing_events::Event;

/// Contact identifier (ledger-scoped via `ledger_id` in events).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(pub AggregateId);

impl ContactId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ContactId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

/// The identity key for a contact name: trimmed, case-folded.
///
/// "  Li Ming " and "li ming" address the same contact.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Mutable profile fields of a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContactProfile {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
}

/// Aggregate root: Contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    id: ContactId,
    ledger_id: Option<LedgerId>,
    name: String,
    profile: ContactProfile,
    deleted: bool,
    version: u64,
    created: bool,
}

impl Contact {
    pub fn empty(id: ContactId) -> Self {
        Self {
            id,
            ledger_id: None,
            name: String::new(),
            profile: ContactProfile::default(),
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ContactId {
        self.id
    }

    pub fn ledger_id(&self) -> Option<LedgerId> {
        self.ledger_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    pub fn profile(&self) -> &ContactProfile {
        &self.profile
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

impl AggregateRoot for Contact {
    type Id = ContactId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateContact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateContact {
    pub ledger_id: LedgerId,
    pub contact_id: ContactId,
    pub name: String,
    pub profile: ContactProfile,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateContact. `None` fields are left unchanged; name changes go
/// through the workflow layer so the directory uniqueness check runs first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateContact {
    pub ledger_id: LedgerId,
    pub contact_id: ContactId,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteContact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteContact {
    pub ledger_id: LedgerId,
    pub contact_id: ContactId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactCommand {
    CreateContact(CreateContact),
    UpdateContact(UpdateContact),
    DeleteContact(DeleteContact),
}

/// Event: ContactCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactCreated {
    pub ledger_id: LedgerId,
    pub contact_id: ContactId,
    pub name: String,
    pub profile: ContactProfile,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ContactProfileUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactProfileUpdated {
    pub ledger_id: LedgerId,
    pub contact_id: ContactId,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ContactDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDeleted {
    pub ledger_id: LedgerId,
    pub contact_id: ContactId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactEvent {
    ContactCreated(ContactCreated),
    ContactProfileUpdated(ContactProfileUpdated),
    ContactDeleted(ContactDeleted),
}

impl Event for ContactEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ContactEvent::ContactCreated(_) => "contact.created",
            ContactEvent::ContactProfileUpdated(_) => "contact.profile_updated",
            ContactEvent::ContactDeleted(_) => "contact.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ContactEvent::ContactCreated(e) => e.occurred_at,
            ContactEvent::ContactProfileUpdated(e) => e.occurred_at,
            ContactEvent::ContactDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Contact {
    type Command = ContactCommand;
    type Event = ContactEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ContactEvent::ContactCreated(e) => {
                self.id = e.contact_id;
                self.ledger_id = Some(e.ledger_id);
                self.name = e.name.clone();
                self.profile = e.profile.clone();
                self.deleted = false;
                self.created = true;
            }
            ContactEvent::ContactProfileUpdated(e) => {
                if let Some(name) = &e.name {
                    self.name = name.clone();
                }
                if let Some(phone) = &e.phone {
                    self.profile.phone = Some(phone.clone());
                }
                if let Some(email) = &e.email {
                    self.profile.email = Some(email.clone());
                }
                if let Some(address) = &e.address {
                    self.profile.address = Some(address.clone());
                }
                if let Some(company) = &e.company {
                    self.profile.company = Some(company.clone());
                }
                if let Some(notes) = &e.notes {
                    self.profile.notes = Some(notes.clone());
                }
                if let Some(age) = e.age {
                    self.profile.age = Some(age);
                }
                if let Some(gender) = e.gender {
                    self.profile.gender = Some(gender);
                }
            }
            ContactEvent::ContactDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ContactCommand::CreateContact(cmd) => self.handle_create(cmd),
            ContactCommand::UpdateContact(cmd) => self.handle_update(cmd),
            ContactCommand::DeleteContact(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Contact {
    fn ensure_ledger(&self, ledger_id: LedgerId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
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

    fn handle_create(&self, cmd: &CreateContact) -> Result<Vec<ContactEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("contact already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("contact name cannot be empty"));
        }

        Ok(vec![ContactEvent::ContactCreated(ContactCreated {
            ledger_id: cmd.ledger_id,
            contact_id: cmd.contact_id,
            name: cmd.name.trim().to_string(),
            profile: cmd.profile.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateContact) -> Result<Vec<ContactEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_ledger(cmd.ledger_id)?;

        if let Some(name) = &cmd.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("contact name cannot be empty"));
            }
        }

        Ok(vec![ContactEvent::ContactProfileUpdated(
            ContactProfileUpdated {
                ledger_id: cmd.ledger_id,
                contact_id: cmd.contact_id,
                name: cmd.name.as_ref().map(|s| s.trim().to_string()),
                phone: cmd.phone.clone(),
                email: cmd.email.clone(),
                address: cmd.address.clone(),
                company: cmd.company.clone(),
                notes: cmd.notes.clone(),
                age: cmd.age,
                gender: cmd.gender,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_delete(&self, cmd: &DeleteContact) -> Result<Vec<ContactEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_ledger(cmd.ledger_id)?;

        Ok(vec![ContactEvent::ContactDeleted(ContactDeleted {
            ledger_id: cmd.ledger_id,
            contact_id: cmd.contact_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created_contact(ledger_id: LedgerId, contact_id: ContactId, name: &str) -> Contact {
        let mut contact = Contact::empty(contact_id);
        let cmd = CreateContact {
            ledger_id,
            contact_id,
            name: name.to_string(),
            profile: ContactProfile {
                age: Some(42),
                gender: Some(Gender::Male),
                company: Some("华信贸易".to_string()),
                ..ContactProfile::default()
            },
            occurred_at: Utc::now(),
        };
        let events = contact.handle(&ContactCommand::CreateContact(cmd)).unwrap();
        contact.apply(&events[0]);
        contact
    }

    #[test]
    fn normalized_name_ignores_case_and_whitespace() {
        assert_eq!(normalize_name("  Li Ming "), normalize_name("li ming"));
        assert_eq!(normalize_name("李明"), "李明");
        assert_ne!(normalize_name("李明"), normalize_name("李敏"));
    }

    #[test]
    fn create_trims_the_stored_name() {
        let contact = created_contact(LedgerId::new(), ContactId::new(AggregateId::new()), " 李明 ");
        assert_eq!(contact.name(), "李明");
    }

    #[test]
    fn blank_name_is_rejected() {
        let contact_id = ContactId::new(AggregateId::new());
        let contact = Contact::empty(contact_id);
        let cmd = CreateContact {
            ledger_id: LedgerId::new(),
            contact_id,
            name: "   ".to_string(),
            profile: ContactProfile::default(),
            occurred_at: Utc::now(),
        };
        assert!(matches!(
            contact.handle(&ContactCommand::CreateContact(cmd)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn update_patches_profile_fields() {
        let ledger_id = LedgerId::new();
        let contact_id = ContactId::new(AggregateId::new());
        let mut contact = created_contact(ledger_id, contact_id, "李明");

        let cmd = UpdateContact {
            ledger_id,
            contact_id,
            name: None,
            phone: Some("13800001111".to_string()),
            email: None,
            address: None,
            company: None,
            notes: None,
            age: Some(43),
            gender: None,
            occurred_at: Utc::now(),
        };
        let events = contact.handle(&ContactCommand::UpdateContact(cmd)).unwrap();
        contact.apply(&events[0]);

        assert_eq!(contact.profile().phone.as_deref(), Some("13800001111"));
        assert_eq!(contact.profile().age, Some(43));
        assert_eq!(contact.profile().gender, Some(Gender::Male));
        assert_eq!(contact.name(), "李明");
    }

    #[test]
    fn deleted_contact_rejects_updates() {
        let ledger_id = LedgerId::new();
        let contact_id = ContactId::new(AggregateId::new());
        let mut contact = created_contact(ledger_id, contact_id, "李明");

        let delete = DeleteContact {
            ledger_id,
            contact_id,
            occurred_at: Utc::now(),
        };
        let events = contact
            .handle(&ContactCommand::DeleteContact(delete))
            .unwrap();
        contact.apply(&events[0]);

        let update = UpdateContact {
            ledger_id,
            contact_id,
            name: None,
            phone: None,
            email: None,
            address: None,
            company: None,
            notes: None,
            age: None,
            gender: None,
            occurred_at: Utc::now(),
        };
        assert!(matches!(
            contact.handle(&ContactCommand::UpdateContact(update)),
            Err(DomainError::NotFound)
        ));
    }
}
