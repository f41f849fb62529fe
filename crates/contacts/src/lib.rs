//! `renqing-contacts` — the people a ledger exchanges gifts with.
//!
//! Contacts are identified by their normalized name within a ledger: the
//! gift-recording workflows auto-create a contact for an unknown sender or
//! recipient, and the recommendation scorer reads age/gender from here.
//! Uniqueness of the normalized name is enforced by the workflow layer
//! against the contact directory read model; this crate supplies the
//! normalization rule and the aggregate itself.

mod contact;

pub use contact::{
    Contact, ContactCommand, ContactCreated, ContactDeleted, ContactEvent, ContactId,
    ContactProfile, ContactProfileUpdated, CreateContact, DeleteContact, Gender, UpdateContact,
    normalize_name,
};
