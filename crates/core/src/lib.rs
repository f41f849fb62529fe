//! `renqing-core` — domain foundation for the gift ledger.
//!
//! Pure domain primitives only: identifiers, the domain error model, and the
//! aggregate execution contract. No IO, no framework types.

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, LedgerId};
