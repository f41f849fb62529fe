//! `renqing-infra` — storage, orchestration, and external collaborators.
//!
//! - [`event_store`]: append-only, ledger-isolated event streams. The
//!   in-memory store is the default wiring and the test substrate; the
//!   Postgres store (behind the `postgres` feature) is the durable one. Both
//!   support the atomic multi-stream append the reply/cancel workflows rely
//!   on.
//! - [`command_dispatcher`]: the single-aggregate execution pipeline
//!   (load → rehydrate → decide → append → publish).
//! - [`workflows`]: cross-aggregate operations that must commit as one unit
//!   (reply/cancel, outgoing record/delete, gift deletion with its converted
//!   stock).
//! - [`projections`] and [`read_model`]: disposable, ledger-isolated read
//!   models fed from published envelopes.
//! - [`ai`]: the outbound text-generation client.

pub mod ai;
pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod workflows;
