//! Salon booking domain core.
//!
//! Zero internal dependencies so the storage, event and API layers can all
//! share the same statuses, permission table and projections.
//!
//! - [`permissions`] / [`state_machine`] -- who may move an appointment
//!   where.
//! - [`history`] -- the immutable status-change audit trail.
//! - [`appointment`] -- the record and the mutations applied after a
//!   transition is accepted.
//! - [`notify`] -- notification records and fan-out rules.
//! - [`views`] -- role-scoped read projections.

pub mod appointment;
pub mod error;
pub mod history;
pub mod notify;
pub mod payment;
pub mod permissions;
pub mod roles;
pub mod state_machine;
pub mod status;
pub mod types;
pub mod views;
