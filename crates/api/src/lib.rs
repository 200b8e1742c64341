//! Salon booking API server library.
//!
//! Exposes config, state, the appointment service, error handling and
//! routes so integration tests and the binary entrypoint share them.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod service;
pub mod state;
