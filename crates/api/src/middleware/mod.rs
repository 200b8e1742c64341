//! Authentication and authorization middleware extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer token.
//! - [`rbac::RequireOwner`] -- Requires the `owner` role.
//! - [`rbac::RequireStaff`] -- Requires `provider` or `owner` role.
//! - [`rbac::RequireClient`] -- Requires the `client` role.

pub mod auth;
pub mod rbac;
