//! Actor roles and the resolved session identity.
//!
//! The engine never authenticates; callers hand it an already-resolved
//! [`Actor`]. Role names must match the `role` claim issued to the mobile
//! app and the strings persisted in `statusHistory[].actorRole`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::EntityId;

pub const ROLE_CLIENT: &str = "client";
pub const ROLE_PROVIDER: &str = "provider";
pub const ROLE_OWNER: &str = "owner";

/// All valid role names.
pub const VALID_ROLES: &[&str] = &[ROLE_CLIENT, ROLE_PROVIDER, ROLE_OWNER];

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// The capacity in which a user acts on an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Books services for themself.
    Client,
    /// Performs services; owns their assigned appointments.
    Provider,
    /// Runs a shop; sees and manages every appointment.
    Owner,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => ROLE_CLIENT,
            Self::Provider => ROLE_PROVIDER,
            Self::Owner => ROLE_OWNER,
        }
    }

    /// Providers and owners act on the service side of an appointment.
    pub fn is_staff(self) -> bool {
        matches!(self, Self::Provider | Self::Owner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ROLE_CLIENT => Ok(Self::Client),
            ROLE_PROVIDER => Ok(Self::Provider),
            ROLE_OWNER => Ok(Self::Owner),
            other => Err(CoreError::Validation(format!(
                "Invalid role '{other}'. Must be one of: {}",
                VALID_ROLES.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The user initiating an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: EntityId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<EntityId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn client(id: impl Into<EntityId>) -> Self {
        Self::new(id, Role::Client)
    }

    pub fn provider(id: impl Into<EntityId>) -> Self {
        Self::new(id, Role::Provider)
    }

    pub fn owner(id: impl Into<EntityId>) -> Self {
        Self::new(id, Role::Owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_roles() {
        assert_eq!("client".parse::<Role>().unwrap(), Role::Client);
        assert_eq!("provider".parse::<Role>().unwrap(), Role::Provider);
        assert_eq!("owner".parse::<Role>().unwrap(), Role::Owner);
    }

    #[test]
    fn rejects_unknown_role() {
        let err = "admin".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("Invalid role 'admin'"));
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Role::Provider).unwrap();
        assert_eq!(json, "\"provider\"");
    }

    #[test]
    fn only_provider_and_owner_are_staff() {
        assert!(!Role::Client.is_staff());
        assert!(Role::Provider.is_staff());
        assert!(Role::Owner.is_staff());
    }
}
