//! Permission table: which roles may perform which action, from which
//! statuses, and the status each action leads to.
//!
//! This is the only place role-conditioned transition rules live. The
//! convenience wrappers on the appointment service are pure sugar that pick
//! an [`Action`]; they never re-check roles themselves.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::roles::Role;
use crate::status::AppointmentStatus;

use AppointmentStatus as S;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// A named permission key. Distinct from the target status so that callers
/// state their intent explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Request,
    Confirm,
    Start,
    Complete,
    Cancel,
    MarkNoShow,
    Reschedule,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Self::Request,
        Self::Confirm,
        Self::Start,
        Self::Complete,
        Self::Cancel,
        Self::MarkNoShow,
        Self::Reschedule,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Confirm => "confirm",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
            Self::MarkNoShow => "mark_no_show",
            Self::Reschedule => "reschedule",
        }
    }

    /// The table entry for this action.
    pub fn permission(self) -> &'static Permission {
        permission_for(self)
    }

    /// The status this action leads to.
    pub fn to_status(self) -> AppointmentStatus {
        self.permission().to_status
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| CoreError::InvalidTransition(format!("Unknown action '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Permission table
// ---------------------------------------------------------------------------

/// One row of the permission table.
#[derive(Debug, PartialEq, Eq)]
pub struct Permission {
    pub action: Action,
    pub allowed_roles: &'static [Role],
    /// Statuses the appointment may currently be in. Empty for `request`'s
    /// creation path, which has no prior status.
    pub allowed_from: &'static [AppointmentStatus],
    pub to_status: AppointmentStatus,
}

impl Permission {
    pub fn allows_role(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }

    pub fn allows_from(&self, status: AppointmentStatus) -> bool {
        self.allowed_from.contains(&status)
    }
}

const STAFF: &[Role] = &[Role::Provider, Role::Owner];
const EVERYONE: &[Role] = &[Role::Client, Role::Provider, Role::Owner];

/// The full permission table, one row per [`Action`].
pub static PERMISSION_TABLE: [Permission; 7] = [
    // Creation, or a client re-requesting after a reschedule.
    Permission {
        action: Action::Request,
        allowed_roles: &[Role::Client],
        allowed_from: &[S::Rescheduled],
        to_status: S::Requested,
    },
    Permission {
        action: Action::Confirm,
        allowed_roles: STAFF,
        allowed_from: &[S::Requested, S::Rescheduled],
        to_status: S::Confirmed,
    },
    Permission {
        action: Action::Start,
        allowed_roles: STAFF,
        allowed_from: &[S::Confirmed],
        to_status: S::InProgress,
    },
    Permission {
        action: Action::Complete,
        allowed_roles: STAFF,
        allowed_from: &[S::InProgress],
        to_status: S::Completed,
    },
    Permission {
        action: Action::Cancel,
        allowed_roles: EVERYONE,
        allowed_from: &AppointmentStatus::NON_TERMINAL,
        to_status: S::Cancelled,
    },
    Permission {
        action: Action::MarkNoShow,
        allowed_roles: STAFF,
        allowed_from: &[S::Confirmed, S::InProgress],
        to_status: S::NoShow,
    },
    Permission {
        action: Action::Reschedule,
        allowed_roles: EVERYONE,
        allowed_from: &AppointmentStatus::NON_TERMINAL,
        to_status: S::Rescheduled,
    },
];

/// Look up the table row for an action.
pub fn permission_for(action: Action) -> &'static Permission {
    match action {
        Action::Request => &PERMISSION_TABLE[0],
        Action::Confirm => &PERMISSION_TABLE[1],
        Action::Start => &PERMISSION_TABLE[2],
        Action::Complete => &PERMISSION_TABLE[3],
        Action::Cancel => &PERMISSION_TABLE[4],
        Action::MarkNoShow => &PERMISSION_TABLE[5],
        Action::Reschedule => &PERMISSION_TABLE[6],
    }
}

/// Actions a given role may take on an appointment in `status`.
///
/// Used by clients to decide which buttons to render.
pub fn available_actions(role: Role, status: AppointmentStatus) -> Vec<Action> {
    PERMISSION_TABLE
        .iter()
        .filter(|p| p.allows_role(role) && p.allows_from(status) && p.to_status != status)
        .map(|p| p.action)
        .collect()
}
