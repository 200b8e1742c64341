//! Appointment and payment status values.
//!
//! Serialized names are the kebab-case strings stored in the persisted
//! appointments blob (`"in-progress"`, `"no-show"`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// AppointmentStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Requested,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl AppointmentStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [AppointmentStatus; 7] = [
        Self::Requested,
        Self::Confirmed,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
        Self::NoShow,
        Self::Rescheduled,
    ];

    /// Statuses from which an appointment can still move forward.
    pub const NON_TERMINAL: [AppointmentStatus; 4] = [
        Self::Requested,
        Self::Confirmed,
        Self::InProgress,
        Self::Rescheduled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Confirmed => "confirmed",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no-show",
            Self::Rescheduled => "rescheduled",
        }
    }

    /// No outbound transitions exist from a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown appointment status '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// PaymentStatus
// ---------------------------------------------------------------------------

/// Payment state carried on the appointment itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Pending,
    Paid,
    Refunded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        let terminal: Vec<_> = AppointmentStatus::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(
            terminal,
            vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow
            ]
        );
    }

    #[test]
    fn non_terminal_set_is_complement_of_terminal() {
        for status in AppointmentStatus::ALL {
            assert_eq!(
                AppointmentStatus::NON_TERMINAL.contains(&status),
                !status.is_terminal(),
                "{status}"
            );
        }
    }

    #[test]
    fn string_round_trip_uses_kebab_case() {
        assert_eq!(
            serde_json::to_string(&AppointmentStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        assert_eq!(
            "no-show".parse::<AppointmentStatus>().unwrap(),
            AppointmentStatus::NoShow
        );
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("pending".parse::<AppointmentStatus>().is_err());
    }
}
