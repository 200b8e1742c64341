//! Status change recorder: the immutable audit trail of an appointment.
//!
//! [`create_status_change`] is a pure constructor. It performs no
//! permission checks; the state machine decides *whether* a transition may
//! happen, this module only records *that* it happened.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::permissions::Action;
use crate::roles::Role;
use crate::status::AppointmentStatus;
use crate::types::{EntityId, Metadata, Timestamp};

/// One audit record. Never mutated once appended to a history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub appointment_id: EntityId,
    /// `None` only for the creation entry.
    pub from_status: Option<AppointmentStatus>,
    pub to_status: AppointmentStatus,
    pub actor_id: EntityId,
    pub actor_role: Role,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub timestamp: Timestamp,
}

/// Build an audit entry stamped with the current time.
#[allow(clippy::too_many_arguments)]
pub fn create_status_change(
    appointment_id: impl Into<EntityId>,
    from_status: Option<AppointmentStatus>,
    to_status: AppointmentStatus,
    actor_id: impl Into<EntityId>,
    actor_role: Role,
    action: Action,
    reason: Option<String>,
    metadata: Option<Metadata>,
) -> StatusChange {
    StatusChange {
        appointment_id: appointment_id.into(),
        from_status,
        to_status,
        actor_id: actor_id.into(),
        actor_role,
        action,
        reason,
        metadata: metadata.unwrap_or_default(),
        timestamp: Utc::now(),
    }
}

/// Append an entry, keeping timestamps monotonically non-decreasing.
///
/// Wall clocks can step backwards; an entry that would sort before its
/// predecessor takes the predecessor's timestamp instead.
pub fn append_status_change(history: &mut Vec<StatusChange>, mut change: StatusChange) {
    if let Some(last) = history.last() {
        if change.timestamp < last.timestamp {
            change.timestamp = last.timestamp;
        }
    }
    history.push(change);
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn entry(to: AppointmentStatus) -> StatusChange {
        create_status_change(
            "a1",
            None,
            to,
            "c1",
            Role::Client,
            Action::Request,
            None,
            None,
        )
    }

    #[test]
    fn creation_entry_has_no_from_status() {
        let change = entry(AppointmentStatus::Requested);
        assert_eq!(change.appointment_id, "a1");
        assert!(change.from_status.is_none());
        assert_eq!(change.to_status, AppointmentStatus::Requested);
        assert_eq!(change.action, Action::Request);
        assert!(change.metadata.is_empty());
    }

    #[test]
    fn append_clamps_backwards_timestamp() {
        let mut history = vec![entry(AppointmentStatus::Requested)];
        let first_ts = history[0].timestamp;

        let mut late = entry(AppointmentStatus::Confirmed);
        late.timestamp = first_ts - Duration::seconds(5);
        append_status_change(&mut history, late);

        assert_eq!(history.len(), 2);
        assert_eq!(history[1].timestamp, first_ts);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let mut change = entry(AppointmentStatus::Requested);
        change.reason = Some("new booking".into());
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["appointmentId"], "a1");
        assert_eq!(json["fromStatus"], serde_json::Value::Null);
        assert_eq!(json["toStatus"], "requested");
        assert_eq!(json["actorRole"], "client");
        assert_eq!(json["reason"], "new booking");
    }
}
