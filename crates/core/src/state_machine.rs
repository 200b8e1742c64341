//! Appointment lifecycle state machine.
//!
//! Validation is side-effect free: it only accepts or rejects. Callers must
//! run it strictly before recording history, mutating the appointment,
//! persisting, or raising notifications.

use crate::appointment::Appointment;
use crate::error::CoreError;
use crate::permissions::{permission_for, Action};
use crate::roles::Role;
use crate::status::AppointmentStatus;

/// Validate a requested transition of `appointment` to `new_status`.
///
/// Checks, in order:
/// 1. the action's target status is `new_status` (the action is never
///    inferred from the pair),
/// 2. the transition is not a no-op,
/// 3. `role` is allowed to perform the action,
/// 4. the appointment's current status is an allowed source for the action.
pub fn validate_transition(
    appointment: &Appointment,
    new_status: AppointmentStatus,
    role: Role,
    action: Action,
) -> Result<(), CoreError> {
    check(appointment.status, new_status, role, action)
}

/// String entry point: parses the action key first and rejects unknown keys.
pub fn validate_transition_str(
    appointment: &Appointment,
    new_status: AppointmentStatus,
    role: Role,
    action: &str,
) -> Result<Action, CoreError> {
    let action: Action = action.parse()?;
    validate_transition(appointment, new_status, role, action)?;
    Ok(action)
}

/// Status-level check, independent of any particular appointment record.
pub fn check(
    current: AppointmentStatus,
    new_status: AppointmentStatus,
    role: Role,
    action: Action,
) -> Result<(), CoreError> {
    let permission = permission_for(action);

    if permission.to_status != new_status {
        return Err(CoreError::InvalidTransition(format!(
            "Action '{action}' leads to '{}', not '{new_status}'",
            permission.to_status
        )));
    }

    if current == new_status {
        return Err(CoreError::InvalidTransition(format!(
            "Appointment is already '{current}'"
        )));
    }

    if !permission.allows_role(role) {
        return Err(CoreError::InvalidTransition(format!(
            "Role '{role}' is not allowed to perform '{action}'"
        )));
    }

    if !permission.allows_from(current) {
        return Err(CoreError::InvalidTransition(format!(
            "Cannot '{action}' an appointment that is '{current}'"
        )));
    }

    Ok(())
}

/// Whether `check` would accept the transition.
#[cfg(test)]
fn can_transition(
    current: AppointmentStatus,
    new_status: AppointmentStatus,
    role: Role,
    action: Action,
) -> bool {
    check(current, new_status, role, action).is_ok()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::permissions::PERMISSION_TABLE;
    use AppointmentStatus as S;

    const ROLES: [Role; 3] = [Role::Client, Role::Provider, Role::Owner];

    #[test]
    fn every_combination_outside_the_table_is_rejected() {
        for action in Action::ALL {
            let p = permission_for(action);
            for role in ROLES {
                for from in S::ALL {
                    for to in S::ALL {
                        let expected = p.to_status == to
                            && from != to
                            && p.allows_role(role)
                            && p.allows_from(from);
                        assert_eq!(
                            can_transition(from, to, role, action),
                            expected,
                            "{role} {action} {from} -> {to}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn no_op_is_always_rejected() {
        for status in S::ALL {
            for role in ROLES {
                for action in Action::ALL {
                    assert!(!can_transition(status, status, role, action));
                }
            }
        }
    }

    #[test]
    fn provider_confirms_requested() {
        assert!(can_transition(S::Requested, S::Confirmed, Role::Provider, Action::Confirm));
    }

    #[test]
    fn client_cannot_start() {
        let err = check(S::Requested, S::InProgress, Role::Client, Action::Start).unwrap_err();
        assert_matches!(err, CoreError::InvalidTransition(msg) => {
            assert!(msg.contains("client"));
            assert!(msg.contains("start"));
        });
    }

    #[test]
    fn start_requires_confirmed() {
        assert_matches!(
            check(S::Requested, S::InProgress, Role::Provider, Action::Start),
            Err(CoreError::InvalidTransition(_))
        );
    }

    #[test]
    fn mismatched_action_and_target_is_rejected() {
        assert_matches!(
            check(S::InProgress, S::Completed, Role::Provider, Action::Cancel),
            Err(CoreError::InvalidTransition(_))
        );
    }

    #[test]
    fn terminal_states_have_no_exit() {
        for from in [S::Completed, S::Cancelled, S::NoShow] {
            for p in &PERMISSION_TABLE {
                for role in ROLES {
                    assert!(!can_transition(from, p.to_status, role, p.action));
                }
            }
        }
    }

    #[test]
    fn no_show_only_from_confirmed_or_in_progress() {
        assert!(can_transition(S::Confirmed, S::NoShow, Role::Owner, Action::MarkNoShow));
        assert!(can_transition(S::InProgress, S::NoShow, Role::Provider, Action::MarkNoShow));
        assert!(!can_transition(S::Requested, S::NoShow, Role::Provider, Action::MarkNoShow));
    }

    #[test]
    fn rescheduled_re_enters_flow() {
        assert!(can_transition(S::Rescheduled, S::Requested, Role::Client, Action::Request));
        assert!(can_transition(S::Rescheduled, S::Confirmed, Role::Provider, Action::Confirm));
        assert!(!can_transition(S::Rescheduled, S::Requested, Role::Provider, Action::Request));
    }

    #[test]
    fn string_entry_point_rejects_unknown_action() {
        let appt = requested_appointment();
        let err = validate_transition_str(&appt, S::Confirmed, Role::Provider, "approve")
            .unwrap_err();
        assert_matches!(err, CoreError::InvalidTransition(msg) => {
            assert!(msg.contains("Unknown action 'approve'"));
        });
    }

    #[test]
    fn string_entry_point_returns_parsed_action() {
        let appt = requested_appointment();
        let action =
            validate_transition_str(&appt, S::Confirmed, Role::Provider, "confirm").unwrap();
        assert_eq!(action, Action::Confirm);
    }

    fn requested_appointment() -> Appointment {
        let input = crate::appointment::NewAppointment {
            client_id: Some("C1".into()),
            provider_id: Some("P1".into()),
            service_id: Some("S1".into()),
            date: chrono::NaiveDate::from_ymd_opt(2024, 9, 16),
            start_time: chrono::NaiveTime::from_hms_opt(17, 0, 0),
            duration: Some(30),
            ..Default::default()
        };
        Appointment::request(&crate::roles::Actor::client("C1"), input).unwrap()
    }
}
