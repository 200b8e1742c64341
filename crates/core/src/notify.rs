//! Notification records and the fan-out rules that derive them from a
//! status transition.
//!
//! [`notifications_for_transition`] is pure: it decides who hears about a
//! transition and what they are told. Materialising drafts into stored
//! [`Notification`]s (ids, timestamps, dedup) is the events crate's job.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::appointment::Appointment;
use crate::status::AppointmentStatus;
use crate::types::{new_id, EntityId, Timestamp};

// ---------------------------------------------------------------------------
// NotificationType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    AppointmentRequested,
    AppointmentConfirmed,
    AppointmentCancelled,
    AppointmentRescheduled,
    AppointmentCompleted,
    PaymentReceived,
    AppointmentReminder,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A notification to be created for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub user_id: EntityId,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub appointment_id: Option<EntityId>,
}

/// A user-facing notification. Only `read` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: EntityId,
    pub user_id: EntityId,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<EntityId>,
    #[serde(default)]
    pub read: bool,
    pub created_at: Timestamp,
    /// Key of the event or reminder slot that produced this notification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup_key: Option<String>,
}

impl Notification {
    pub fn from_draft(draft: NotificationDraft, created_at: Timestamp) -> Self {
        Self {
            id: new_id(),
            user_id: draft.user_id,
            notification_type: draft.notification_type,
            title: draft.title,
            message: draft.message,
            appointment_id: draft.appointment_id,
            read: false,
            created_at,
            dedup_key: None,
        }
    }

    pub fn with_dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Fan-out rules
// ---------------------------------------------------------------------------

/// Derive the notifications raised by a transition into `new`.
///
/// `old` is `None` for a freshly created appointment. Transitions into
/// `in-progress` and `no-show` raise nothing.
pub fn notifications_for_transition(
    old: Option<AppointmentStatus>,
    new: AppointmentStatus,
    appointment: &Appointment,
    reason: Option<&str>,
) -> Vec<NotificationDraft> {
    let when = slot_label(appointment);
    let draft = |user_id: &str, kind: NotificationType, title: &str, message: String| {
        NotificationDraft {
            user_id: user_id.to_owned(),
            notification_type: kind,
            title: title.to_owned(),
            message,
            appointment_id: Some(appointment.id.clone()),
        }
    };

    match new {
        AppointmentStatus::Requested => {
            let (title, message) = if old == Some(AppointmentStatus::Rescheduled) {
                (
                    "Appointment Re-requested",
                    format!("A client renewed their booking request for {when}."),
                )
            } else {
                (
                    "New Appointment Request",
                    format!("You have a new booking request for {when}."),
                )
            };
            vec![draft(
                &appointment.provider_id,
                NotificationType::AppointmentRequested,
                title,
                message,
            )]
        }
        AppointmentStatus::Confirmed => vec![draft(
            &appointment.client_id,
            NotificationType::AppointmentConfirmed,
            "Appointment Confirmed",
            format!("Your appointment for {when} has been confirmed."),
        )],
        AppointmentStatus::Cancelled => {
            let suffix = reason
                .filter(|r| !r.trim().is_empty())
                .map(|r| format!(" Reason: {r}"))
                .unwrap_or_default();
            let message = format!("The appointment for {when} was cancelled.{suffix}");
            vec![
                draft(
                    &appointment.client_id,
                    NotificationType::AppointmentCancelled,
                    "Appointment Cancelled",
                    message.clone(),
                ),
                draft(
                    &appointment.provider_id,
                    NotificationType::AppointmentCancelled,
                    "Appointment Cancelled",
                    message,
                ),
            ]
        }
        AppointmentStatus::Rescheduled => {
            let message =
                format!("The appointment has been rescheduled to {when}. Please review the new time.");
            vec![
                draft(
                    &appointment.client_id,
                    NotificationType::AppointmentRescheduled,
                    "Appointment Rescheduled",
                    message.clone(),
                ),
                draft(
                    &appointment.provider_id,
                    NotificationType::AppointmentRescheduled,
                    "Appointment Rescheduled",
                    message,
                ),
            ]
        }
        AppointmentStatus::Completed => vec![draft(
            &appointment.provider_id,
            NotificationType::AppointmentCompleted,
            "Appointment Completed",
            format!(
                "The appointment for {when} is complete. Collect payment of ${:.2}.",
                appointment.total_amount
            ),
        )],
        AppointmentStatus::InProgress | AppointmentStatus::NoShow => Vec::new(),
    }
}

/// Reminder for a client's confirmed appointment starting within `lead` of
/// `now`. Slots already begun, and any other status, get nothing.
pub fn reminder_for(
    appointment: &Appointment,
    now: NaiveDateTime,
    lead: Duration,
) -> Option<NotificationDraft> {
    if appointment.status != AppointmentStatus::Confirmed {
        return None;
    }
    let starts = appointment.date.and_time(appointment.start_time);
    if starts < now || starts - now > lead {
        return None;
    }
    Some(NotificationDraft {
        user_id: appointment.client_id.clone(),
        notification_type: NotificationType::AppointmentReminder,
        title: "Upcoming Appointment".to_owned(),
        message: format!("Reminder: your appointment is on {}.", slot_label(appointment)),
        appointment_id: Some(appointment.id.clone()),
    })
}

/// Identifies one reminder per appointment slot; a rescheduled slot gets a
/// fresh reminder.
pub fn reminder_key(appointment: &Appointment) -> String {
    format!(
        "reminder:{}:{}T{}",
        appointment.id,
        appointment.date.format("%Y-%m-%d"),
        appointment.start_time.format("%H:%M")
    )
}

fn slot_label(appointment: &Appointment) -> String {
    format!(
        "{} at {}",
        appointment.date.format("%Y-%m-%d"),
        appointment.start_time.format("%H:%M")
    )
}
