//! The appointment store.
//!
//! [`AppointmentService`] owns the appointment collection. Every mutation
//! runs under its write lock: validate, mutate in memory, enqueue a
//! snapshot on the [`FlushQueue`], publish the [`BookingEvent`]. A rejected
//! request leaves the collection untouched and produces no side effects.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use salon_core::appointment::{
    clock_time, metadata_keys, Appointment, AppointmentPatch, NewAppointment, TransitionExtras,
};
use salon_core::error::CoreError;
use salon_core::history::create_status_change;
use salon_core::permissions::Action;
use salon_core::roles::Actor;
use salon_core::status::AppointmentStatus;
use salon_core::state_machine::validate_transition;
use salon_core::types::Metadata;
use salon_db::{keys, load_with_timeout, KeyValueStore};
use salon_events::{AppointmentSource, BookingEvent, EventBus, FlushQueue, TransitionEvent};

/// Optional inputs to a status transition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransitionInput {
    pub reason: Option<String>,
    /// Stored in the client's or the provider's note field, by actor role.
    pub notes: Option<String>,
    pub metadata: Option<Metadata>,
}

/// A proposed new slot for a reschedule.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RescheduleInput {
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub date: Option<NaiveDate>,
    #[serde(with = "clock_time::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(with = "clock_time::option")]
    pub end_time: Option<NaiveTime>,
}

impl RescheduleInput {
    fn into_transition(self) -> TransitionInput {
        let mut metadata = Metadata::new();
        if let Some(date) = self.date {
            metadata.insert(metadata_keys::DATE.into(), date.format("%Y-%m-%d").to_string().into());
        }
        if let Some(start) = self.start_time {
            metadata.insert(metadata_keys::START_TIME.into(), start.format("%H:%M").to_string().into());
        }
        if let Some(end) = self.end_time {
            metadata.insert(metadata_keys::END_TIME.into(), end.format("%H:%M").to_string().into());
        }
        TransitionInput {
            reason: self.reason,
            notes: self.notes,
            metadata: Some(metadata),
        }
    }
}

// ---------------------------------------------------------------------------
// AppointmentService
// ---------------------------------------------------------------------------

pub struct AppointmentService {
    appointments: RwLock<Vec<Appointment>>,
    bus: Arc<EventBus>,
    flush: FlushQueue,
}

impl AppointmentService {
    pub fn new(bus: Arc<EventBus>, flush: FlushQueue) -> Self {
        Self::with_appointments(bus, flush, Vec::new())
    }

    pub fn with_appointments(
        bus: Arc<EventBus>,
        flush: FlushQueue,
        appointments: Vec<Appointment>,
    ) -> Self {
        Self {
            appointments: RwLock::new(appointments),
            bus,
            flush,
        }
    }

    /// Restore the collection from storage within `deadline`.
    ///
    /// Falls back to `seed` when storage is slow, unreadable, or empty.
    pub async fn load(
        store: &dyn KeyValueStore,
        deadline: Duration,
        bus: Arc<EventBus>,
        flush: FlushQueue,
        seed: Vec<Appointment>,
    ) -> Self {
        let appointments =
            match load_with_timeout::<Vec<Appointment>>(store, keys::APPOINTMENTS, deadline).await {
                Ok(Some(appointments)) => {
                    tracing::info!(count = appointments.len(), "Loaded appointments");
                    appointments
                }
                Ok(None) => {
                    tracing::info!(count = seed.len(), "No stored appointments, using seed data");
                    seed
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        count = seed.len(),
                        "Could not load appointments, using seed data"
                    );
                    seed
                }
            };
        Self::with_appointments(bus, flush, appointments)
    }

    // --- Reads ---

    pub async fn get_appointment(&self, id: &str) -> Result<Appointment, CoreError> {
        self.appointments
            .read()
            .await
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| CoreError::appointment_not_found(id))
    }

    pub async fn all_appointments(&self) -> Vec<Appointment> {
        self.appointments.read().await.clone()
    }

    // --- Creation ---

    /// Create a new appointment in `requested` on behalf of a client.
    pub async fn request_appointment(
        &self,
        actor: &Actor,
        input: NewAppointment,
    ) -> Result<Appointment, CoreError> {
        let appointment = match Appointment::request(actor, input) {
            Ok(appointment) => appointment,
            Err(e) => {
                tracing::warn!(
                    actor_id = %actor.id,
                    role = %actor.role,
                    error = %e,
                    "Appointment request rejected"
                );
                return Err(e);
            }
        };

        let mut appointments = self.appointments.write().await;
        appointments.push(appointment.clone());
        self.flush.enqueue_json(keys::APPOINTMENTS, &*appointments);
        if let Some(event) = TransitionEvent::latest(appointment.clone()) {
            self.bus.publish(BookingEvent::StatusChanged(event));
        }

        tracing::info!(
            appointment_id = %appointment.id,
            client_id = %appointment.client_id,
            provider_id = %appointment.provider_id,
            "Appointment requested"
        );
        Ok(appointment)
    }

    // --- Transitions ---

    /// Move an appointment to `new_status` through `action`.
    ///
    /// The actor must take part in the appointment (owners take part in
    /// all of them). Every check, metadata parsing included, runs before
    /// anything is written.
    pub async fn update_appointment_status(
        &self,
        actor: &Actor,
        id: &str,
        new_status: AppointmentStatus,
        action: Action,
        input: TransitionInput,
    ) -> Result<Appointment, CoreError> {
        let mut appointments = self.appointments.write().await;
        let appointment = appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| CoreError::appointment_not_found(id))?;

        let from = appointment.status;
        let metadata = input.metadata.unwrap_or_default();
        let extras = match check_transition(appointment, actor, new_status, action, &metadata) {
            Ok(extras) => extras,
            Err(e) => {
                tracing::warn!(
                    appointment_id = %id,
                    action = %action,
                    from = %from,
                    to = %new_status,
                    role = %actor.role,
                    error = %e,
                    "Transition rejected"
                );
                return Err(e);
            }
        };

        let change = create_status_change(
            id,
            Some(from),
            new_status,
            actor.id.clone(),
            actor.role,
            action,
            input.reason,
            Some(metadata),
        );
        appointment.apply_transition(change, input.notes, extras);
        let updated = appointment.clone();

        self.flush.enqueue_json(keys::APPOINTMENTS, &*appointments);
        if let Some(event) = TransitionEvent::latest(updated.clone()) {
            self.bus.publish(BookingEvent::StatusChanged(event));
        }

        tracing::info!(
            appointment_id = %id,
            action = %action,
            from = %from,
            to = %new_status,
            actor_id = %actor.id,
            "Appointment transitioned"
        );
        Ok(updated)
    }

    pub async fn confirm_appointment(&self, actor: &Actor, id: &str) -> Result<Appointment, CoreError> {
        self.update_appointment_status(
            actor,
            id,
            AppointmentStatus::Confirmed,
            Action::Confirm,
            TransitionInput::default(),
        )
        .await
    }

    pub async fn start_appointment(&self, actor: &Actor, id: &str) -> Result<Appointment, CoreError> {
        self.update_appointment_status(
            actor,
            id,
            AppointmentStatus::InProgress,
            Action::Start,
            TransitionInput::default(),
        )
        .await
    }

    /// Complete an appointment, optionally recording a tip.
    pub async fn complete_appointment(
        &self,
        actor: &Actor,
        id: &str,
        tip_amount: Option<f64>,
    ) -> Result<Appointment, CoreError> {
        let mut metadata = Metadata::new();
        if let Some(tip) = tip_amount {
            metadata.insert(metadata_keys::TIP_AMOUNT.into(), tip.into());
        }
        self.update_appointment_status(
            actor,
            id,
            AppointmentStatus::Completed,
            Action::Complete,
            TransitionInput {
                metadata: Some(metadata),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn cancel_appointment(
        &self,
        actor: &Actor,
        id: &str,
        reason: Option<String>,
    ) -> Result<Appointment, CoreError> {
        self.update_appointment_status(
            actor,
            id,
            AppointmentStatus::Cancelled,
            Action::Cancel,
            TransitionInput {
                reason,
                ..Default::default()
            },
        )
        .await
    }

    pub async fn mark_no_show(
        &self,
        actor: &Actor,
        id: &str,
        reason: Option<String>,
    ) -> Result<Appointment, CoreError> {
        self.update_appointment_status(
            actor,
            id,
            AppointmentStatus::NoShow,
            Action::MarkNoShow,
            TransitionInput {
                reason,
                ..Default::default()
            },
        )
        .await
    }

    /// Move an appointment to `rescheduled`, applying the proposed slot.
    pub async fn reschedule_appointment(
        &self,
        actor: &Actor,
        id: &str,
        input: RescheduleInput,
    ) -> Result<Appointment, CoreError> {
        self.update_appointment_status(
            actor,
            id,
            AppointmentStatus::Rescheduled,
            Action::Reschedule,
            input.into_transition(),
        )
        .await
    }

    /// A client renews the request for a rescheduled appointment.
    pub async fn rerequest_appointment(
        &self,
        actor: &Actor,
        id: &str,
    ) -> Result<Appointment, CoreError> {
        self.update_appointment_status(
            actor,
            id,
            AppointmentStatus::Requested,
            Action::Request,
            TransitionInput::default(),
        )
        .await
    }

    // --- Non-status updates ---

    /// Apply a non-status field update. No event is published.
    ///
    /// The actor's role decides which fields it may write; see
    /// [`Appointment::apply_patch`].
    pub async fn update_appointment(
        &self,
        actor: &Actor,
        id: &str,
        patch: AppointmentPatch,
    ) -> Result<Appointment, CoreError> {
        let mut appointments = self.appointments.write().await;
        let appointment = appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| CoreError::appointment_not_found(id))?;

        appointment.apply_patch(patch, actor.role, Utc::now())?;
        let updated = appointment.clone();
        self.flush.enqueue_json(keys::APPOINTMENTS, &*appointments);

        tracing::info!(appointment_id = %id, role = %actor.role, "Appointment fields updated");
        Ok(updated)
    }

    /// Raw JSON entry point; `status` and `statusHistory` are dropped.
    pub async fn update_appointment_json(
        &self,
        actor: &Actor,
        id: &str,
        payload: serde_json::Value,
    ) -> Result<Appointment, CoreError> {
        let (patch, stripped) = AppointmentPatch::from_json(payload)?;
        if !stripped.is_empty() {
            tracing::warn!(
                appointment_id = %id,
                keys = ?stripped,
                "Ignored status fields in field update; use a transition instead"
            );
        }
        self.update_appointment(actor, id, patch).await
    }
}

#[async_trait]
impl AppointmentSource for AppointmentService {
    async fn snapshot(&self) -> Vec<Appointment> {
        self.all_appointments().await
    }
}

/// Everything that can reject a transition: participation, the permission
/// table, and the metadata payload.
fn check_transition(
    appointment: &Appointment,
    actor: &Actor,
    new_status: AppointmentStatus,
    action: Action,
    metadata: &Metadata,
) -> Result<TransitionExtras, CoreError> {
    // Owners take part in every appointment.
    if !appointment.involves(actor.role, &actor.id) {
        return Err(CoreError::Unauthorized(format!(
            "User '{}' is not a participant in appointment {}",
            actor.id, appointment.id
        )));
    }
    validate_transition(appointment, new_status, actor.role, action)?;
    TransitionExtras::from_metadata(action, appointment, metadata)
}
