//! The appointment record and the pure mutations applied to it.
//!
//! Nothing in here decides whether a transition is allowed; see
//! [`state_machine`](crate::state_machine). Once a transition is accepted,
//! [`Appointment::apply_transition`] updates every status-dependent field
//! from the recorded [`StatusChange`].

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::history::{append_status_change, create_status_change, StatusChange};
use crate::permissions::Action;
use crate::roles::{Actor, Role};
use crate::status::{AppointmentStatus, PaymentStatus};
use crate::types::{new_id, EntityId, Metadata, Timestamp};

/// Metadata keys understood by [`TransitionExtras::from_metadata`].
pub mod metadata_keys {
    pub const DATE: &str = "date";
    pub const START_TIME: &str = "startTime";
    pub const END_TIME: &str = "endTime";
    pub const TIP_AMOUNT: &str = "tipAmount";
}

// ---------------------------------------------------------------------------
// Appointment
// ---------------------------------------------------------------------------

/// One scheduled service engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: EntityId,
    pub client_id: EntityId,
    pub provider_id: EntityId,
    pub service_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop_id: Option<EntityId>,

    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
    /// Minutes.
    pub duration: u32,

    pub status: AppointmentStatus,

    #[serde(default)]
    pub service_amount: f64,
    #[serde(default)]
    pub tip_amount: f64,
    #[serde(default)]
    pub tax_amount: f64,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub payment_status: PaymentStatus,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_show_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reschedule_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_notes: Option<String>,

    #[serde(default)]
    pub status_history: Vec<StatusChange>,
}

impl Appointment {
    /// Create a new appointment in `requested` from a client's booking.
    ///
    /// Validates required fields and fills in `end_time` from the duration
    /// when the caller did not supply one. The returned appointment already
    /// carries its creation audit entry.
    pub fn request(actor: &Actor, mut input: NewAppointment) -> Result<Self, CoreError> {
        let action = Action::Request;
        if !action.permission().allows_role(actor.role) {
            return Err(CoreError::InvalidTransition(format!(
                "Role '{}' is not allowed to perform '{action}'",
                actor.role
            )));
        }

        if input.client_id.is_none() {
            input.client_id = Some(actor.id.clone());
        }
        let valid = input.validate()?;
        if valid.client_id != actor.id {
            return Err(CoreError::Unauthorized(
                "Clients can only request appointments for themselves".into(),
            ));
        }

        let id = new_id();
        let creation = create_status_change(
            id.clone(),
            None,
            AppointmentStatus::Requested,
            actor.id.clone(),
            actor.role,
            action,
            None,
            None,
        );
        let now = creation.timestamp;

        let mut appointment = Self {
            id,
            client_id: valid.client_id,
            provider_id: valid.provider_id,
            service_id: valid.service_id,
            shop_id: input.shop_id,
            date: valid.date,
            start_time: valid.start_time,
            end_time: valid.end_time,
            duration: valid.duration,
            status: AppointmentStatus::Requested,
            service_amount: input.service_amount,
            tip_amount: input.tip_amount,
            tax_amount: input.tax_amount,
            total_amount: 0.0,
            payment_status: PaymentStatus::Unpaid,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            no_show_reason: None,
            reschedule_reason: None,
            client_notes: input.client_notes,
            provider_notes: None,
            status_history: vec![creation],
        };
        appointment.recompute_total();
        Ok(appointment)
    }

    /// `total_amount = service + tip + tax`.
    pub fn recompute_total(&mut self) {
        self.total_amount = self.service_amount + self.tip_amount + self.tax_amount;
    }

    /// The most recent audit entry.
    pub fn last_change(&self) -> Option<&StatusChange> {
        self.status_history.last()
    }

    /// Apply an accepted transition.
    ///
    /// Appends `change` to the history and updates `status`, `updated_at`,
    /// the status-specific timestamp/reason fields, and the note field that
    /// belongs to the actor's role.
    pub fn apply_transition(
        &mut self,
        change: StatusChange,
        notes: Option<String>,
        extras: TransitionExtras,
    ) {
        let to = change.to_status;
        let reason = change.reason.clone();
        let role = change.actor_role;

        append_status_change(&mut self.status_history, change);
        let at = self
            .last_change()
            .map_or_else(chrono::Utc::now, |c| c.timestamp);
        self.status = to;
        self.updated_at = at;

        match to {
            AppointmentStatus::Confirmed => self.confirmed_at = Some(at),
            AppointmentStatus::InProgress => self.started_at = Some(at),
            AppointmentStatus::Completed => {
                self.completed_at = Some(at);
                if self.payment_status == PaymentStatus::Unpaid {
                    self.payment_status = PaymentStatus::Pending;
                }
            }
            AppointmentStatus::Cancelled => {
                self.cancelled_at = Some(at);
                self.cancellation_reason = reason;
            }
            AppointmentStatus::NoShow => self.no_show_reason = reason,
            AppointmentStatus::Rescheduled => self.reschedule_reason = reason,
            AppointmentStatus::Requested => {}
        }

        if let Some(slot) = extras.slot {
            self.date = slot.date;
            self.start_time = slot.start_time;
            self.end_time = slot.end_time;
            self.duration = slot.duration;
        }
        if let Some(tip) = extras.tip_amount {
            self.tip_amount = tip;
            self.recompute_total();
        }

        if let Some(notes) = notes {
            self.set_notes(role, notes);
        }
    }

    /// Clients write `client_notes`; providers and owners write `provider_notes`.
    fn set_notes(&mut self, role: Role, notes: String) {
        match role {
            Role::Client => self.client_notes = Some(notes),
            Role::Provider | Role::Owner => self.provider_notes = Some(notes),
        }
    }

    /// Apply a non-status field update made by someone acting as `role`.
    ///
    /// Either every field in the patch is applied or, on error, none is.
    pub fn apply_patch(
        &mut self,
        patch: AppointmentPatch,
        role: Role,
        at: Timestamp,
    ) -> Result<(), CoreError> {
        patch.validate()?;
        patch.authorize(role, self.status)?;
        let mut next = self.clone();
        next.apply_patch_fields(patch, role)?;
        next.updated_at = at;
        *self = next;
        Ok(())
    }

    fn apply_patch_fields(&mut self, patch: AppointmentPatch, role: Role) -> Result<(), CoreError> {
        if let Some(v) = patch.service_id {
            self.service_id = v;
        }
        if let Some(v) = patch.shop_id {
            self.shop_id = Some(v);
        }
        if let Some(v) = patch.date {
            self.date = v;
        }
        if let Some(v) = patch.start_time {
            self.start_time = v;
        }
        if let Some(v) = patch.duration {
            self.duration = v;
        }
        match patch.end_time {
            Some(v) => self.end_time = v,
            None if patch.start_time.is_some() || patch.duration.is_some() => {
                self.end_time = end_of_slot(self.start_time, self.duration)?;
            }
            None => {}
        }
        if self.end_time <= self.start_time {
            return Err(CoreError::Validation(
                "endTime must be after startTime".into(),
            ));
        }
        if patch.end_time.is_some() {
            let minutes = u32::try_from((self.end_time - self.start_time).num_minutes())
                .map_err(|_| CoreError::Validation("endTime is out of range".into()))?;
            match patch.duration {
                Some(d) if d != minutes => {
                    return Err(CoreError::Validation(format!(
                        "duration {d} does not match the {minutes} minutes between startTime and endTime"
                    )));
                }
                _ => self.duration = minutes,
            }
        }

        if let Some(v) = patch.service_amount {
            self.service_amount = v;
        }
        if let Some(v) = patch.tip_amount {
            self.tip_amount = v;
        }
        if let Some(v) = patch.tax_amount {
            self.tax_amount = v;
        }
        if let Some(v) = patch.payment_status {
            self.payment_status = v;
        }
        if let Some(v) = patch.client_notes {
            self.client_notes = Some(v);
        }
        if let Some(v) = patch.provider_notes {
            self.provider_notes = Some(v);
        }
        if let Some(v) = patch.notes {
            self.set_notes(role, v);
        }

        self.recompute_total();
        Ok(())
    }

    /// Whether the user takes part in this appointment in the given role.
    pub fn involves(&self, role: Role, user_id: &str) -> bool {
        match role {
            Role::Client => self.client_id == user_id,
            Role::Provider => self.provider_id == user_id,
            Role::Owner => true,
        }
    }
}

/// End of a slot that starts at `start` and lasts `duration` minutes.
///
/// Slots may not run past midnight.
pub fn end_of_slot(start: NaiveTime, duration: u32) -> Result<NaiveTime, CoreError> {
    let (end, wrapped_secs) = start.overflowing_add_signed(Duration::minutes(i64::from(duration)));
    if wrapped_secs != 0 {
        return Err(CoreError::Validation(
            "Appointment must end on the same day it starts".into(),
        ));
    }
    Ok(end)
}

// ---------------------------------------------------------------------------
// NewAppointment
// ---------------------------------------------------------------------------

/// Booking request as submitted by a client. Required fields are optional
/// here so that missing ones produce a precise validation message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewAppointment {
    pub client_id: Option<EntityId>,
    pub provider_id: Option<EntityId>,
    pub service_id: Option<EntityId>,
    pub shop_id: Option<EntityId>,
    pub date: Option<NaiveDate>,
    #[serde(with = "clock_time::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(with = "clock_time::option")]
    pub end_time: Option<NaiveTime>,
    pub duration: Option<u32>,
    pub service_amount: f64,
    pub tip_amount: f64,
    pub tax_amount: f64,
    pub client_notes: Option<String>,
}

struct ValidNewAppointment {
    client_id: EntityId,
    provider_id: EntityId,
    service_id: EntityId,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    duration: u32,
}

impl NewAppointment {
    fn validate(&self) -> Result<ValidNewAppointment, CoreError> {
        let mut missing = Vec::new();
        let non_empty = |v: &Option<EntityId>| {
            v.as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(str::to_owned)
        };

        let client_id = non_empty(&self.client_id);
        let provider_id = non_empty(&self.provider_id);
        let service_id = non_empty(&self.service_id);

        if client_id.is_none() {
            missing.push("clientId");
        }
        if provider_id.is_none() {
            missing.push("providerId");
        }
        if service_id.is_none() {
            missing.push("serviceId");
        }
        if self.date.is_none() {
            missing.push("date");
        }
        if self.start_time.is_none() {
            missing.push("startTime");
        }
        if self.duration.map_or(true, |d| d == 0) {
            missing.push("duration");
        }

        if !missing.is_empty() {
            return Err(CoreError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }
        let (
            Some(client_id),
            Some(provider_id),
            Some(service_id),
            Some(date),
            Some(start_time),
            Some(duration),
        ) = (
            client_id,
            provider_id,
            service_id,
            self.date,
            self.start_time,
            self.duration,
        )
        else {
            return Err(CoreError::Validation("Missing required fields".into()));
        };

        validate_amounts(&[self.service_amount, self.tip_amount, self.tax_amount])?;

        let end_time = match self.end_time {
            Some(end) if end <= start_time => {
                return Err(CoreError::Validation(
                    "endTime must be after startTime".into(),
                ));
            }
            Some(end) => end,
            None => end_of_slot(start_time, duration)?,
        };

        Ok(ValidNewAppointment {
            client_id,
            provider_id,
            service_id,
            date,
            start_time,
            end_time,
            duration,
        })
    }
}

fn validate_amounts(amounts: &[f64]) -> Result<(), CoreError> {
    if amounts.iter().any(|a| !a.is_finite() || *a < 0.0) {
        return Err(CoreError::Validation(
            "Amounts must be finite and non-negative".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// AppointmentPatch
// ---------------------------------------------------------------------------

/// Keys that may never be written through the non-status update path.
pub const PROTECTED_KEYS: &[&str] = &["status", "statusHistory"];

/// Partial update for non-status fields.
///
/// Deliberately has no `status` or `status_history` field: those change only
/// through validated transitions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppointmentPatch {
    pub service_id: Option<EntityId>,
    pub shop_id: Option<EntityId>,
    pub date: Option<NaiveDate>,
    #[serde(with = "clock_time::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(with = "clock_time::option")]
    pub end_time: Option<NaiveTime>,
    pub duration: Option<u32>,
    pub service_amount: Option<f64>,
    pub tip_amount: Option<f64>,
    pub tax_amount: Option<f64>,
    pub payment_status: Option<PaymentStatus>,
    pub client_notes: Option<String>,
    pub provider_notes: Option<String>,
    /// Written to the notes field of the caller's role.
    pub notes: Option<String>,
}

impl AppointmentPatch {
    /// Parse a raw JSON payload, dropping any protected keys first.
    ///
    /// Returns the patch and the list of keys that were stripped.
    pub fn from_json(mut value: serde_json::Value) -> Result<(Self, Vec<&'static str>), CoreError> {
        let mut stripped = Vec::new();
        if let Some(map) = value.as_object_mut() {
            for key in PROTECTED_KEYS {
                if map.remove(*key).is_some() {
                    stripped.push(*key);
                }
            }
        }
        let patch = serde_json::from_value(value)
            .map_err(|e| CoreError::Validation(format!("Invalid appointment update: {e}")))?;
        Ok((patch, stripped))
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.duration == Some(0) {
            return Err(CoreError::Validation("duration must be positive".into()));
        }
        let amounts: Vec<f64> = [self.service_amount, self.tip_amount, self.tax_amount]
            .into_iter()
            .flatten()
            .collect();
        validate_amounts(&amounts)
    }

    fn touches_money(&self) -> bool {
        self.service_amount.is_some()
            || self.tip_amount.is_some()
            || self.tax_amount.is_some()
            || self.payment_status.is_some()
    }

    /// Pricing and payment belong to staff, and each role writes only its
    /// own notes field.
    fn authorize(&self, role: Role, status: AppointmentStatus) -> Result<(), CoreError> {
        match role {
            Role::Client if self.touches_money() => {
                return Err(CoreError::Unauthorized(
                    "Clients cannot change pricing or payment status".into(),
                ));
            }
            Role::Client if self.provider_notes.is_some() => {
                return Err(CoreError::Unauthorized(
                    "Clients cannot write provider notes".into(),
                ));
            }
            Role::Provider | Role::Owner if self.client_notes.is_some() => {
                return Err(CoreError::Unauthorized(format!(
                    "{role}s cannot write client notes"
                )));
            }
            _ => {}
        }
        if self.touches_money() && status.is_terminal() {
            return Err(CoreError::Validation(format!(
                "Pricing and payment status are fixed once an appointment is {status}"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Transition extras
// ---------------------------------------------------------------------------

/// A new slot proposed by a reschedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSlot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration: u32,
}

/// Field updates carried in a transition's metadata, parsed up front so a
/// malformed payload is rejected before anything is mutated.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransitionExtras {
    pub slot: Option<ScheduleSlot>,
    pub tip_amount: Option<f64>,
}

impl TransitionExtras {
    pub fn from_metadata(
        action: Action,
        appointment: &Appointment,
        metadata: &Metadata,
    ) -> Result<Self, CoreError> {
        use metadata_keys::*;

        let mut extras = Self::default();

        match action {
            Action::Reschedule => {
                let date = parse_field(metadata, DATE, |s| s.parse::<NaiveDate>())?;
                let start = parse_field(metadata, START_TIME, clock_time::parse)?;
                let end = parse_field(metadata, END_TIME, clock_time::parse)?;

                if date.is_some() || start.is_some() || end.is_some() {
                    let date = date.unwrap_or(appointment.date);
                    let start_time = start.unwrap_or(appointment.start_time);
                    let (end_time, duration) = match end {
                        Some(end) if end <= start_time => {
                            return Err(CoreError::Validation(
                                "endTime must be after startTime".into(),
                            ));
                        }
                        Some(end) => {
                            let minutes = (end - start_time).num_minutes();
                            (end, u32::try_from(minutes).unwrap_or(appointment.duration))
                        }
                        None => (
                            end_of_slot(start_time, appointment.duration)?,
                            appointment.duration,
                        ),
                    };
                    extras.slot = Some(ScheduleSlot {
                        date,
                        start_time,
                        end_time,
                        duration,
                    });
                }
            }
            Action::Complete => {
                if let Some(value) = metadata.get(TIP_AMOUNT) {
                    let tip = value.as_f64().ok_or_else(|| {
                        CoreError::Validation(format!("{TIP_AMOUNT} must be a number"))
                    })?;
                    validate_amounts(&[tip])?;
                    extras.tip_amount = Some(tip);
                }
            }
            _ => {}
        }

        Ok(extras)
    }
}

fn parse_field<T, E>(
    metadata: &Metadata,
    key: &str,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Result<Option<T>, CoreError> {
    match metadata.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => parse(s)
            .map(Some)
            .map_err(|_| CoreError::Validation(format!("Invalid {key} '{s}'"))),
        Some(other) => Err(CoreError::Validation(format!(
            "Invalid {key}: expected a string, got {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

/// `HH:MM` wall-clock times, as stored by the mobile app. Parsing also
/// accepts `HH:MM:SS`.
pub mod clock_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse(s: &str) -> Result<NaiveTime, chrono::ParseError> {
        NaiveTime::parse_from_str(s, FORMAT).or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            time: &Option<NaiveTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => super::serialize(t, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            let s = Option::<String>::deserialize(deserializer)?;
            s.map(|s| super::parse(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
