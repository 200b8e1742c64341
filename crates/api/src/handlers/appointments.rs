//! Handlers for the `/appointments` resource.
//!
//! All endpoints require authentication via [`AuthUser`]. Appointments
//! outside the caller's scope are reported as not found.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use salon_core::appointment::{Appointment, NewAppointment};
use salon_core::error::CoreError;
use salon_core::permissions::{available_actions, Action};
use salon_core::status::AppointmentStatus;
use salon_core::types::Metadata;
use salon_core::views;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::service::{RescheduleInput, TransitionInput};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Query parameters for `GET /appointments`.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Restrict to one status, e.g. `confirmed` or `no-show`.
    pub status: Option<String>,
}

/// Body of `POST /appointments/{id}/status`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub status: String,
    pub action: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Body of `POST /appointments/{id}/complete`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompleteRequest {
    pub tip_amount: Option<f64>,
}

/// Body of `POST /appointments/{id}/cancel` and `/no-show`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

/// Body of `GET /appointments/{id}/actions`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsResponse {
    pub appointment_id: String,
    pub status: AppointmentStatus,
    pub actions: Vec<Action>,
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// GET /api/v1/appointments
///
/// The caller's appointments ordered by slot, optionally filtered by status.
pub async fn list_appointments(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> AppResult<Json<DataResponse<Vec<Appointment>>>> {
    let all = state.appointments.all_appointments().await;
    let scoped = match params.status {
        Some(status) => {
            let status: AppointmentStatus = status.parse()?;
            views::appointments_by_status(&all, auth.role, &auth.user_id, status)
        }
        None => views::appointments_for_user(&all, auth.role, &auth.user_id),
    };

    Ok(Json(DataResponse {
        data: scoped.into_iter().cloned().collect(),
    }))
}

/// POST /api/v1/appointments
///
/// A client requests a new appointment. Returns 201 with the appointment.
pub async fn create_appointment(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<NewAppointment>,
) -> AppResult<(StatusCode, Json<DataResponse<Appointment>>)> {
    let appointment = state
        .appointments
        .request_appointment(&auth.actor(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: appointment })))
}

/// GET /api/v1/appointments/{id}
pub async fn get_appointment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Appointment>>> {
    let appointment = scoped_appointment(&state, &auth, &id).await?;
    Ok(Json(DataResponse { data: appointment }))
}

/// GET /api/v1/appointments/{id}/actions
///
/// Transitions the caller's role may take from the current status.
pub async fn list_actions(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<ActionsResponse>>> {
    let appointment = scoped_appointment(&state, &auth, &id).await?;
    Ok(Json(DataResponse {
        data: ActionsResponse {
            actions: available_actions(auth.role, appointment.status),
            status: appointment.status,
            appointment_id: appointment.id,
        },
    }))
}

/// PATCH /api/v1/appointments/{id}
///
/// Update non-status fields. `status` and `statusHistory` in the body are
/// ignored. Clients may not touch pricing, payment status or provider notes.
pub async fn update_appointment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> AppResult<Json<DataResponse<Appointment>>> {
    scoped_appointment(&state, &auth, &id).await?;
    let appointment = state
        .appointments
        .update_appointment_json(&auth.actor(), &id, payload)
        .await?;
    Ok(Json(DataResponse { data: appointment }))
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// POST /api/v1/appointments/{id}/status
///
/// Generic transition: the body names both the target status and the action.
pub async fn update_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdateRequest>,
) -> AppResult<Json<DataResponse<Appointment>>> {
    let status: AppointmentStatus = body.status.parse()?;
    let action: Action = body.action.parse()?;
    let input = TransitionInput {
        reason: body.reason,
        notes: body.notes,
        metadata: body.metadata,
    };
    let appointment = state
        .appointments
        .update_appointment_status(&auth.actor(), &id, status, action, input)
        .await?;
    Ok(Json(DataResponse { data: appointment }))
}

/// POST /api/v1/appointments/{id}/confirm
pub async fn confirm(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Appointment>>> {
    let appointment = state
        .appointments
        .confirm_appointment(&auth.actor(), &id)
        .await?;
    Ok(Json(DataResponse { data: appointment }))
}

/// POST /api/v1/appointments/{id}/start
pub async fn start(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Appointment>>> {
    let appointment = state
        .appointments
        .start_appointment(&auth.actor(), &id)
        .await?;
    Ok(Json(DataResponse { data: appointment }))
}

/// POST /api/v1/appointments/{id}/complete
pub async fn complete(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CompleteRequest>,
) -> AppResult<Json<DataResponse<Appointment>>> {
    let appointment = state
        .appointments
        .complete_appointment(&auth.actor(), &id, body.tip_amount)
        .await?;
    Ok(Json(DataResponse { data: appointment }))
}

/// POST /api/v1/appointments/{id}/cancel
pub async fn cancel(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ReasonRequest>,
) -> AppResult<Json<DataResponse<Appointment>>> {
    let appointment = state
        .appointments
        .cancel_appointment(&auth.actor(), &id, body.reason)
        .await?;
    Ok(Json(DataResponse { data: appointment }))
}

/// POST /api/v1/appointments/{id}/no-show
pub async fn no_show(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ReasonRequest>,
) -> AppResult<Json<DataResponse<Appointment>>> {
    let appointment = state
        .appointments
        .mark_no_show(&auth.actor(), &id, body.reason)
        .await?;
    Ok(Json(DataResponse { data: appointment }))
}

/// POST /api/v1/appointments/{id}/reschedule
pub async fn reschedule(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RescheduleInput>,
) -> AppResult<Json<DataResponse<Appointment>>> {
    let appointment = state
        .appointments
        .reschedule_appointment(&auth.actor(), &id, body)
        .await?;
    Ok(Json(DataResponse { data: appointment }))
}

/// POST /api/v1/appointments/{id}/rerequest
///
/// A client renews the request after a reschedule.
pub async fn rerequest(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Appointment>>> {
    let appointment = state
        .appointments
        .rerequest_appointment(&auth.actor(), &id)
        .await?;
    Ok(Json(DataResponse { data: appointment }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch an appointment the caller may see.
pub(crate) async fn scoped_appointment(
    state: &AppState,
    auth: &AuthUser,
    id: &str,
) -> Result<Appointment, CoreError> {
    let appointment = state.appointments.get_appointment(id).await?;
    if !appointment.involves(auth.role, &auth.user_id) {
        return Err(CoreError::appointment_not_found(id));
    }
    Ok(appointment)
}
