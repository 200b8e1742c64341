//! Role-scoped read views under `/appointments/views`.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use salon_core::appointment::Appointment;
use salon_core::status::AppointmentStatus;
use salon_core::views;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::{RequireClient, RequireStaff};
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for `GET /appointments/views/today`.
#[derive(Debug, Deserialize)]
pub struct DayQuery {
    /// Defaults to the current UTC date.
    pub date: Option<NaiveDate>,
}

fn owned(list: Vec<&Appointment>) -> Vec<Appointment> {
    list.into_iter().cloned().collect()
}

/// GET /api/v1/appointments/views/pending
///
/// Requests awaiting a decision from the calling provider (or any, for owners).
pub async fn pending(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Appointment>>>> {
    let all = state.appointments.all_appointments().await;
    let list = views::pending_requests(&all, auth.role, &auth.user_id);
    Ok(Json(DataResponse { data: owned(list) }))
}

/// GET /api/v1/appointments/views/today
pub async fn today(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Query(params): Query<DayQuery>,
) -> AppResult<Json<DataResponse<Vec<Appointment>>>> {
    let day = params.date.unwrap_or_else(|| Utc::now().date_naive());
    let all = state.appointments.all_appointments().await;
    let list = views::todays_confirmed(&all, auth.role, &auth.user_id, day);
    Ok(Json(DataResponse { data: owned(list) }))
}

/// GET /api/v1/appointments/views/upcoming
pub async fn upcoming(
    RequireClient(auth): RequireClient,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Appointment>>>> {
    let all = state.appointments.all_appointments().await;
    let list = views::upcoming(&all, &auth.user_id, Utc::now().naive_utc());
    Ok(Json(DataResponse { data: owned(list) }))
}

/// GET /api/v1/appointments/views/past
pub async fn past(
    RequireClient(auth): RequireClient,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Appointment>>>> {
    let all = state.appointments.all_appointments().await;
    let list = views::past(&all, &auth.user_id, Utc::now().naive_utc());
    Ok(Json(DataResponse { data: owned(list) }))
}

/// GET /api/v1/appointments/views/grouped
///
/// The caller's appointments keyed by status.
pub async fn grouped(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<BTreeMap<AppointmentStatus, Vec<Appointment>>>>> {
    let all = state.appointments.all_appointments().await;
    let groups = views::group_by_status(&all, auth.role, &auth.user_id)
        .into_iter()
        .map(|(status, list)| (status, owned(list)))
        .collect();
    Ok(Json(DataResponse { data: groups }))
}
