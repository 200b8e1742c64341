//! Handlers for the `/analytics` resource.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use salon_core::error::CoreError;
use salon_core::roles::Role;
use salon_core::views::{self, ProviderDailySummary, RevenueEstimate};

use crate::error::AppResult;
use crate::handlers::views::DayQuery;
use crate::middleware::rbac::{RequireOwner, RequireStaff};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/analytics/revenue
///
/// Revenue estimate over completed appointments. Owners only.
pub async fn revenue(
    RequireOwner(auth): RequireOwner,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<RevenueEstimate>>> {
    let all = state.appointments.all_appointments().await;
    let estimate = views::revenue_estimate(&all, auth.role)?;
    Ok(Json(DataResponse { data: estimate }))
}

/// GET /api/v1/analytics/providers/{provider_id}/daily
///
/// Per-status counts for one provider's day. Providers may only read their
/// own summary.
pub async fn provider_daily(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    Query(params): Query<DayQuery>,
) -> AppResult<Json<DataResponse<ProviderDailySummary>>> {
    if auth.role == Role::Provider && auth.user_id != provider_id {
        return Err(CoreError::Unauthorized(
            "Providers can only view their own summary".into(),
        )
        .into());
    }
    let day = params.date.unwrap_or_else(|| Utc::now().date_naive());
    let all = state.appointments.all_appointments().await;
    let summary = views::provider_daily_summary(&all, &provider_id, day);
    Ok(Json(DataResponse { data: summary }))
}
