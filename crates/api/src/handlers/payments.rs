//! Handlers for the `/payments` resource.

use axum::extract::{Path, State};
use axum::Json;
use salon_core::error::CoreError;
use salon_core::payment::Payment;

use crate::error::AppResult;
use crate::handlers::appointments::scoped_appointment;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/payments/{appointment_id}
///
/// The payment derived from a completed appointment the caller takes part in.
pub async fn payment_for_appointment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
) -> AppResult<Json<DataResponse<Payment>>> {
    scoped_appointment(&state, &auth, &appointment_id).await?;
    let payment = state
        .payments
        .payment_for(&appointment_id)
        .await
        .ok_or_else(|| CoreError::NotFound {
            entity: "Payment",
            id: appointment_id.clone(),
        })?;
    Ok(Json(DataResponse { data: payment }))
}
