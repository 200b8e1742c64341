pub mod appointments;
pub mod health;
pub mod notifications;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /appointments                                     list, request
/// /appointments/{id}                                get, field update
/// /appointments/{id}/actions                        actions open to the caller
/// /appointments/{id}/status                         generic transition (POST)
/// /appointments/{id}/{confirm,start,complete,
///                     cancel,no-show,reschedule,
///                     rerequest}                    named transitions (POST)
/// /appointments/views/{pending,today,upcoming,
///                      past,grouped}                role views
///
/// /analytics/revenue                                revenue estimate (owner only)
/// /analytics/providers/{provider_id}/daily          provider day summary
///
/// /notifications                                    list (?unread_only=)
/// /notifications/unread-count                       unread count
/// /notifications/read-all                           mark all read (POST)
/// /notifications/{id}/read                          mark one read (POST)
///
/// /payments/{appointment_id}                        derived payment
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Appointment lifecycle and role views.
        .nest("/appointments", appointments::router())
        // Owner and provider aggregates.
        .route("/analytics/revenue", get(handlers::analytics::revenue))
        .route(
            "/analytics/providers/{provider_id}/daily",
            get(handlers::analytics::provider_daily),
        )
        // In-app notifications.
        .nest("/notifications", notifications::router())
        // Derived payments.
        .route(
            "/payments/{appointment_id}",
            get(handlers::payments::payment_for_appointment),
        )
}
