//! Route definitions for the `/appointments` resource.
//!
//! All endpoints require authentication.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{appointments, views};
use crate::state::AppState;

/// Routes mounted at `/appointments`.
///
/// ```text
/// GET    /                          -> list_appointments (?status=)
/// POST   /                          -> create_appointment
/// GET    /{id}                      -> get_appointment
/// PATCH  /{id}                      -> update_appointment
/// GET    /{id}/actions              -> list_actions
///
/// POST   /{id}/status               -> update_status
/// POST   /{id}/confirm              -> confirm
/// POST   /{id}/start                -> start
/// POST   /{id}/complete             -> complete
/// POST   /{id}/cancel               -> cancel
/// POST   /{id}/no-show              -> no_show
/// POST   /{id}/reschedule           -> reschedule
/// POST   /{id}/rerequest            -> rerequest
///
/// GET    /views/pending             -> pending (provider, owner)
/// GET    /views/today               -> today (provider, owner; ?date=)
/// GET    /views/upcoming            -> upcoming (client)
/// GET    /views/past                -> past (client)
/// GET    /views/grouped             -> grouped
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route(
            "/{id}",
            get(appointments::get_appointment).patch(appointments::update_appointment),
        )
        .route("/{id}/actions", get(appointments::list_actions))
        // Lifecycle transitions
        .route("/{id}/status", post(appointments::update_status))
        .route("/{id}/confirm", post(appointments::confirm))
        .route("/{id}/start", post(appointments::start))
        .route("/{id}/complete", post(appointments::complete))
        .route("/{id}/cancel", post(appointments::cancel))
        .route("/{id}/no-show", post(appointments::no_show))
        .route("/{id}/reschedule", post(appointments::reschedule))
        .route("/{id}/rerequest", post(appointments::rerequest))
        // Role views
        .route("/views/pending", get(views::pending))
        .route("/views/today", get(views::today))
        .route("/views/upcoming", get(views::upcoming))
        .route("/views/past", get(views::past))
        .route("/views/grouped", get(views::grouped))
}
