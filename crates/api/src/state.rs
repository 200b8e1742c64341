use std::sync::Arc;

use salon_events::{EventBus, FlushQueue, NotificationStore, PaymentLedger};

use crate::config::ServerConfig;
use crate::service::AppointmentService;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// The appointment store; the only writer of appointment fields.
    pub appointments: Arc<AppointmentService>,
    pub notifications: Arc<NotificationStore>,
    pub payments: Arc<PaymentLedger>,
    /// Centralized event bus for booking events.
    pub event_bus: Arc<EventBus>,
    /// Write-behind persistence queue, exposed for health reporting.
    pub flush: FlushQueue,
}
