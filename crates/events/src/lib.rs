//! Event bus and side-effect services for the booking engine.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`BookingEvent`]: the domain event envelope.
//! - [`FlushQueue`]: ordered, retrying write-behind persistence.
//! - [`NotificationFanout`]: turns transitions into notifications.
//! - [`PaymentTrigger`]: requests a payment for each completed appointment.
//! - [`ReminderScheduler`]: periodic appointment reminders.

pub mod bus;
pub mod fanout;
pub mod flush;
pub mod notifications;
pub mod payments;
pub mod reminders;

pub use bus::{BookingEvent, EventBus, TransitionEvent};
pub use fanout::NotificationFanout;
pub use flush::{FlushConfig, FlushQueue};
pub use notifications::NotificationStore;
pub use payments::{PaymentError, PaymentLedger, PaymentRequester, PaymentTrigger};
pub use reminders::{AppointmentSource, ReminderScheduler};
