//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! The appointment service publishes one [`BookingEvent::StatusChanged`]
//! per accepted transition (creation included). Notification fan-out and
//! the payment trigger subscribe independently; neither ever re-scans the
//! appointment collection.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use salon_core::appointment::Appointment;
use salon_core::history::StatusChange;
use salon_core::notify::Notification;
use salon_core::payment::Payment;

// ---------------------------------------------------------------------------
// BookingEvent
// ---------------------------------------------------------------------------

/// An accepted transition, with the appointment as it stood right after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub appointment: Appointment,
    pub change: StatusChange,
    /// Index of `change` within `appointment.status_history`. Together with
    /// the appointment id this uniquely identifies the transition.
    pub history_index: usize,
}

impl TransitionEvent {
    /// Build from an appointment whose last history entry is the transition.
    pub fn latest(appointment: Appointment) -> Option<Self> {
        let change = appointment.last_change()?.clone();
        let history_index = appointment.status_history.len() - 1;
        Some(Self {
            appointment,
            change,
            history_index,
        })
    }

    /// Stable identifier for side effects derived from this transition.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.appointment.id, self.history_index)
    }
}

/// A domain event raised by the booking engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BookingEvent {
    StatusChanged(TransitionEvent),
    NotificationCreated(Notification),
    PaymentRequested(Payment),
}

impl BookingEvent {
    /// Dot-separated event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StatusChanged(_) => "appointment.status_changed",
            Self::NotificationCreated(_) => "notification.created",
            Self::PaymentRequested(_) => "payment.requested",
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Shared via `Arc<EventBus>`. Every subscriber independently receives
/// every event published after it subscribed.
pub struct EventBus {
    sender: broadcast::Sender<BookingEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: BookingEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{NaiveDate, NaiveTime};
    use salon_core::appointment::NewAppointment;
    use salon_core::roles::Actor;

    use super::*;

    pub(crate) fn requested() -> Appointment {
        let input = NewAppointment {
            client_id: Some("C1".into()),
            provider_id: Some("P1".into()),
            service_id: Some("S1".into()),
            date: NaiveDate::from_ymd_opt(2024, 9, 16),
            start_time: NaiveTime::from_hms_opt(17, 0, 0),
            duration: Some(30),
            service_amount: 60.0,
            ..Default::default()
        };
        Appointment::request(&Actor::client("C1"), input).unwrap()
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let event = TransitionEvent::latest(requested()).unwrap();
        bus.publish(BookingEvent::StatusChanged(event));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.name(), "appointment.status_changed");
        assert_eq!(e2.name(), "appointment.status_changed");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        let event = TransitionEvent::latest(requested()).unwrap();
        bus.publish(BookingEvent::StatusChanged(event));
    }

    #[test]
    fn latest_points_at_last_history_entry() {
        let appt = requested();
        let id = appt.id.clone();
        let event = TransitionEvent::latest(appt).unwrap();
        assert_eq!(event.history_index, 0);
        assert_eq!(event.change.from_status, None);
        assert_eq!(event.dedup_key(), format!("{id}:0"));
    }

    #[test]
    fn serializes_with_type_tag() {
        let event = BookingEvent::StatusChanged(TransitionEvent::latest(requested()).unwrap());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status_changed");
        assert_eq!(json["data"]["change"]["toStatus"], "requested");
    }
}
