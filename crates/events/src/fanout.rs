//! Turns accepted transitions into user notifications.
//!
//! [`NotificationFanout`] subscribes to the [`EventBus`] and reacts to each
//! [`BookingEvent::StatusChanged`] with the drafts produced by
//! [`notifications_for_transition`]. It never reads the appointment
//! collection; everything it needs travels on the event.

use std::sync::{Arc, Weak};

use tokio::sync::broadcast;
use salon_core::notify::{notifications_for_transition, Notification};

use crate::bus::{BookingEvent, EventBus, TransitionEvent};
use crate::notifications::NotificationStore;

pub struct NotificationFanout {
    store: Arc<NotificationStore>,
    /// Held weakly: `run` ends once every owner has dropped the bus.
    bus: Weak<EventBus>,
}

impl NotificationFanout {
    pub fn new(store: Arc<NotificationStore>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            bus: Arc::downgrade(&bus),
        }
    }

    /// Run the fan-out loop until the bus is closed.
    pub async fn run(self, mut receiver: broadcast::Receiver<BookingEvent>) {
        loop {
            match receiver.recv().await {
                Ok(BookingEvent::StatusChanged(event)) => {
                    self.handle(&event).await;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification fan-out lagged, events were missed");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification fan-out shutting down");
                    break;
                }
            }
        }
    }

    /// Create and announce the notifications for one transition.
    pub async fn handle(&self, event: &TransitionEvent) -> Vec<Notification> {
        let drafts = notifications_for_transition(
            event.change.from_status,
            event.change.to_status,
            &event.appointment,
            event.change.reason.as_deref(),
        );

        let created = self.store.insert_drafts(&event.dedup_key(), drafts).await;
        if !created.is_empty() {
            tracing::info!(
                appointment_id = %event.appointment.id,
                to = %event.change.to_status,
                count = created.len(),
                "Notifications created"
            );
        }
        if let Some(bus) = self.bus.upgrade() {
            for notification in &created {
                bus.publish(BookingEvent::NotificationCreated(notification.clone()));
            }
        }
        created
    }
}

#[cfg(test)]
mod tests {
    use salon_core::appointment::TransitionExtras;
    use salon_core::history::create_status_change;
    use salon_core::notify::NotificationType;
    use salon_core::permissions::Action;
    use salon_core::roles::Role;
    use salon_core::status::AppointmentStatus;
    use salon_db::MemoryStore;

    use super::*;
    use crate::bus::tests::requested;
    use crate::flush::{FlushConfig, FlushQueue};

    fn fanout() -> (NotificationFanout, Arc<NotificationStore>, Arc<EventBus>) {
        let (flush, _handle) =
            FlushQueue::spawn(Arc::new(MemoryStore::new()), FlushConfig::default());
        let store = Arc::new(NotificationStore::new(flush));
        let bus = Arc::new(EventBus::default());
        (
            NotificationFanout::new(store.clone(), bus.clone()),
            store,
            bus,
        )
    }

    fn cancelled_event() -> TransitionEvent {
        let mut appt = requested();
        let change = create_status_change(
            &appt.id,
            Some(AppointmentStatus::Requested),
            AppointmentStatus::Cancelled,
            "C1",
            Role::Client,
            Action::Cancel,
            Some("client no longer needs".into()),
            None,
        );
        appt.apply_transition(change, None, TransitionExtras::default());
        TransitionEvent::latest(appt).unwrap()
    }

    #[tokio::test]
    async fn creation_notifies_provider() {
        let (fanout, store, _) = fanout();
        let event = TransitionEvent::latest(requested()).unwrap();

        let created = fanout.handle(&event).await;

        assert_eq!(created.len(), 1);
        assert_eq!(created[0].user_id, "P1");
        assert_eq!(created[0].notification_type, NotificationType::AppointmentRequested);
        assert_eq!(store.unread_count("P1").await, 1);
    }

    #[tokio::test]
    async fn cancellation_reaches_both_parties_once() {
        let (fanout, store, _) = fanout();
        let event = cancelled_event();

        fanout.handle(&event).await;
        fanout.handle(&event).await;

        for user in ["C1", "P1"] {
            let list = store.list_for_user(user, false).await;
            assert_eq!(list.len(), 1, "{user}");
            assert!(list[0].message.contains("client no longer needs"));
        }
    }

    #[tokio::test]
    async fn created_notifications_are_published() {
        let (fanout, _, bus) = fanout();
        let mut rx = bus.subscribe();

        fanout.handle(&cancelled_event()).await;

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name());
        }
        assert_eq!(names, vec!["notification.created", "notification.created"]);
    }

    #[tokio::test]
    async fn run_loop_consumes_bus_events() {
        let (fanout, store, bus) = fanout();
        let handle = tokio::spawn(fanout.run(bus.subscribe()));

        bus.publish(BookingEvent::StatusChanged(
            TransitionEvent::latest(requested()).unwrap(),
        ));

        for _ in 0..50 {
            if store.unread_count("P1").await == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(store.unread_count("P1").await, 1);
        handle.abort();
    }
}
