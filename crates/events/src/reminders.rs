//! Appointment reminder scheduler.
//!
//! [`ReminderScheduler`] runs as a background task. On every tick it takes a
//! snapshot of the appointments and creates one `appointment_reminder`
//! notification for each confirmed appointment starting within the lead
//! window. Reminders are keyed per slot, so a tick never repeats one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use tokio_util::sync::CancellationToken;
use salon_core::appointment::Appointment;
use salon_core::notify::{reminder_for, reminder_key};

use crate::bus::{BookingEvent, EventBus};
use crate::notifications::NotificationStore;

/// Default gap between reminder checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(300);

/// Default distance ahead of an appointment at which the reminder is sent.
pub const DEFAULT_LEAD: Duration = Duration::from_secs(24 * 3600);

/// Read access to the current appointments.
#[async_trait]
pub trait AppointmentSource: Send + Sync {
    async fn snapshot(&self) -> Vec<Appointment>;
}

// ---------------------------------------------------------------------------
// ReminderScheduler
// ---------------------------------------------------------------------------

pub struct ReminderScheduler {
    source: Arc<dyn AppointmentSource>,
    notifications: Arc<NotificationStore>,
    bus: Arc<EventBus>,
    interval: Duration,
    lead: chrono::Duration,
}

impl ReminderScheduler {
    pub fn new(
        source: Arc<dyn AppointmentSource>,
        notifications: Arc<NotificationStore>,
        bus: Arc<EventBus>,
        interval: Duration,
        lead: Duration,
    ) -> Self {
        Self {
            source,
            notifications,
            bus,
            interval,
            lead: chrono::Duration::from_std(lead).unwrap_or_else(|_| chrono::Duration::days(1)),
        }
    }

    /// Run the scheduler loop until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Reminder scheduler cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let sent = self.send_due(Utc::now().naive_utc()).await;
                    if sent > 0 {
                        tracing::info!(count = sent, "Appointment reminders sent");
                    }
                }
            }
        }
    }

    /// Create reminders due at `now`; returns how many were created.
    pub async fn send_due(&self, now: NaiveDateTime) -> usize {
        let mut sent = 0;
        for appt in self.source.snapshot().await {
            let Some(draft) = reminder_for(&appt, now, self.lead) else {
                continue;
            };
            let created = self
                .notifications
                .insert_drafts(&reminder_key(&appt), vec![draft])
                .await;
            for notification in created {
                tracing::debug!(appointment_id = %appt.id, "Reminder created");
                self.bus
                    .publish(BookingEvent::NotificationCreated(notification));
                sent += 1;
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use salon_core::notify::NotificationType;
    use salon_core::status::AppointmentStatus;
    use salon_db::MemoryStore;

    use super::*;
    use crate::bus::tests::requested;
    use crate::flush::{FlushConfig, FlushQueue};

    struct Fixed(Vec<Appointment>);

    #[async_trait]
    impl AppointmentSource for Fixed {
        async fn snapshot(&self) -> Vec<Appointment> {
            self.0.clone()
        }
    }

    fn scheduler(appointments: Vec<Appointment>) -> (ReminderScheduler, Arc<NotificationStore>) {
        let (flush, _handle) =
            FlushQueue::spawn(Arc::new(MemoryStore::new()), FlushConfig::default());
        let notifications = Arc::new(NotificationStore::new(flush));
        let scheduler = ReminderScheduler::new(
            Arc::new(Fixed(appointments)),
            notifications.clone(),
            Arc::new(EventBus::default()),
            DEFAULT_CHECK_INTERVAL,
            DEFAULT_LEAD,
        );
        (scheduler, notifications)
    }

    fn morning_of_slot() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, 16)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn reminds_confirmed_clients_once() {
        let mut confirmed = requested();
        confirmed.status = AppointmentStatus::Confirmed;
        let (scheduler, notifications) = scheduler(vec![confirmed, requested()]);

        assert_eq!(scheduler.send_due(morning_of_slot()).await, 1);
        assert_eq!(scheduler.send_due(morning_of_slot()).await, 0);

        let list = notifications.list_for_user("C1", false).await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].notification_type, NotificationType::AppointmentReminder);
    }

    #[tokio::test]
    async fn restart_does_not_repeat_reminders() {
        let mut confirmed = requested();
        confirmed.status = AppointmentStatus::Confirmed;
        let kv = Arc::new(MemoryStore::new());
        let (flush, _handle) = FlushQueue::spawn(kv.clone(), FlushConfig::default());
        let bus = Arc::new(EventBus::default());
        let source: Arc<dyn AppointmentSource> = Arc::new(Fixed(vec![confirmed]));

        let before = ReminderScheduler::new(
            source.clone(),
            Arc::new(NotificationStore::new(flush.clone())),
            bus.clone(),
            DEFAULT_CHECK_INTERVAL,
            DEFAULT_LEAD,
        );
        assert_eq!(before.send_due(morning_of_slot()).await, 1);
        flush.flush().await;

        let reloaded = Arc::new(
            NotificationStore::load(kv.as_ref(), Duration::from_millis(150), flush).await,
        );
        let after = ReminderScheduler::new(
            source,
            reloaded.clone(),
            bus,
            DEFAULT_CHECK_INTERVAL,
            DEFAULT_LEAD,
        );

        assert_eq!(after.send_due(morning_of_slot()).await, 0);
        assert_eq!(reloaded.list_for_user("C1", false).await.len(), 1);
    }

    #[tokio::test]
    async fn cancelled_token_stops_loop() {
        let (scheduler, _) = scheduler(Vec::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        scheduler.run(cancel).await;
    }
}
