//! In-memory notification store with write-behind persistence.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use salon_core::error::CoreError;
use salon_core::notify::{Notification, NotificationDraft};
use salon_db::{keys, load_with_timeout, KeyValueStore};

use crate::flush::FlushQueue;

#[derive(Default)]
struct Inner {
    items: Vec<Notification>,
    /// Keys of side effects already materialised, so a replayed event never
    /// produces a second copy.
    seen: HashSet<String>,
}

/// Owns every notification. Only `read` flags change after insertion.
pub struct NotificationStore {
    inner: RwLock<Inner>,
    flush: FlushQueue,
}

impl NotificationStore {
    pub fn new(flush: FlushQueue) -> Self {
        Self::with_items(flush, Vec::new())
    }

    /// Keys already handled are recovered from the items' `dedup_key`.
    pub fn with_items(flush: FlushQueue, items: Vec<Notification>) -> Self {
        let seen = items.iter().filter_map(|n| n.dedup_key.clone()).collect();
        Self {
            inner: RwLock::new(Inner { items, seen }),
            flush,
        }
    }

    /// Restore from storage; an unreachable or malformed snapshot starts empty.
    pub async fn load(store: &dyn KeyValueStore, deadline: Duration, flush: FlushQueue) -> Self {
        let items = match load_with_timeout::<Vec<Notification>>(store, keys::NOTIFICATIONS, deadline)
            .await
        {
            Ok(Some(items)) => {
                tracing::info!(count = items.len(), "Loaded notifications");
                items
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not load notifications, starting empty");
                Vec::new()
            }
        };
        Self::with_items(flush, items)
    }

    /// Materialise `drafts` unless `dedup_key` was already handled.
    ///
    /// Returns the notifications actually created.
    pub async fn insert_drafts(
        &self,
        dedup_key: &str,
        drafts: Vec<NotificationDraft>,
    ) -> Vec<Notification> {
        let mut inner = self.inner.write().await;
        if !inner.seen.insert(dedup_key.to_owned()) {
            tracing::debug!(dedup_key, "Notifications already created for event");
            return Vec::new();
        }
        if drafts.is_empty() {
            return Vec::new();
        }

        let now = Utc::now();
        let created: Vec<Notification> = drafts
            .into_iter()
            .map(|d| Notification::from_draft(d, now).with_dedup_key(dedup_key))
            .collect();
        inner.items.extend(created.iter().cloned());
        self.flush.enqueue_json(keys::NOTIFICATIONS, &inner.items);
        created
    }

    /// A user's notifications, newest first.
    pub async fn list_for_user(&self, user_id: &str, unread_only: bool) -> Vec<Notification> {
        let inner = self.inner.read().await;
        let mut out: Vec<Notification> = inner
            .items
            .iter()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.read))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    pub async fn unread_count(&self, user_id: &str) -> usize {
        let inner = self.inner.read().await;
        inner
            .items
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count()
    }

    /// Mark one of `user_id`'s notifications as read.
    ///
    /// Another user's notification is reported as not found.
    pub async fn mark_read(&self, id: &str, user_id: &str) -> Result<Notification, CoreError> {
        let mut inner = self.inner.write().await;
        let notification = inner
            .items
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "Notification",
                id: id.to_owned(),
            })?;

        let changed = !notification.read;
        notification.read = true;
        let updated = notification.clone();
        if changed {
            self.flush.enqueue_json(keys::NOTIFICATIONS, &inner.items);
        }
        Ok(updated)
    }

    /// Mark all of `user_id`'s notifications as read; returns how many changed.
    pub async fn mark_all_read(&self, user_id: &str) -> usize {
        let mut inner = self.inner.write().await;
        let mut changed = 0;
        for n in inner.items.iter_mut().filter(|n| n.user_id == user_id && !n.read) {
            n.read = true;
            changed += 1;
        }
        if changed > 0 {
            self.flush.enqueue_json(keys::NOTIFICATIONS, &inner.items);
        }
        changed
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use salon_core::notify::NotificationType;
    use salon_db::MemoryStore;

    use super::*;
    use crate::flush::FlushConfig;

    fn draft(user: &str) -> NotificationDraft {
        NotificationDraft {
            user_id: user.into(),
            notification_type: NotificationType::AppointmentConfirmed,
            title: "Appointment Confirmed".into(),
            message: "Your appointment has been confirmed.".into(),
            appointment_id: Some("A1".into()),
        }
    }

    fn store() -> (NotificationStore, Arc<MemoryStore>, FlushQueue) {
        let kv = Arc::new(MemoryStore::new());
        let (flush, _handle) = FlushQueue::spawn(kv.clone(), FlushConfig::default());
        (NotificationStore::new(flush.clone()), kv, flush)
    }

    #[tokio::test]
    async fn duplicate_event_key_is_ignored() {
        let (notifications, _, _) = store();
        let first = notifications.insert_drafts("A1:1", vec![draft("C1")]).await;
        let second = notifications.insert_drafts("A1:1", vec![draft("C1")]).await;
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(notifications.len().await, 1);
    }

    #[tokio::test]
    async fn read_flags_are_per_user() {
        let (notifications, _, _) = store();
        notifications
            .insert_drafts("A1:1", vec![draft("C1"), draft("P1"), draft("C1")])
            .await;

        assert_eq!(notifications.unread_count("C1").await, 2);
        let id = notifications.list_for_user("C1", false).await[0].id.clone();

        assert_matches!(
            notifications.mark_read(&id, "P1").await,
            Err(CoreError::NotFound { .. })
        );
        let read = notifications.mark_read(&id, "C1").await.unwrap();
        assert!(read.read);
        assert_eq!(notifications.unread_count("C1").await, 1);
        assert_eq!(notifications.list_for_user("C1", true).await.len(), 1);

        assert_eq!(notifications.mark_all_read("C1").await, 1);
        assert_eq!(notifications.unread_count("C1").await, 0);
        assert_eq!(notifications.unread_count("P1").await, 1);
    }

    #[tokio::test]
    async fn changes_are_persisted_and_reloaded() {
        let (notifications, kv, flush) = store();
        notifications.insert_drafts("A1:1", vec![draft("C1")]).await;
        flush.flush().await;

        let reloaded =
            NotificationStore::load(kv.as_ref(), Duration::from_millis(150), flush).await;
        assert_eq!(reloaded.list_for_user("C1", false).await.len(), 1);
    }

    #[tokio::test]
    async fn handled_keys_survive_reload() {
        let (notifications, kv, flush) = store();
        notifications.insert_drafts("A1:1", vec![draft("C1")]).await;
        flush.flush().await;

        let reloaded =
            NotificationStore::load(kv.as_ref(), Duration::from_millis(150), flush).await;
        let again = reloaded.insert_drafts("A1:1", vec![draft("C1")]).await;

        assert!(again.is_empty());
        assert_eq!(reloaded.len().await, 1);
    }
}
