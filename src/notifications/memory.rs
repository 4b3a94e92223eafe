use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{Actor, NewNotification, Notification, NotificationEnvelope, NotificationKind};
use super::store::NotificationStore;
use crate::error::{AppResult, NotificationError};

/// In-process notification store with the same authorization rule as the
/// database policy: direct inserts only for the actor's own rows.
#[derive(Default)]
pub struct MemoryNotificationStore {
    notifications: RwLock<Vec<Notification>>,
    push_tokens: RwLock<HashMap<Uuid, String>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_push_token(&self, user_id: Uuid, token: impl Into<String>) {
        self.push_tokens.write().await.insert(user_id, token.into());
    }

    /// Store a fully formed row as is (keeps its id and timestamp)
    pub async fn insert_record(&self, notification: Notification) {
        self.notifications.write().await.push(notification);
    }

    pub async fn all(&self) -> Vec<Notification> {
        self.notifications.read().await.clone()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create_via_rpc(&self, notification: &NewNotification) -> AppResult<NotificationEnvelope> {
        let record = notification.clone().into_record();
        self.notifications.write().await.push(record.clone());
        Ok(NotificationEnvelope::created(record))
    }

    async fn insert_direct(&self, actor: Actor, notification: &NewNotification) -> AppResult<Notification> {
        if !actor.may_write_for(notification.user_id) {
            return Err(NotificationError::Unauthorized {
                recipient: notification.user_id,
            }
            .into());
        }

        let record = notification.clone().into_record();
        self.notifications.write().await.push(record.clone());
        Ok(record)
    }

    async fn exists_since(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        since: DateTime<Utc>,
    ) -> AppResult<bool> {
        Ok(self
            .notifications
            .read()
            .await
            .iter()
            .any(|n| n.user_id == user_id && n.kind == kind && n.created_at >= since))
    }

    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<Notification>> {
        let mut rows: Vec<Notification> = self
            .notifications
            .read()
            .await
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<bool> {
        let mut notifications = self.notifications.write().await;
        match notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user_id == user_id)
        {
            Some(notification) => {
                notification.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        Ok(self
            .notifications
            .read()
            .await
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count() as i64)
    }

    async fn push_token(&self, user_id: Uuid) -> AppResult<Option<String>> {
        Ok(self.push_tokens.read().await.get(&user_id).cloned())
    }
}
