use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::models::{Actor, NewNotification, Notification, NotificationEnvelope, NotificationKind};
use crate::error::AppResult;

/// Persistence seam for notification rows and the profile data delivery needs
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Server-side insert through `create_notification_v2` (elevated privilege)
    async fn create_via_rpc(&self, notification: &NewNotification) -> AppResult<NotificationEnvelope>;

    /// Plain insert under the actor's own credentials.
    /// Fails with `NotificationError::Unauthorized` when the actor may not
    /// write rows for the recipient.
    async fn insert_direct(&self, actor: Actor, notification: &NewNotification) -> AppResult<Notification>;

    /// Whether `user_id` already has a notification of `kind` created at or after `since`
    async fn exists_since(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        since: DateTime<Utc>,
    ) -> AppResult<bool>;

    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<Notification>>;

    /// Returns false when no such notification belongs to the user
    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<bool>;

    async fn unread_count(&self, user_id: Uuid) -> AppResult<i64>;

    async fn push_token(&self, user_id: Uuid) -> AppResult<Option<String>>;
}
