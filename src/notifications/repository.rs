use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::models::{Actor, NewNotification, Notification, NotificationEnvelope, NotificationKind};
use super::store::NotificationStore;
use crate::error::{AppError, AppResult, NotificationError};

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, type, title, message, metadata, split_event_id, friendship_id, read, created_at";

/// SQLSTATE raised when a row-level security policy rejects a write
const INSUFFICIENT_PRIVILEGE: &str = "42501";

///notification persistence
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn create_via_rpc(&self, notification: &NewNotification) -> AppResult<NotificationEnvelope> {
        let result = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT create_notification_v2($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.metadata)
        .bind(notification.split_event_id)
        .bind(notification.friendship_id)
        .fetch_one(&self.pool)
        .await?;

        serde_json::from_value(result).map_err(|e| {
            AppError::Notification(NotificationError::bad_response(format!(
                "create_notification_v2 returned an unexpected shape: {}",
                e
            )))
        })
    }

    async fn insert_direct(&self, actor: Actor, notification: &NewNotification) -> AppResult<Notification> {
        let mut tx = self.pool.begin().await?;

        // Run the insert under the restricted role so the RLS policy applies
        if let Actor::User(user_id) = actor {
            sqlx::query("SELECT set_config('app.current_user_id', $1, true)")
                .bind(user_id.to_string())
                .execute(&mut *tx)
                .await?;
            sqlx::query("SET LOCAL ROLE authenticated")
                .execute(&mut *tx)
                .await?;
        }

        let record = notification.clone().into_record();
        let inserted = sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (
                id, user_id, type, title, message, metadata, split_event_id, friendship_id, read, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, $9)
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(record.id)
        .bind(record.user_id)
        .bind(record.kind)
        .bind(&record.title)
        .bind(&record.message)
        .bind(&record.metadata)
        .bind(record.split_event_id)
        .bind(record.friendship_id)
        .bind(record.created_at)
        .fetch_one(&mut *tx)
        .await;

        let inserted = match inserted {
            Ok(row) => row,
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(INSUFFICIENT_PRIVILEGE) =>
            {
                debug!("Direct insert rejected by policy: {}", db_err.message());
                return Err(NotificationError::Unauthorized {
                    recipient: notification.user_id,
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;
        Ok(inserted)
    }

    async fn exists_since(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        since: DateTime<Utc>,
    ) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM notifications WHERE user_id = $1 AND type = $2 AND created_at >= $3)",
        )
        .bind(user_id)
        .bind(kind)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(notification_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn push_token(&self, user_id: Uuid) -> AppResult<Option<String>> {
        let token = sqlx::query_scalar::<_, Option<String>>(
            "SELECT push_token FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .flatten();

        Ok(token)
    }
}
