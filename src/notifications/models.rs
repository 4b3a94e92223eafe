use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, Type};
use std::fmt;
use uuid::Uuid;

use crate::error::NotificationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SplitInvite,
    SplitAccepted,
    SplitDeclined,
    SplitPaid,
    PaymentReminder,
    FriendRequest,
    General,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::SplitInvite => "split_invite",
            NotificationKind::SplitAccepted => "split_accepted",
            NotificationKind::SplitDeclined => "split_declined",
            NotificationKind::SplitPaid => "split_paid",
            NotificationKind::PaymentReminder => "payment_reminder",
            NotificationKind::FriendRequest => "friend_request",
            NotificationKind::General => "general",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stored notification row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub split_event_id: Option<Uuid>,
    #[serde(default)]
    pub friendship_id: Option<Uuid>,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification to be created. Serializes to the body of the create endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_event_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendship_id: Option<Uuid>,
}

impl NewNotification {
    pub fn new(
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            metadata: None,
            split_event_id: None,
            friendship_id: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_split_event(mut self, split_event_id: Uuid) -> Self {
        self.split_event_id = Some(split_event_id);
        self
    }

    /// Materialize the row with a fresh id, unread
    pub fn into_record(self) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            kind: self.kind,
            title: self.title,
            message: self.message,
            metadata: self.metadata,
            split_event_id: self.split_event_id,
            friendship_id: self.friendship_id,
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// Identity on whose behalf a notification is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// A signed-in user; direct inserts are limited to their own rows
    User(Uuid),
    /// Background jobs and the service itself
    System,
}

impl Actor {
    pub fn may_write_for(&self, recipient: Uuid) -> bool {
        match self {
            Actor::System => true,
            Actor::User(id) => *id == recipient,
        }
    }
}

/// Response shape shared by the create endpoint and `create_notification_v2`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotificationEnvelope {
    pub fn created(notification: Notification) -> Self {
        Self {
            success: true,
            notification: Some(notification),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            notification: None,
            error: Some(error.into()),
        }
    }

    pub fn into_result(self) -> Result<Notification, NotificationError> {
        match (self.success, self.notification) {
            (true, Some(notification)) => Ok(notification),
            (true, None) => Err(NotificationError::bad_response(
                "success reported without a notification",
            )),
            (false, _) => Err(NotificationError::bad_response(
                self.error.unwrap_or_else(|| "success: false".to_string()),
            )),
        }
    }
}

/// Fallback tiers, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryTier {
    Primary,
    Secondary,
    Tertiary,
}

impl fmt::Display for DeliveryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryTier::Primary => "primary",
            DeliveryTier::Secondary => "secondary",
            DeliveryTier::Tertiary => "tertiary",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryErrorKind {
    Unreachable,
    BadResponse,
    Unauthorized,
}

impl fmt::Display for DeliveryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryErrorKind::Unreachable => "unreachable",
            DeliveryErrorKind::BadResponse => "bad_response",
            DeliveryErrorKind::Unauthorized => "unauthorized",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of `NotificationDispatcher::deliver`
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    pub succeeded: bool,
    /// Tier that produced the outcome
    pub tier: DeliveryTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DeliveryErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
}
