// The three delivery strategies behind NotificationDispatcher.
//
// Primary: POST to the backend create endpoint
// Secondary: create_notification_v2 on the datastore (elevated privilege)
// Tertiary: direct insert with the actor's own credentials

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

use super::dispatcher::DeliveryStrategy;
use super::models::{Actor, DeliveryTier, NewNotification, Notification, NotificationEnvelope};
use super::store::NotificationStore;
use crate::error::{AppError, AppResult, NotificationError};

pub struct HttpEndpointTier {
    endpoint: String,
    /// Static capability flag, false when this runtime cannot reach the backend
    reachable: bool,
    client: reqwest::Client,
}

impl HttpEndpointTier {
    pub fn new(endpoint: String, reachable: bool, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint,
            reachable,
            client,
        })
    }
}

/// HTML instead of JSON usually means the request hit the wrong host
fn looks_like_html(content_type: &str, body: &str) -> bool {
    content_type.contains("text/html") || body.trim_start().starts_with('<')
}

#[async_trait]
impl DeliveryStrategy for HttpEndpointTier {
    fn tier(&self) -> DeliveryTier {
        DeliveryTier::Primary
    }

    fn is_available(&self) -> bool {
        self.reachable
    }

    async fn attempt(
        &self,
        _actor: Actor,
        notification: &NewNotification,
    ) -> Result<Notification, NotificationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(notification)
            .send()
            .await
            .map_err(|e| NotificationError::unreachable(e.to_string()))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| NotificationError::unreachable(e.to_string()))?;

        if looks_like_html(&content_type, &body) {
            return Err(NotificationError::bad_response(format!(
                "endpoint answered with HTML (status {})",
                status
            )));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(NotificationError::Unauthorized {
                recipient: notification.user_id,
            });
        }
        if !status.is_success() {
            return Err(NotificationError::bad_response(format!(
                "endpoint answered with status {}",
                status
            )));
        }

        let envelope: NotificationEnvelope = serde_json::from_str(&body)
            .map_err(|e| NotificationError::bad_response(format!("non-JSON body: {}", e)))?;
        envelope.into_result()
    }
}

pub struct RpcTier {
    store: Arc<dyn NotificationStore>,
}

impl RpcTier {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DeliveryStrategy for RpcTier {
    fn tier(&self) -> DeliveryTier {
        DeliveryTier::Secondary
    }

    async fn attempt(
        &self,
        _actor: Actor,
        notification: &NewNotification,
    ) -> Result<Notification, NotificationError> {
        self.store
            .create_via_rpc(notification)
            .await
            .map_err(into_delivery_error)?
            .into_result()
    }
}

pub struct DirectInsertTier {
    store: Arc<dyn NotificationStore>,
}

impl DirectInsertTier {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DeliveryStrategy for DirectInsertTier {
    fn tier(&self) -> DeliveryTier {
        DeliveryTier::Tertiary
    }

    async fn attempt(
        &self,
        actor: Actor,
        notification: &NewNotification,
    ) -> Result<Notification, NotificationError> {
        self.store
            .insert_direct(actor, notification)
            .await
            .map_err(into_delivery_error)
    }
}

fn into_delivery_error(error: AppError) -> NotificationError {
    match error {
        AppError::Notification(inner) => inner,
        other => NotificationError::unreachable(other.to_string()),
    }
}
