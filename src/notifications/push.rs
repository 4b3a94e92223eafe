// Push delivery through an external gateway (Expo push service by default).
// Fire-and-forget from the core's point of view: callers log failures and move on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::error::{AppResult, NotificationError};

pub const DEFAULT_PUSH_GATEWAY_URL: &str = "https://exp.host/--/api/v2/push/send";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    /// Always carries a `type` key
    pub data: serde_json::Value,
    pub priority: String,
    pub badge: i64,
}

impl PushMessage {
    pub fn high_priority(
        to: String,
        title: String,
        body: String,
        data: serde_json::Value,
        badge: i64,
    ) -> Self {
        Self {
            to,
            title,
            body,
            data,
            priority: "high".to_string(),
            badge,
        }
    }
}

#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(&self, message: &PushMessage) -> AppResult<()>;
}

/// HTTP client for an Expo-compatible push gateway
pub struct ExpoPushGateway {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ExpoTicket {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExpoResponse {
    data: ExpoTicket,
}

impl ExpoPushGateway {
    pub fn new(endpoint: String, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl PushGateway for ExpoPushGateway {
    async fn send(&self, message: &PushMessage) -> AppResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(message)
            .send()
            .await
            .map_err(|e| NotificationError::Push(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(NotificationError::Push(format!("gateway error: {}", error_text)).into());
        }

        let result: ExpoResponse = response
            .json()
            .await
            .map_err(|e| NotificationError::Push(format!("unexpected gateway response: {}", e)))?;

        if result.data.status != "ok" {
            return Err(NotificationError::Push(
                result
                    .data
                    .message
                    .unwrap_or_else(|| format!("ticket status {}", result.data.status)),
            )
            .into());
        }

        info!("🔔 Push notification sent");
        Ok(())
    }
}
