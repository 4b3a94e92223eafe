use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::models::{
    Actor, DeliveryErrorKind, DeliveryResult, DeliveryTier, NewNotification, Notification,
};
use super::store::NotificationStore;
use super::tiers::{DirectInsertTier, HttpEndpointTier, RpcTier};
use crate::config::Config;
use crate::error::{AppResult, NotificationError};

/// One way of getting a notification row created
#[async_trait]
pub trait DeliveryStrategy: Send + Sync {
    fn tier(&self) -> DeliveryTier;

    /// Static capability check; unavailable strategies are skipped without an attempt
    fn is_available(&self) -> bool {
        true
    }

    async fn attempt(
        &self,
        actor: Actor,
        notification: &NewNotification,
    ) -> Result<Notification, NotificationError>;
}

/// Linear fallback over an ordered list of strategies.
///
/// Strategies run one at a time, each under its own timeout; the first
/// success wins and nothing after it runs. `deliver` never fails: exhaustion
/// is reported through `DeliveryResult`.
pub struct NotificationDispatcher {
    strategies: Vec<Arc<dyn DeliveryStrategy>>,
    attempt_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(strategies: Vec<Arc<dyn DeliveryStrategy>>, attempt_timeout: Duration) -> Self {
        Self {
            strategies,
            attempt_timeout,
        }
    }

    /// Standard chain: backend endpoint, then RPC, then direct insert
    pub fn from_config(config: &Config, store: Arc<dyn NotificationStore>) -> AppResult<Self> {
        let timeout = config.tier_timeout();
        let primary = HttpEndpointTier::new(
            config.notifications_endpoint(),
            config.primary_tier_enabled,
            timeout,
        )?;

        Ok(Self::new(
            vec![
                Arc::new(primary),
                Arc::new(RpcTier::new(store.clone())),
                Arc::new(DirectInsertTier::new(store)),
            ],
            timeout,
        ))
    }

    pub async fn deliver(&self, actor: Actor, notification: NewNotification) -> DeliveryResult {
        let mut last_tier = DeliveryTier::Primary;
        let mut last_error = DeliveryErrorKind::Unreachable;

        for strategy in &self.strategies {
            let tier = strategy.tier();
            if !strategy.is_available() {
                debug!("Skipping {} delivery tier (not reachable from this runtime)", tier);
                continue;
            }
            last_tier = tier;

            let outcome =
                match tokio::time::timeout(self.attempt_timeout, strategy.attempt(actor, &notification)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(NotificationError::unreachable(format!(
                        "timed out after {:?}",
                        self.attempt_timeout
                    ))),
                };

            match outcome {
                Ok(created) => {
                    info!(
                        "📬 Notification {} ({}) delivered to {} via {} tier",
                        created.id, created.kind, created.user_id, tier
                    );
                    return DeliveryResult {
                        succeeded: true,
                        tier,
                        error: None,
                        notification: Some(created),
                    };
                }
                Err(e) => {
                    warn!("⚠️ {} delivery tier failed: {}", tier, e);
                    last_error = e.kind();
                }
            }
        }

        warn!(
            "❌ Notification {} for {} could not be delivered ({})",
            notification.kind, notification.user_id, last_error
        );
        DeliveryResult {
            succeeded: false,
            tier: last_tier,
            error: Some(last_error),
            notification: None,
        }
    }
}
