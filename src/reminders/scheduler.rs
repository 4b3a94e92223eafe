// Reminder Scheduler - daily payment reminders
//
// - A recurring tick checks the local hour
// - First tick inside the reminder hour runs the batch, once per day
// - Per-user dedup against reminders already stored since local midnight
// - Push goes out only after the in-app notification exists

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::clock::{local_midnight, Clock};
use super::digest::{group_obligations, UserDigest};
use crate::config::Config;
use crate::error::{AppResult, ReminderError};
use crate::ledger::LedgerStore;
use crate::notifications::models::{Actor, NotificationKind};
use crate::notifications::push::{PushGateway, PushMessage};
use crate::notifications::{NotificationDispatcher, NotificationStore};

#[derive(Debug, Clone)]
pub struct ReminderScheduleConfig {
    /// Local hour (0-23) during which the batch runs
    pub hour: u32,
    pub tick_interval: Duration,
    /// Users reminded concurrently
    pub concurrency: usize,
}

impl From<&Config> for ReminderScheduleConfig {
    fn from(config: &Config) -> Self {
        Self {
            hour: config.reminder_hour,
            tick_interval: config.reminder_tick(),
            concurrency: config.reminder_concurrency,
        }
    }
}

#[derive(Debug, Default)]
struct ReminderState {
    last_run_date: Option<NaiveDate>,
}

/// Outcome of one reminder batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub users: usize,
    pub delivered: usize,
    /// Already reminded today
    pub skipped: usize,
    pub pushed: usize,
    pub failed: Vec<Uuid>,
}

impl BatchReport {
    pub fn partial_failure(&self) -> Option<ReminderError> {
        if self.failed.is_empty() {
            return None;
        }
        Some(ReminderError::PartialBatchFailure {
            failed: self.failed.len(),
            total: self.users,
            users: self.failed.clone(),
        })
    }
}

enum UserOutcome {
    Delivered { pushed: bool },
    Skipped,
    Failed(Uuid),
}

pub struct ReminderScheduler {
    config: ReminderScheduleConfig,
    ledger: Arc<dyn LedgerStore>,
    notifications: Arc<dyn NotificationStore>,
    dispatcher: Arc<NotificationDispatcher>,
    push: Option<Arc<dyn PushGateway>>,
    clock: Arc<dyn Clock>,
    state: Mutex<ReminderState>,
}

impl ReminderScheduler {
    pub fn new(
        config: ReminderScheduleConfig,
        ledger: Arc<dyn LedgerStore>,
        notifications: Arc<dyn NotificationStore>,
        dispatcher: Arc<NotificationDispatcher>,
        push: Option<Arc<dyn PushGateway>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            ledger,
            notifications,
            dispatcher,
            push,
            clock,
            state: Mutex::new(ReminderState::default()),
        }
    }

    /// Start the reminder loop (runs in background)
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.config.tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(
                "⏰ Reminder scheduler started (hour {:02}:00, tick {:?})",
                self.config.hour, self.config.tick_interval
            );

            loop {
                ticker.tick().await;
                let now = self.clock.now();
                match self.on_tick(now).await {
                    Ok(Some(report)) => {
                        if let Some(partial) = report.partial_failure() {
                            warn!("⚠️ {}", partial);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => error!("❌ Reminder batch failed: {}", e),
                }
            }
        })
    }

    /// Runs the batch on the first tick inside the reminder hour of each day.
    ///
    /// The day is claimed before the batch starts so overlapping ticks cannot
    /// both run it; a batch that fails as a whole gives the claim back.
    pub async fn on_tick(&self, now: DateTime<FixedOffset>) -> AppResult<Option<BatchReport>> {
        if now.hour() != self.config.hour {
            return Ok(None);
        }

        let today = now.date_naive();
        let previous = {
            let mut state = self.state.lock();
            if state.last_run_date == Some(today) {
                debug!("Reminders already ran for {}", today);
                return Ok(None);
            }
            state.last_run_date.replace(today)
        };

        match self.run_batch(now).await {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                let mut state = self.state.lock();
                if state.last_run_date == Some(today) {
                    state.last_run_date = previous;
                }
                Err(e)
            }
        }
    }

    /// Runs the batch now, outside the hour window. Dedup still applies.
    pub async fn run_now(&self) -> AppResult<BatchReport> {
        self.run_batch(self.clock.now()).await
    }

    pub fn last_run_date(&self) -> Option<NaiveDate> {
        self.state.lock().last_run_date
    }

    pub async fn run_batch(&self, now: DateTime<FixedOffset>) -> AppResult<BatchReport> {
        info!("🔄 Starting payment reminder batch");

        let obligations = self.ledger.outstanding_obligations().await?;
        let digests = group_obligations(&obligations);
        let since = local_midnight(now);

        let users = digests.len();

        // Owned digests and a boxed stream keep the spawned loop's future Send
        let outcomes: Vec<UserOutcome> = stream::iter(digests)
            .map(|digest| self.remind_user(digest, since))
            .buffer_unordered(self.config.concurrency.max(1))
            .boxed()
            .collect()
            .await;

        let mut report = BatchReport {
            users,
            ..BatchReport::default()
        };
        for outcome in outcomes {
            match outcome {
                UserOutcome::Delivered { pushed } => {
                    report.delivered += 1;
                    if pushed {
                        report.pushed += 1;
                    }
                }
                UserOutcome::Skipped => report.skipped += 1,
                UserOutcome::Failed(user_id) => report.failed.push(user_id),
            }
        }

        info!(
            "✓ Reminder batch completed: {} users, {} reminded, {} skipped, {} failed",
            report.users,
            report.delivered,
            report.skipped,
            report.failed.len()
        );
        Ok(report)
    }

    async fn remind_user(&self, digest: UserDigest, since: DateTime<Utc>) -> UserOutcome {
        let user_id = digest.user_id;

        match self
            .notifications
            .exists_since(user_id, NotificationKind::PaymentReminder, since)
            .await
        {
            Ok(true) => {
                debug!("{} already reminded today", user_id);
                return UserOutcome::Skipped;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("⚠️ Reminder dedup check failed for {}: {}", user_id, e);
                return UserOutcome::Failed(user_id);
            }
        }

        let notification = digest.to_notification();
        let result = self
            .dispatcher
            .deliver(Actor::System, notification.clone())
            .await;
        if !result.succeeded {
            warn!("⚠️ Reminder for {} was not delivered", user_id);
            return UserOutcome::Failed(user_id);
        }

        let pushed = self
            .push_reminder(user_id, &notification.title, &notification.message)
            .await;
        UserOutcome::Delivered { pushed }
    }

    /// Best effort; failures are logged and never undo the in-app reminder
    async fn push_reminder(&self, user_id: Uuid, title: &str, body: &str) -> bool {
        let Some(gateway) = &self.push else {
            return false;
        };

        let token = match self.notifications.push_token(user_id).await {
            Ok(Some(token)) => token,
            Ok(None) => return false,
            Err(e) => {
                warn!("⚠️ Could not load push token for {}: {}", user_id, e);
                return false;
            }
        };
        let badge = match self.notifications.unread_count(user_id).await {
            Ok(count) => count,
            Err(e) => {
                warn!("⚠️ Could not count unread notifications for {}: {}", user_id, e);
                1
            }
        };

        let message = PushMessage::high_priority(
            token,
            title.to_string(),
            body.to_string(),
            serde_json::json!({ "type": NotificationKind::PaymentReminder }),
            badge,
        );
        match gateway.send(&message).await {
            Ok(()) => true,
            Err(e) => {
                warn!("⚠️ Push reminder for {} failed: {}", user_id, e);
                false
            }
        }
    }
}
