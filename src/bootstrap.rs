use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::{
    api::handler::AppState,
    config::Config,
    error::AppResult,
    ledger::{memory::MemoryLedgerStore, repository::LedgerRepository, Ledger, LedgerStore},
    notifications::{
        memory::MemoryNotificationStore,
        push::{ExpoPushGateway, PushGateway},
        repository::NotificationRepository,
        NotificationDispatcher, NotificationStore,
    },
    reminders::{ReminderScheduleConfig, ReminderScheduler, SystemClock},
};

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    // Storage
    let (ledger_store, notification_store, storage): (
        Arc<dyn LedgerStore>,
        Arc<dyn NotificationStore>,
        &'static str,
    ) = match &config.database_url {
        Some(database_url) => {
            let pool = initialize_database(database_url).await?;
            (
                Arc::new(LedgerRepository::new(pool.clone())),
                Arc::new(NotificationRepository::new(pool)),
                "postgres",
            )
        }
        None => {
            warn!("⚠️  DATABASE_URL not set - using in-memory storage, data is lost on restart");
            (
                Arc::new(MemoryLedgerStore::new()),
                Arc::new(MemoryNotificationStore::new()),
                "memory",
            )
        }
    };

    // Notification delivery
    let dispatcher = Arc::new(NotificationDispatcher::from_config(
        config,
        notification_store.clone(),
    )?);
    if config.primary_tier_enabled {
        info!("✅ Notification dispatcher ready (primary: {})", config.notifications_endpoint());
    } else {
        info!("✅ Notification dispatcher ready (primary tier disabled)");
    }

    let push: Arc<dyn PushGateway> = Arc::new(ExpoPushGateway::new(
        config.push_gateway_url.clone(),
        config.tier_timeout(),
    )?);
    info!("✅ Push gateway configured: {}", config.push_gateway_url);

    // Ledger
    let ledger = Arc::new(Ledger::new(ledger_store.clone(), dispatcher.clone()));
    info!("✅ Ledger initialized");

    // Reminders
    let scheduler = Arc::new(ReminderScheduler::new(
        ReminderScheduleConfig::from(config),
        ledger_store,
        notification_store.clone(),
        dispatcher,
        Some(push),
        Arc::new(SystemClock),
    ));
    scheduler.clone().start();
    info!(
        "✅ Reminder scheduler started (daily at {:02}:00 local)",
        config.reminder_hour
    );

    Ok(AppState {
        ledger,
        notifications: notification_store,
        scheduler,
        storage,
    })
}

async fn initialize_database(database_url: &str) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await?;

    info!("✓ Database pool configured: 20 max connections");

    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("✓ Database initialized");
    Ok(pool)
}
