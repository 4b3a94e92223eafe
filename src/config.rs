use serde::Deserialize;
use std::time::Duration;

use crate::notifications::push::DEFAULT_PUSH_GATEWAY_URL;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// In-memory stores are used when unset
    pub database_url: Option<String>,
    pub bind_address: String,
    /// Base URL of the backend hosting the notification create endpoint
    pub api_base_url: String,
    /// False when this runtime cannot reach the backend endpoint at all
    pub primary_tier_enabled: bool,
    pub tier_timeout_ms: u64,
    pub push_gateway_url: String,
    /// Local hour (0-23) during which daily reminders go out
    pub reminder_hour: u32,
    pub reminder_tick_secs: u64,
    pub reminder_concurrency: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config = Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            api_base_url: resolve_base_url(
                option_env!("API_BASE_URL"),
                std::env::var("API_BASE_URL").ok(),
            ),
            primary_tier_enabled: parse_var("NOTIFY_PRIMARY_ENABLED", true)?,
            tier_timeout_ms: parse_var("NOTIFY_TIER_TIMEOUT_MS", 2500)?,
            push_gateway_url: std::env::var("PUSH_GATEWAY_URL")
                .unwrap_or_else(|_| DEFAULT_PUSH_GATEWAY_URL.to_string()),
            reminder_hour: parse_var("REMINDER_HOUR", 9)?,
            reminder_tick_secs: parse_var("REMINDER_TICK_SECS", 900)?,
            reminder_concurrency: parse_var("REMINDER_CONCURRENCY", 8)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.reminder_hour > 23 {
            return Err(config::ConfigError::Message(format!(
                "REMINDER_HOUR must be between 0 and 23, got {}",
                self.reminder_hour
            )));
        }
        if self.reminder_tick_secs == 0 || self.reminder_concurrency == 0 {
            return Err(config::ConfigError::Message(
                "REMINDER_TICK_SECS and REMINDER_CONCURRENCY must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn notifications_endpoint(&self) -> String {
        format!("{}/api/notifications/create", self.api_base_url)
    }

    pub fn tier_timeout(&self) -> Duration {
        Duration::from_millis(self.tier_timeout_ms)
    }

    pub fn reminder_tick(&self) -> Duration {
        Duration::from_secs(self.reminder_tick_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_address: "0.0.0.0:8080".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            primary_tier_enabled: true,
            tier_timeout_ms: 2500,
            push_gateway_url: DEFAULT_PUSH_GATEWAY_URL.to_string(),
            reminder_hour: 9,
            reminder_tick_secs: 900,
            reminder_concurrency: 8,
        }
    }
}

/// Build-time value wins over the runtime one; trailing slashes are dropped
pub fn resolve_base_url(build_time: Option<&str>, runtime: Option<String>) -> String {
    build_time
        .map(str::to_string)
        .or(runtime)
        .map(|url| url.trim().trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, config::ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| config::ConfigError::Message(format!("invalid value for {}: {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}
