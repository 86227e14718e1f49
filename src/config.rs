use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationMode {
    /// Queue messages for the background worker once state is committed.
    Outbox,
    /// Send messages before responding; a notifier failure fails the request.
    Inline,
}

impl FromStr for NotificationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "outbox" => Ok(NotificationMode::Outbox),
            "inline" => Ok(NotificationMode::Inline),
            other => Err(format!("unknown mode {other}, expected outbox/inline")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown format {other}, expected compact/json")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub mode: NotificationMode,
    pub queue_size: usize,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            mode: NotificationMode::Outbox,
            queue_size: 1024,
            max_attempts: 5,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub allowed_origins: Vec<String>,
    pub static_dir: Option<String>,
    pub notifications: NotificationConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let allowed_origins = ["CLIENT_URL_LOCAL", "CLIENT_URL_PROD"]
            .iter()
            .filter_map(|key| non_empty_var(key))
            .collect();

        let max_attempts: u32 = parse_or_default("NOTIFICATION_MAX_ATTEMPTS", 5)?;
        if max_attempts == 0 {
            return Err(AppError::Internal(
                "invalid NOTIFICATION_MAX_ATTEMPTS: must be > 0".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 5000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_or_default("LOG_FORMAT", LogFormat::Compact)?,
            allowed_origins,
            static_dir: non_empty_var("STATIC_DIR"),
            notifications: NotificationConfig {
                mode: parse_or_default("NOTIFICATION_MODE", NotificationMode::Outbox)?,
                queue_size: parse_or_default("NOTIFICATION_QUEUE_SIZE", 1024)?,
                max_attempts,
                retry_backoff: Duration::from_millis(parse_or_default(
                    "NOTIFICATION_RETRY_BACKOFF_MS",
                    500,
                )?),
            },
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
