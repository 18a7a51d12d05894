//! Runtime configuration loaded from the environment.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::task::schedule::parse_schedule;

pub const DEFAULT_UPSTREAM_URL: &str =
    "https://api-my.sa.gov.ge/api/v1/DrivingLicensePracticalExams2";

/// SMTP settings for the email channel.
#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Minimum spacing between two upstream calls.
    pub min_interval: Duration,
    pub check_interval_minutes: u32,
    /// Cron expression driving the recurring check.
    pub check_schedule: String,
    pub per_subscriber_delay: Duration,
    pub initial_delay: Duration,
    pub upstream_base_url: String,
    pub upstream_timeout: Duration,
    /// Zero disables label caching.
    pub label_cache_ttl: Duration,
    pub store_path: PathBuf,
    /// When set, subscribers live in PostgreSQL instead of `store_path`.
    pub database_url: Option<String>,
    pub database_pool_size: usize,
    pub logs_path: PathBuf,
    pub email: Option<EmailConfig>,
    pub telegram_bot_token: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            min_interval: Duration::from_millis(5000),
            check_interval_minutes: 15,
            check_schedule: interval_schedule(15),
            per_subscriber_delay: Duration::from_millis(2000),
            initial_delay: Duration::from_millis(30000),
            upstream_base_url: DEFAULT_UPSTREAM_URL.to_string(),
            upstream_timeout: Duration::from_millis(10000),
            label_cache_ttl: Duration::ZERO,
            store_path: PathBuf::from("data/subscribers.json"),
            database_url: None,
            database_pool_size: 4,
            logs_path: PathBuf::from("logs"),
            email: None,
            telegram_bot_token: None,
        }
    }

    /// Overrides the defaults with values found in the environment.
    pub fn load(&mut self) -> Result<(), AppError> {
        let min_interval_ms = env_parse("API_DELAY_MS", self.min_interval.as_millis() as u64)?;
        if min_interval_ms == 0 {
            return Err(AppError::invalid_config(
                "API_DELAY_MS",
                min_interval_ms,
                "must be greater than zero",
            ));
        }
        self.min_interval = Duration::from_millis(min_interval_ms);

        self.check_interval_minutes =
            env_parse("CHECK_INTERVAL_MINUTES", self.check_interval_minutes)?;
        if !(1..=59).contains(&self.check_interval_minutes) {
            return Err(AppError::invalid_config(
                "CHECK_INTERVAL_MINUTES",
                self.check_interval_minutes,
                "must be between 1 and 59",
            ));
        }
        self.check_schedule = match env_string("CHECK_SCHEDULE") {
            Some(expr) => expr,
            None => interval_schedule(self.check_interval_minutes),
        };
        parse_schedule(&self.check_schedule).map_err(|e| {
            AppError::invalid_config("CHECK_SCHEDULE", &self.check_schedule, e)
        })?;

        self.per_subscriber_delay = Duration::from_millis(env_parse(
            "PER_SUBSCRIBER_DELAY_MS",
            self.per_subscriber_delay.as_millis() as u64,
        )?);
        self.initial_delay = Duration::from_millis(env_parse(
            "INITIAL_DELAY_MS",
            self.initial_delay.as_millis() as u64,
        )?);

        if let Some(url) = env_string("UPSTREAM_BASE_URL") {
            self.upstream_base_url = url.trim_end_matches('/').to_string();
        }
        let timeout_ms = env_parse(
            "UPSTREAM_TIMEOUT_MS",
            self.upstream_timeout.as_millis() as u64,
        )?;
        if timeout_ms == 0 {
            return Err(AppError::invalid_config(
                "UPSTREAM_TIMEOUT_MS",
                timeout_ms,
                "must be greater than zero",
            ));
        }
        self.upstream_timeout = Duration::from_millis(timeout_ms);
        self.label_cache_ttl = Duration::from_secs(env_parse(
            "LABEL_CACHE_TTL_SECS",
            self.label_cache_ttl.as_secs(),
        )?);

        if let Some(path) = env_string("STORE_PATH") {
            self.store_path = PathBuf::from(path);
        }
        self.database_url = env_string("DATABASE_URL");
        self.database_pool_size = env_parse("DATABASE_POOL_SIZE", self.database_pool_size)?;
        if self.database_pool_size == 0 {
            return Err(AppError::invalid_config(
                "DATABASE_POOL_SIZE",
                self.database_pool_size,
                "must be greater than zero",
            ));
        }
        if let Some(path) = env_string("LOGS_PATH") {
            self.logs_path = PathBuf::from(path);
        }

        self.email = match (env_string("EMAIL_USER"), env_string("EMAIL_PASS")) {
            (Some(username), Some(password)) => Some(EmailConfig {
                smtp_host: env_string("SMTP_HOST").unwrap_or("smtp.gmail.com".to_string()),
                smtp_port: env_parse("SMTP_PORT", 587)?,
                from: env_string("EMAIL_FROM").unwrap_or(username.clone()),
                username,
                password,
            }),
            _ => None,
        };
        self.telegram_bot_token = env_string("TELEGRAM_BOT_TOKEN");

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Cron expression firing every `minutes` minutes.
fn interval_schedule(minutes: u32) -> String {
    format!("*/{minutes} * * * *")
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match env_string(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| AppError::invalid_config(key, &raw, e)),
        None => Ok(default),
    }
}
