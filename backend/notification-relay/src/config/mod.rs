use crate::error::AppError;
use crate::websocket::DEFAULT_QUEUE_CAPACITY;
use dotenvy::dotenv;
use notification_channel::ChannelPublisher;
use resilience::RetryConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub app: AppConfig,
    pub redis: RedisConfig,
    pub startup: StartupConfig,
    pub websocket: WebSocketConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Budget for in-flight HTTP requests once draining starts
    pub shutdown_timeout: Duration,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedisConfig {
    pub url: String,
    /// Pub/Sub channel shared by the publisher and the subscriber
    pub channel: String,
}

/// Retry policy applied to each startup connection phase
#[derive(Debug, Clone, PartialEq)]
pub struct StartupConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebSocketConfig {
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
    /// Frames a listener may fall behind before it is disconnected
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::Config(format!(
                "LOG_FORMAT must be 'text' or 'json', got '{other}'"
            ))),
        }
    }
}

impl StartupConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_backoff: self.initial_backoff,
            max_backoff: self.max_backoff,
            ..Default::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            app: AppConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                shutdown_timeout: Duration::from_secs(10),
                log_format: LogFormat::Text,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                channel: ChannelPublisher::DEFAULT_CHANNEL.to_string(),
            },
            startup: StartupConfig {
                max_retries: 0,
                initial_backoff: Duration::from_millis(200),
                max_backoff: Duration::from_millis(5000),
            },
            websocket: WebSocketConfig {
                heartbeat_interval: Duration::from_secs(5),
                client_timeout: Duration::from_secs(30),
                queue_capacity: DEFAULT_QUEUE_CAPACITY,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let config = Config {
            app: AppConfig {
                host: lookup("HOST").unwrap_or(defaults.app.host),
                port: parse_or(&lookup, "PORT", defaults.app.port)?,
                shutdown_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "SHUTDOWN_TIMEOUT_SECS",
                    defaults.app.shutdown_timeout.as_secs(),
                )?),
                log_format: match lookup("LOG_FORMAT") {
                    Some(value) => value.parse()?,
                    None => defaults.app.log_format,
                },
            },
            redis: RedisConfig {
                url: lookup("REDIS_URL").unwrap_or(defaults.redis.url),
                channel: lookup("NOTIFICATION_CHANNEL").unwrap_or(defaults.redis.channel),
            },
            startup: StartupConfig {
                max_retries: parse_or(&lookup, "STARTUP_MAX_RETRIES", defaults.startup.max_retries)?,
                initial_backoff: Duration::from_millis(parse_or(
                    &lookup,
                    "STARTUP_INITIAL_BACKOFF_MS",
                    defaults.startup.initial_backoff.as_millis() as u64,
                )?),
                max_backoff: Duration::from_millis(parse_or(
                    &lookup,
                    "STARTUP_MAX_BACKOFF_MS",
                    defaults.startup.max_backoff.as_millis() as u64,
                )?),
            },
            websocket: WebSocketConfig {
                heartbeat_interval: Duration::from_secs(parse_or(
                    &lookup,
                    "WS_HEARTBEAT_INTERVAL_SECS",
                    defaults.websocket.heartbeat_interval.as_secs(),
                )?),
                client_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "WS_CLIENT_TIMEOUT_SECS",
                    defaults.websocket.client_timeout.as_secs(),
                )?),
                queue_capacity: parse_or(
                    &lookup,
                    "WS_LISTENER_QUEUE_CAPACITY",
                    defaults.websocket.queue_capacity,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.redis.channel.trim().is_empty() {
            return Err(AppError::Config("NOTIFICATION_CHANNEL must not be empty".into()));
        }
        if self.redis.url.trim().is_empty() {
            return Err(AppError::Config("REDIS_URL must not be empty".into()));
        }
        if self.websocket.heartbeat_interval.is_zero() {
            return Err(AppError::Config(
                "WS_HEARTBEAT_INTERVAL_SECS must be greater than 0".into(),
            ));
        }
        if self.websocket.client_timeout <= self.websocket.heartbeat_interval {
            return Err(AppError::Config(
                "WS_CLIENT_TIMEOUT_SECS must exceed WS_HEARTBEAT_INTERVAL_SECS".into(),
            ));
        }
        if self.websocket.queue_capacity == 0 {
            return Err(AppError::Config(
                "WS_LISTENER_QUEUE_CAPACITY must be greater than 0".into(),
            ));
        }
        if self.startup.max_backoff < self.startup.initial_backoff {
            return Err(AppError::Config(
                "STARTUP_MAX_BACKOFF_MS must be >= STARTUP_INITIAL_BACKOFF_MS".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key}: invalid value '{raw}': {e}"))),
        None => Ok(default),
    }
}
