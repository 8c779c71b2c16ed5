use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::risk::Locale;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub alerts: AlertsConfig,
    pub scheduler: SchedulerRuntimeConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let delivery_timeout = seconds_var("ALERTS_DELIVERY_TIMEOUT_SECS", 10)?;
        let locale = match env::var("ALERTS_LOCALE") {
            Ok(raw) => Locale::parse(&raw).ok_or(ConfigError::InvalidLocale(raw))?,
            Err(_) => Locale::En,
        };
        let tick_interval = seconds_var("SCHEDULER_TICK_SECS", 15)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            alerts: AlertsConfig {
                delivery_timeout,
                locale,
            },
            scheduler: SchedulerRuntimeConfig { tick_interval },
        })
    }
}

fn seconds_var(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    let secs = match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::InvalidSeconds { var: name })?,
        Err(_) => default,
    };
    Ok(Duration::from_secs(secs))
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Notification delivery knobs.
#[derive(Debug, Clone)]
pub struct AlertsConfig {
    pub delivery_timeout: Duration,
    pub locale: Locale,
}

/// How often the in-process driver evaluates the delivery schedule. Must stay under a minute.
#[derive(Debug, Clone)]
pub struct SchedulerRuntimeConfig {
    pub tick_interval: Duration,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidSeconds { var: &'static str },
    InvalidLocale(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidSeconds { var } => {
                write!(f, "{var} must be a positive number of seconds")
            }
            ConfigError::InvalidLocale(value) => {
                write!(f, "ALERTS_LOCALE must be 'en' or 'ar', got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidSeconds { .. }
            | ConfigError::InvalidLocale(_) => None,
        }
    }
}
