use chrono::NaiveTime;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

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
    pub feed: FeedConfig,
    pub schedule: ScheduleConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let source_url = env::var("FEED_SOURCE_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let output_path = PathBuf::from(
            env::var("FEED_OUTPUT_PATH").unwrap_or_else(|_| "avito_feed.xml".to_string()),
        );
        let overrides_path = PathBuf::from(
            env::var("FEED_OVERRIDES_PATH").unwrap_or_else(|_| "jk_settings.json".to_string()),
        );
        let fetch_timeout_secs = env::var("FEED_FETCH_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout)?;

        let auto_update = match env::var("FEED_AUTO_UPDATE") {
            Ok(value) => parse_flag(&value).ok_or(ConfigError::InvalidFlag {
                name: "FEED_AUTO_UPDATE",
                value,
            })?,
            Err(_) => false,
        };
        let raw_time = env::var("FEED_UPDATE_TIME").unwrap_or_else(|_| "06:00".to_string());
        let update_time = NaiveTime::parse_from_str(raw_time.trim(), "%H:%M")
            .map_err(|_| ConfigError::InvalidUpdateTime { value: raw_time })?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            feed: FeedConfig {
                source_url,
                output_path,
                overrides_path,
                fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            },
            schedule: ScheduleConfig {
                auto_update,
                update_time,
            },
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
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

/// Where the source feed comes from and where converted artifacts land.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub source_url: Option<String>,
    pub output_path: PathBuf,
    pub overrides_path: PathBuf,
    pub fetch_timeout: Duration,
}

/// Daily refresh settings consumed by the scheduler collaborator.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub auto_update: bool,
    pub update_time: NaiveTime,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout,
    InvalidFlag { name: &'static str, value: String },
    InvalidUpdateTime { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "FEED_FETCH_TIMEOUT_SECS must be a whole number of seconds")
            }
            ConfigError::InvalidFlag { name, value } => {
                write!(f, "{name} must be true or false, got '{value}'")
            }
            ConfigError::InvalidUpdateTime { value } => {
                write!(f, "FEED_UPDATE_TIME must be HH:MM, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
