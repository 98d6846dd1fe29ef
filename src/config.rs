use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tracing::{info, trace};

use crate::health::DEFAULT_ALERT_THRESHOLD;
use crate::monitor::MonitorConfig;

const URLS: &str = "URLS";
const CHECK_INTERVAL: &str = "CHECK_INTERVAL";
const ALERT_THRESHOLD: &str = "ALERT_THRESHOLD";
const REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT";
const METRICS_ADDR: &str = "METRICS_ADDR";
const SMTP_SERVER: &str = "SMTP_SERVER";
const SMTP_PORT: &str = "SMTP_PORT";
const SMTP_USER: &str = "SMTP_USER";
const SMTP_PASS: &str = "SMTP_PASS";
const SMTP_FROM: &str = "SMTP_FROM";
const SMTP_TO: &str = "SMTP_TO";

const DEFAULT_CHECK_INTERVAL_SECS: u64 = 51;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_METRICS_PORT: u16 = 2112;
const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid configuration file '{path}': {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Endpoints to probe, in configured order
    #[serde(default)]
    pub urls: Vec<String>,

    /// Period between the starts of two probe cycles
    #[serde(
        default = "default_check_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub check_interval: Duration,

    /// Consecutive failures needed before a down alert is sent
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: u32,

    /// Upper bound for a single probe request
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub request_timeout: Duration,

    /// Listen address of the `/metrics` endpoint
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: SocketAddr,

    /// Mail delivery for alerts (alerts are only logged without it)
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
    pub from: String,
    pub to: String,
}

fn default_check_interval() -> Duration {
    Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS)
}

fn default_alert_threshold() -> u32 {
    DEFAULT_ALERT_THRESHOLD
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
}

fn default_metrics_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_METRICS_PORT))
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            check_interval: default_check_interval(),
            alert_threshold: default_alert_threshold(),
            request_timeout: default_request_timeout(),
            metrics_addr: default_metrics_addr(),
            smtp: None,
        }
    }
}

impl Config {
    /// Load the configuration from the process environment (after `.env` files)
    pub fn from_env() -> Result<Config, ConfigError> {
        crate::util::load_dotenv();
        Self::from_lookup(crate::util::env_var)
            .and_then(Config::validated)
            .inspect(|config| trace!("loaded config: {config:?}"))
    }

    /// Build a configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(urls) = lookup(URLS) {
            config.urls = split_urls(&urls);
        }
        if let Some(interval) = lookup(CHECK_INTERVAL) {
            config.check_interval = parse_env_duration(CHECK_INTERVAL, &interval)?;
        }
        if let Some(threshold) = lookup(ALERT_THRESHOLD) {
            config.alert_threshold = parse_value(ALERT_THRESHOLD, &threshold)?;
        }
        if let Some(timeout) = lookup(REQUEST_TIMEOUT) {
            config.request_timeout = parse_env_duration(REQUEST_TIMEOUT, &timeout)?;
        }
        if let Some(addr) = lookup(METRICS_ADDR) {
            config.metrics_addr = parse_value(METRICS_ADDR, &addr)?;
        }

        if let Some(server) = lookup(SMTP_SERVER) {
            let port = match lookup(SMTP_PORT) {
                Some(port) => parse_value(SMTP_PORT, &port)?,
                None => DEFAULT_SMTP_PORT,
            };
            config.smtp = Some(SmtpConfig {
                server,
                port,
                user: lookup(SMTP_USER).unwrap_or_default(),
                pass: lookup(SMTP_PASS).unwrap_or_default(),
                from: lookup(SMTP_FROM).unwrap_or_default(),
                to: lookup(SMTP_TO).unwrap_or_default(),
            });
        }

        Ok(config)
    }

    /// Reject values the monitoring loop cannot run with
    pub fn validated(self) -> Result<Config, ConfigError> {
        if self.check_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "check interval",
                value: format!("{:?}", self.check_interval),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "request timeout",
                value: format!("{:?}", self.request_timeout),
            });
        }
        Ok(self)
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            urls: self.urls.clone(),
            check_interval: self.check_interval,
            alert_threshold: self.alert_threshold,
        }
    }

    /// Log the loaded configuration without credentials
    pub fn log_summary(&self) {
        info!("loaded configuration:");
        info!("  urls: {:?}", self.urls);
        info!("  check interval: {:?}", self.check_interval);
        info!("  alert threshold: {}", self.alert_threshold);
        info!("  request timeout: {:?}", self.request_timeout);
        info!("  metrics address: {}", self.metrics_addr);
        match &self.smtp {
            Some(smtp) => {
                info!("  smtp server: {}:{}", smtp.server, smtp.port);
                info!("  smtp user: {}", smtp.user);
                info!("  smtp from: {}", smtp.from);
                info!("  smtp to: {}", smtp.to);
            }
            None => info!("  smtp: disabled"),
        }
    }
}

pub fn read_config_file(path: &str) -> Result<Config, ConfigError> {
    let file_content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str::<Config>(&file_content)
        .map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
        .and_then(Config::validated)
        .inspect(|config| trace!("loaded config: {config:?}"))
}

fn split_urls(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(String::from)
        .collect()
}

fn parse_value<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}

fn parse_env_duration(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).ok_or_else(|| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}

/// Parse `42` (seconds) or unit-suffixed values such as `500ms`, `42s`, `5m`, `1h30m`
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let mut rest = value;
    let mut total = Duration::ZERO;
    if rest.is_empty() {
        return None;
    }

    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let amount: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(amount),
            "s" => Duration::from_secs(amount),
            "m" => Duration::from_secs(amount.checked_mul(60)?),
            "h" => Duration::from_secs(amount.checked_mul(3600)?),
            _ => return None,
        };
        rest = &rest[unit_len..];
        total = total.checked_add(part)?;
    }

    Some(total)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DurationValue {
    Seconds(u64),
    Text(String),
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match DurationValue::deserialize(deserializer)? {
        DurationValue::Seconds(secs) => Ok(Duration::from_secs(secs)),
        DurationValue::Text(text) => parse_duration(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration '{text}'"))),
    }
}
