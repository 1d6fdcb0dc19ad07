//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::Currency;
use saga::{PaymentMode, SagaConfig, Timeouts};
use thiserror::Error;

/// Log output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// A variable was set to something that cannot be used.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid value for {key}: '{value}' ({reason})")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json`
/// - `RESERVATION_SERVICE_URL`, `PAYMENT_SERVICE_URL`, `PROVIDER_SERVICE_URL`:
///   collaborator base URLs
/// - `IN_MEMORY_SERVICES`: `true` to run in-memory fakes for collaborators
///   without a URL; otherwise a missing URL fails startup
/// - `DATABASE_URL`: PostgreSQL; the in-memory store is used when unset
/// - `PAYMENT_MODE`: `required` or `bypass`
/// - `HOLD_TIMEOUT_SECS`, `PAYMENT_TIMEOUT_SECS`, `STATUS_TIMEOUT_SECS`,
///   `METRICS_TIMEOUT_SECS`: per-call-type remote timeouts
/// - `MAX_HOLD_RESTARTS`, `CLAIM_TIMEOUT_SECS`, `LOCK_IN_APPROVED_GUIDES`,
///   `DEFAULT_CURRENCY`, `PROCESSING_FEE_BPS`: orchestrator settings
/// - `SWEEP_INTERVAL_SECS`: period of the expiry/completion sweep
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub reservation_service_url: Option<String>,
    pub payment_service_url: Option<String>,
    pub provider_service_url: Option<String>,
    pub in_memory_services: bool,
    pub database_url: Option<String>,
    pub saga: SagaConfig,
    pub sweep_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();
        let saga_defaults = defaults.saga.clone();

        let log_format = match get("LOG_FORMAT") {
            None => LogFormat::Text,
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(v) if v.eq_ignore_ascii_case("text") => LogFormat::Text,
            Some(v) => return Err(invalid("LOG_FORMAT", v, "expected text or json")),
        };

        let payment_mode = match get("PAYMENT_MODE") {
            None => saga_defaults.payment_mode,
            Some(v) => v
                .parse::<PaymentMode>()
                .map_err(|reason| invalid("PAYMENT_MODE", v, reason))?,
        };

        let default_currency = match get("DEFAULT_CURRENCY") {
            None => saga_defaults.default_currency,
            Some(v) => Currency::new(v.clone())
                .map_err(|reason| invalid("DEFAULT_CURRENCY", v, reason))?,
        };

        let timeouts = Timeouts {
            hold: secs(&get, "HOLD_TIMEOUT_SECS", saga_defaults.timeouts.hold)?,
            payment: secs(&get, "PAYMENT_TIMEOUT_SECS", saga_defaults.timeouts.payment)?,
            status: secs(&get, "STATUS_TIMEOUT_SECS", saga_defaults.timeouts.status)?,
            provider_metrics: secs(
                &get,
                "METRICS_TIMEOUT_SECS",
                saga_defaults.timeouts.provider_metrics,
            )?,
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parsed(&get, "PORT", defaults.port)?,
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            reservation_service_url: get("RESERVATION_SERVICE_URL"),
            payment_service_url: get("PAYMENT_SERVICE_URL"),
            provider_service_url: get("PROVIDER_SERVICE_URL"),
            in_memory_services: parsed(&get, "IN_MEMORY_SERVICES", defaults.in_memory_services)?,
            database_url: get("DATABASE_URL"),
            saga: SagaConfig {
                payment_mode,
                timeouts,
                max_hold_restarts: parsed(
                    &get,
                    "MAX_HOLD_RESTARTS",
                    saga_defaults.max_hold_restarts,
                )?,
                claim_timeout: secs(&get, "CLAIM_TIMEOUT_SECS", saga_defaults.claim_timeout)?,
                lock_in_approved_guides: parsed(
                    &get,
                    "LOCK_IN_APPROVED_GUIDES",
                    saga_defaults.lock_in_approved_guides,
                )?,
                default_currency,
                processing_fee_bps: parsed(
                    &get,
                    "PROCESSING_FEE_BPS",
                    saga_defaults.processing_fee_bps,
                )?,
            },
            sweep_interval: secs(&get, "SWEEP_INTERVAL_SECS", defaults.sweep_interval)?,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            reservation_service_url: None,
            payment_service_url: None,
            provider_service_url: None,
            in_memory_services: false,
            database_url: None,
            saga: SagaConfig::default(),
            sweep_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

fn invalid(key: &'static str, value: String, reason: impl Into<String>) -> ConfigError {
    ConfigError {
        key,
        value,
        reason: reason.into(),
    }
}

fn parsed<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, v.clone(), e.to_string())),
    }
}

fn secs(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let secs = parsed(get, key, default.as_secs())?;
    if secs == 0 {
        return Err(invalid(key, "0".to_string(), "must be at least 1 second"));
    }
    Ok(Duration::from_secs(secs))
}
