//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `0.0.0.0`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json` (default `text`)
/// - `DATABASE_URL`: PostgreSQL event store; the in-memory store when unset
/// - `REAPER_INTERVAL_SECS`: expiration sweep period (default `60`)
/// - `BOOKING_HOLD_MINUTES`: how long a pending booking holds its seats (default `15`)
/// - `PAYMENT_RETURN_URL` / `PAYMENT_CANCEL_URL`: where the provider sends the customer
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub reaper_interval: Duration,
    pub booking_hold_minutes: i64,
    pub payment_return_url: String,
    pub payment_cancel_url: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.parse::<u64>().ok());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            reaper_interval: parsed("REAPER_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.reaper_interval),
            booking_hold_minutes: parsed("BOOKING_HOLD_MINUTES")
                .filter(|minutes| *minutes > 0)
                .and_then(|minutes| i64::try_from(minutes).ok())
                .unwrap_or(defaults.booking_hold_minutes),
            payment_return_url: lookup("PAYMENT_RETURN_URL").unwrap_or(defaults.payment_return_url),
            payment_cancel_url: lookup("PAYMENT_CANCEL_URL").unwrap_or(defaults.payment_cancel_url),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn provider_urls(&self) -> saga::ProviderUrls {
        saga::ProviderUrls {
            return_url: self.payment_return_url.clone(),
            cancel_url: self.payment_cancel_url.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let urls = saga::ProviderUrls::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            reaper_interval: saga::DEFAULT_SWEEP_INTERVAL,
            booking_hold_minutes: saga::DEFAULT_HOLD_MINUTES,
            payment_return_url: urls.return_url,
            payment_cancel_url: urls.cancel_url,
        }
    }
}
