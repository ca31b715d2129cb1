//! Server configuration read from environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use turnstile_admission::application::settings::AdmissionSettings;
use turnstile_reservation::application::settings::ReservationSettings;

use crate::error::AppError;

/// Everything the server needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `DATABASE_URL`, required.
    pub database_url: String,
    /// `DATABASE_MAX_CONNECTIONS`, default 10.
    pub database_max_connections: u32,
    /// `REDIS_URL`, default `redis://127.0.0.1:6379`.
    pub redis_url: String,
    /// `HOST`, default `0.0.0.0`.
    pub host: String,
    /// `PORT`, default 3000.
    pub port: u16,
    /// `LOCK_TTL_SECS` and `CONFIRM_LOCK_EXTENSION_SECS`.
    pub reservation: ReservationSettings,
    /// `IDEMPOTENCY_TTL_SECS`.
    pub admission: AdmissionSettings,
    /// `NOTIFICATION_MAX_DELIVERIES`, default 5.
    pub notification_max_deliveries: u32,
    /// `OTEL_EXPORTER_OTLP_ENDPOINT`; spans are only exported when set.
    pub otlp_endpoint: Option<String>,
}

impl Config {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| AppError::Config("DATABASE_URL environment variable must be set".into()))?;

        let reservation_defaults = ReservationSettings::default();
        let reservation = ReservationSettings {
            lock_ttl: seconds(&lookup, "LOCK_TTL_SECS", reservation_defaults.lock_ttl)?,
            confirm_lock_extension: seconds(
                &lookup,
                "CONFIRM_LOCK_EXTENSION_SECS",
                reservation_defaults.confirm_lock_extension,
            )?,
        };
        let admission = AdmissionSettings {
            idempotency_ttl: seconds(
                &lookup,
                "IDEMPOTENCY_TTL_SECS",
                AdmissionSettings::default().idempotency_ttl,
            )?,
        };

        let notification_max_deliveries = parsed(&lookup, "NOTIFICATION_MAX_DELIVERIES", 5)?;
        if notification_max_deliveries == 0 {
            return Err(AppError::Config(
                "NOTIFICATION_MAX_DELIVERIES must be at least 1".into(),
            ));
        }

        Ok(Self {
            database_url,
            database_max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed(&lookup, "PORT", 3000)?,
            reservation,
            admission,
            notification_max_deliveries,
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|v| !v.is_empty()),
        })
    }

    /// Address the HTTP listener binds to.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn listen_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| AppError::Config(format!("{key} must be a valid number: {e}"))),
        None => Ok(default),
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, AppError> {
    let secs: u64 = parsed(lookup, key, default.as_secs())?;
    if secs == 0 {
        return Err(AppError::Config(format!("{key} must be positive")));
    }
    Ok(Duration::from_secs(secs))
}
