//! Environment variable names read by
//! [`ShipperConfig::from_env`](crate::config::ShipperConfig::from_env), and
//! the small parsing helpers behind it.
//!
//! Unset variables keep the current value. Set but unparsable ones are an
//! error rather than being silently ignored.

use crate::error::ConfigError;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Collector endpoint, e.g. `https://collector.example.com/receiver/v1/http/TOKEN`.
pub const LOG_SHIPPER_URL_ENV: &str = "LOG_SHIPPER_URL";

/// Per-attempt timeout in milliseconds.
pub const LOG_SHIPPER_CONNECTION_TIMEOUT_MS_ENV: &str = "LOG_SHIPPER_CONNECTION_TIMEOUT_MS";

/// Delay between delivery attempts in milliseconds.
pub const LOG_SHIPPER_RETRY_INTERVAL_MS_ENV: &str = "LOG_SHIPPER_RETRY_INTERVAL_MS";

/// Upper bound between two flushes in milliseconds.
pub const LOG_SHIPPER_MAX_FLUSH_INTERVAL_MS_ENV: &str = "LOG_SHIPPER_MAX_FLUSH_INTERVAL_MS";

/// Scheduler period in milliseconds.
pub const LOG_SHIPPER_FLUSHING_ACCURACY_MS_ENV: &str = "LOG_SHIPPER_FLUSHING_ACCURACY_MS";

pub const LOG_SHIPPER_MESSAGES_PER_REQUEST_ENV: &str = "LOG_SHIPPER_MESSAGES_PER_REQUEST";

/// Buffer capacity in bytes of buffered text.
pub const LOG_SHIPPER_MAX_QUEUE_SIZE_BYTES_ENV: &str = "LOG_SHIPPER_MAX_QUEUE_SIZE_BYTES";

pub const LOG_SHIPPER_SOURCE_NAME_ENV: &str = "LOG_SHIPPER_SOURCE_NAME";

pub const LOG_SHIPPER_SOURCE_CATEGORY_ENV: &str = "LOG_SHIPPER_SOURCE_CATEGORY";

pub const LOG_SHIPPER_SOURCE_HOST_ENV: &str = "LOG_SHIPPER_SOURCE_HOST";

pub const LOG_SHIPPER_CLIENT_NAME_ENV: &str = "LOG_SHIPPER_CLIENT_NAME";

/// Every variable above, handy for clearing the environment in tests.
pub const ALL_ENV_KEYS: [&str; 11] = [
    LOG_SHIPPER_URL_ENV,
    LOG_SHIPPER_CONNECTION_TIMEOUT_MS_ENV,
    LOG_SHIPPER_RETRY_INTERVAL_MS_ENV,
    LOG_SHIPPER_MAX_FLUSH_INTERVAL_MS_ENV,
    LOG_SHIPPER_FLUSHING_ACCURACY_MS_ENV,
    LOG_SHIPPER_MESSAGES_PER_REQUEST_ENV,
    LOG_SHIPPER_MAX_QUEUE_SIZE_BYTES_ENV,
    LOG_SHIPPER_SOURCE_NAME_ENV,
    LOG_SHIPPER_SOURCE_CATEGORY_ENV,
    LOG_SHIPPER_SOURCE_HOST_ENV,
    LOG_SHIPPER_CLIENT_NAME_ENV,
];

/// Overwrite `target` with the parsed value of `key`, if set.
pub(crate) fn load_parsed<T>(key: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    if let Ok(value) = std::env::var(key) {
        *target = value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
            key,
            message: format!("{:?}: {}", value, e),
        })?;
    }
    Ok(())
}

/// Like [`load_parsed`] for a duration given in whole milliseconds.
pub(crate) fn load_millis(key: &'static str, target: &mut Duration) -> Result<(), ConfigError> {
    let mut millis = target.as_millis() as u64;
    load_parsed(key, &mut millis)?;
    *target = Duration::from_millis(millis);
    Ok(())
}

/// An empty value clears the option.
pub(crate) fn load_string_opt(key: &str, target: &mut Option<String>) {
    if let Ok(value) = std::env::var(key) {
        *target = if value.trim().is_empty() { None } else { Some(value) };
    }
}
