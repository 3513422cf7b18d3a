use crate::env::{self, load_millis, load_parsed, load_string_opt};
use crate::error::ConfigError;
use crate::flush::FlushPolicy;
use crate::sender::{SenderConfig, SourceTags};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const DEFAULT_SOURCE_NAME: &str = "log-shipper";
const DEFAULT_CLIENT_NAME: &str = "log-shipper";

/// Settings for a [`LogShipper`](crate::shipper::LogShipper).
///
/// Durations are (de)serialized as integer milliseconds. Every field is
/// optional in serialized form and falls back to its default.
///
/// | Field | Default |
/// |---|---|
/// | `url` | none (required) |
/// | `connection_timeout` | 60 s |
/// | `retry_interval` | 10 s |
/// | `max_flush_interval` | 10 s |
/// | `flushing_accuracy` | 250 ms |
/// | `messages_per_request` | 100 |
/// | `max_queue_size_bytes` | 1 000 000 |
/// | `source_name` | `log-shipper` |
/// | `source_category` | none |
/// | `source_host` | local host name |
/// | `client_name` | `log-shipper` |
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ShipperConfig {
    pub url: Option<String>,
    #[serde(with = "duration_ms")]
    pub connection_timeout: Duration,
    /// Zero disables delivery altogether: entries are dropped on `add`.
    #[serde(with = "duration_ms")]
    pub retry_interval: Duration,
    #[serde(with = "duration_ms")]
    pub max_flush_interval: Duration,
    /// How often the scheduler checks whether a flush is due.
    #[serde(with = "duration_ms")]
    pub flushing_accuracy: Duration,
    pub messages_per_request: usize,
    pub max_queue_size_bytes: u64,
    pub source_name: Option<String>,
    pub source_category: Option<String>,
    pub source_host: Option<String>,
    pub client_name: Option<String>,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            url: None,
            connection_timeout: Duration::from_secs(60),
            retry_interval: Duration::from_secs(10),
            max_flush_interval: Duration::from_secs(10),
            flushing_accuracy: Duration::from_millis(250),
            messages_per_request: 100,
            max_queue_size_bytes: 1_000_000,
            source_name: Some(DEFAULT_SOURCE_NAME.to_string()),
            source_category: None,
            source_host: local_host_name(),
            client_name: Some(DEFAULT_CLIENT_NAME.to_string()),
        }
    }
}

impl ShipperConfig {
    /// Defaults for everything but the destination.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Defaults overridden by the `LOG_SHIPPER_*` variables in [`env`].
    ///
    /// The result is not validated; [`validate`](Self::validate) runs when
    /// the shipper starts.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        load_string_opt(env::LOG_SHIPPER_URL_ENV, &mut config.url);
        load_millis(env::LOG_SHIPPER_CONNECTION_TIMEOUT_MS_ENV, &mut config.connection_timeout)?;
        load_millis(env::LOG_SHIPPER_RETRY_INTERVAL_MS_ENV, &mut config.retry_interval)?;
        load_millis(env::LOG_SHIPPER_MAX_FLUSH_INTERVAL_MS_ENV, &mut config.max_flush_interval)?;
        load_millis(env::LOG_SHIPPER_FLUSHING_ACCURACY_MS_ENV, &mut config.flushing_accuracy)?;
        load_parsed(env::LOG_SHIPPER_MESSAGES_PER_REQUEST_ENV, &mut config.messages_per_request)?;
        load_parsed(env::LOG_SHIPPER_MAX_QUEUE_SIZE_BYTES_ENV, &mut config.max_queue_size_bytes)?;
        load_string_opt(env::LOG_SHIPPER_SOURCE_NAME_ENV, &mut config.source_name);
        load_string_opt(env::LOG_SHIPPER_SOURCE_CATEGORY_ENV, &mut config.source_category);
        load_string_opt(env::LOG_SHIPPER_SOURCE_HOST_ENV, &mut config.source_host);
        load_string_opt(env::LOG_SHIPPER_CLIENT_NAME_ENV, &mut config.client_name);

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.destination()?;

        if self.max_queue_size_bytes == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.messages_per_request == 0 {
            return Err(ConfigError::ZeroValue {
                field: "messages_per_request",
            });
        }
        if self.connection_timeout.is_zero() {
            return Err(ConfigError::ZeroValue {
                field: "connection_timeout",
            });
        }
        if self.flushing_accuracy.is_zero() {
            return Err(ConfigError::ZeroValue {
                field: "flushing_accuracy",
            });
        }

        Ok(())
    }

    pub fn sender_config(&self) -> Result<SenderConfig, ConfigError> {
        Ok(SenderConfig {
            url: Some(self.destination()?),
            connection_timeout: self.connection_timeout,
            retry_interval: self.retry_interval,
            client_name: self.client_name.clone(),
        })
    }

    pub fn source_tags(&self) -> SourceTags {
        SourceTags::new(
            self.source_name.clone(),
            self.source_category.clone(),
            self.source_host.clone(),
        )
    }

    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy {
            messages_per_request: self.messages_per_request,
            max_flush_interval: self.max_flush_interval,
        }
    }

    fn destination(&self) -> Result<Url, ConfigError> {
        let url = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingUrl)?;
        Ok(Url::parse(url)?)
    }
}

fn local_host_name() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
