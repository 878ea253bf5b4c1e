use std::time::Duration;

use rumqttc::{MqttOptions, Transport};

use crate::mqtt::Backoff;

pub const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("store endpoint is missing")]
    MissingEndpoint,

    #[error("store key is missing")]
    MissingKey,

    #[error("broker host is missing")]
    MissingHost,

    #[error("broker username and password must be given together")]
    PartialCredentials,

    #[error("client id must be non-empty and must not start with a space")]
    ClientId,

    #[error("keep-alive must be at least 5s, got {0:?}")]
    KeepAlive(Duration),

    #[error(
        "max reconnect interval ({max:?}) is shorter than the reconnect interval ({initial:?})"
    )]
    BackoffRange { initial: Duration, max: Duration },
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub endpoint: String,

    pub key: String,
}

impl StoreConfig {
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>) -> Result<Self, ConfigError> {
        let endpoint = endpoint.into();
        let key = key.into();

        if endpoint.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        if key.trim().is_empty() {
            return Err(ConfigError::MissingKey);
        }

        Ok(Self { endpoint, key })
    }
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,

    pub port: u16,

    pub credentials: Option<(String, String)>,

    pub tls: bool,

    pub client_id: String,

    pub keep_alive: Duration,

    pub backoff: Backoff,
}

impl BrokerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if self.client_id.is_empty() || self.client_id.starts_with(' ') {
            return Err(ConfigError::ClientId);
        }
        if self.keep_alive < MIN_KEEP_ALIVE {
            return Err(ConfigError::KeepAlive(self.keep_alive));
        }
        if self.backoff.max < self.backoff.initial {
            return Err(ConfigError::BackoffRange {
                initial: self.backoff.initial,
                max: self.backoff.max,
            });
        }

        Ok(())
    }

    pub fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);

        if let Some((username, password)) = &self.credentials {
            options.set_credentials(username, password);
        }

        if self.tls {
            options.set_transport(Transport::tls_with_default_config());
        }

        options
    }
}

/// Pairs the optional username and password, rejecting one without the other.
pub fn credentials(
    username: Option<String>,
    password: Option<String>,
) -> Result<Option<(String, String)>, ConfigError> {
    match (username, password) {
        (Some(u), Some(p)) => Ok(Some((u, p))),
        (None, None) => Ok(None),
        _ => Err(ConfigError::PartialCredentials),
    }
}
