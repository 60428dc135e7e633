use std::{env, time::Duration};

use crate::errors::{ParcelError, Result};

pub const TIMEOUT_ENV: &str = "PARCEL_TIMEOUT_SECS";
pub const CONNECT_TIMEOUT_ENV: &str = "PARCEL_CONNECT_TIMEOUT_SECS";
pub const USER_AGENT_ENV: &str = "PARCEL_USER_AGENT";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport settings shared by every request of a download attempt.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Upper bound on a whole request, body included. `None` waits forever.
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        DownloaderConfig {
            timeout: None,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            user_agent: format!("parcel/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DownloaderConfig {
    /// Builds a config from the `PARCEL_*` environment variables, falling
    /// back to the defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = DownloaderConfig::default();
        if let Some(secs) = read_secs(TIMEOUT_ENV)? {
            config.timeout = Some(secs);
        }
        if let Some(secs) = read_secs(CONNECT_TIMEOUT_ENV)? {
            config.connect_timeout = Some(secs);
        }
        if let Ok(agent) = env::var(USER_AGENT_ENV) {
            if !agent.trim().is_empty() {
                config.user_agent = agent.trim().to_string();
            }
        }
        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Creates the HTTP client every stage of an attempt shares.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().user_agent(self.user_agent.clone());
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = self.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        builder.build().map_err(|e| {
            ParcelError::InvalidRequest(format!("could not build HTTP client: {}", e))
        })
    }
}

fn read_secs(var: &str) -> Result<Option<Duration>> {
    match env::var(var) {
        Ok(value) => parse_secs(var, &value).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_secs(var: &str, value: &str) -> Result<Duration> {
    value.trim().parse::<u64>().map(Duration::from_secs).map_err(|_| {
        ParcelError::InvalidRequest(format!("{} must be whole seconds, got {:?}", var, value))
    })
}
