//! Session configuration and its environment overlay

use std::time::Duration;

use crate::DeviceError;

pub const ENV_HOST: &str = "DEVSTORE_HOST";
pub const ENV_USERNAME: &str = "DEVSTORE_USERNAME";
pub const ENV_PASSWORD: &str = "DEVSTORE_PASSWORD";
pub const ENV_TIMEOUT_SECS: &str = "DEVSTORE_TIMEOUT_SECS";
pub const ENV_THROTTLE_MS: &str = "DEVSTORE_THROTTLE_MS";

pub const DEFAULT_HOST: &str = "http://192.168.4.1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(50);
pub const DEFAULT_ROOT: &str = "/";
/// Directory hops below the root. Files up to five directories deep are
/// found. The device's own web UI passes its depth straight to the directory
/// listing and so reaches one level further; use 6 to match it.
pub const DEFAULT_DEPTH: u8 = 5;

/// Credentials handed to the transport for every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Everything a [`crate::DeviceSession`] needs to know about its device
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Device address, with or without the `http://` scheme
    pub host: String,
    pub credentials: Option<Credentials>,
    /// Per-request timeout of the HTTP transport. `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Minimum delay between two consecutive backup downloads
    pub download_throttle: Duration,
    /// Directory a catalog refresh starts from
    pub root: String,
    /// Directory hops a catalog refresh descends below `root`
    pub depth: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            credentials: None,
            request_timeout: Some(DEFAULT_TIMEOUT),
            download_throttle: DEFAULT_THROTTLE,
            root: DEFAULT_ROOT.to_string(),
            depth: DEFAULT_DEPTH,
        }
    }
}

impl SessionConfig {
    /// Default configuration overlaid with the `DEVSTORE_*` environment variables
    pub fn from_env() -> Result<Self, DeviceError> {
        Self::default().with_env()
    }

    /// Overlays the `DEVSTORE_*` environment variables onto this configuration
    pub fn with_env(self) -> Result<Self, DeviceError> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DeviceError> {
        if let Some(host) = lookup(ENV_HOST) {
            self.host = host;
        }
        match (lookup(ENV_USERNAME), lookup(ENV_PASSWORD)) {
            (Some(username), password) => {
                self.credentials = Some(Credentials {
                    username,
                    password: password.unwrap_or_default(),
                })
            }
            (None, Some(_)) => {
                return Err(DeviceError::InvalidConfig(format!(
                    "{ENV_PASSWORD} is set without {ENV_USERNAME}"
                )));
            }
            (None, None) => {}
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = parse_number(ENV_TIMEOUT_SECS, &secs)?;
            // zero disables the timeout
            self.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(ms) = lookup(ENV_THROTTLE_MS) {
            self.download_throttle = Duration::from_millis(parse_number(ENV_THROTTLE_MS, &ms)?);
        }
        Ok(self)
    }

    /// The host as an absolute base URL without a trailing slash
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{host}")
        }
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, DeviceError> {
    value
        .trim()
        .parse()
        .map_err(|_| DeviceError::InvalidConfig(format!("{key} must be a number, got `{value}`")))
}
