use thiserror::Error;
use url::Url;

use crate::models::Config;

const REDIS_SCHEMES: &[&str] = &["redis", "rediss", "redis+unix", "unix"];
const MAX_SENSIBLE_ATTEMPTS: u32 = 20;

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("redis URL is not parseable: {reason}")]
    InvalidRedisUrl { reason: String },
    #[error("unsupported redis URL scheme '{scheme}'")]
    UnsupportedScheme { scheme: String },
    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },
    #[error("SCANMESH_CONNECT_ATTEMPTS must be at least 1")]
    NoConnectAttempts,
}

/// A setting that loads but is probably not what the operator wants, with
/// the change that would fix it.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: String,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn add(&mut self, message: impl Into<String>, hint: impl Into<String>) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: hint.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    let url = Url::parse(config.redis.connection_url()).map_err(|err| {
        ConfigGuardRailError::InvalidRedisUrl {
            reason: err.to_string(),
        }
    })?;
    if !REDIS_SCHEMES.contains(&url.scheme()) {
        return Err(ConfigGuardRailError::UnsupportedScheme {
            scheme: url.scheme().to_string(),
        });
    }

    if config.redis.command_timeout.is_zero() {
        return Err(ConfigGuardRailError::ZeroTimeout {
            field: "REDIS_COMMAND_TIMEOUT_MS",
        });
    }
    if config.redis.connect_timeout.is_zero() {
        return Err(ConfigGuardRailError::ZeroTimeout {
            field: "REDIS_CONNECT_TIMEOUT_MS",
        });
    }
    if config.connect_attempts == 0 {
        return Err(ConfigGuardRailError::NoConnectAttempts);
    }

    if url.scheme() == "redis"
        && url.password().is_some()
        && !is_loopback(&url)
    {
        warnings.add(
            "Redis password is sent over an unencrypted connection",
            "Use a rediss:// URL when the store is reached over the network",
        );
    }

    if config.connect_attempts > MAX_SENSIBLE_ATTEMPTS {
        warnings.add(
            format!(
                "SCANMESH_CONNECT_ATTEMPTS={} retries for a long time before failing",
                config.connect_attempts
            ),
            format!("Keep SCANMESH_CONNECT_ATTEMPTS at {MAX_SENSIBLE_ATTEMPTS} or below"),
        );
    }

    Ok(warnings)
}

fn is_loopback(url: &Url) -> bool {
    matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]" | "::1"))
}
