use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::util::{non_empty, parse_millis};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub redis: FileRedisConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_attempts: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileRedisConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub redis_url: Option<String>,
    pub redis_password: Option<String>,
    pub redis_password_file: Option<PathBuf>,
    pub command_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub connect_attempts: Option<u32>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the snapshot from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            config_path: non_empty(lookup("SCANMESH_CONFIG")).map(PathBuf::from),
            redis_url: non_empty(lookup("REDIS_URL")),
            redis_password: non_empty(lookup("REDIS_PASSWORD")),
            redis_password_file: non_empty(lookup("REDIS_PASSWORD_FILE"))
                .map(PathBuf::from),
            command_timeout: lookup("REDIS_COMMAND_TIMEOUT_MS")
                .and_then(|raw| parse_millis(&raw)),
            connect_timeout: lookup("REDIS_CONNECT_TIMEOUT_MS")
                .and_then(|raw| parse_millis(&raw)),
            connect_attempts: lookup("SCANMESH_CONNECT_ATTEMPTS")
                .and_then(|raw| raw.trim().parse().ok()),
        }
    }
}
