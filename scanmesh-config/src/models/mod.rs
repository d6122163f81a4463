pub mod sources;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use scanmesh_core::store::RedisStoreOptions;
use url::Url;

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub redis: RedisConfig,
    /// How many times a client tries to reach the store before giving up.
    pub connect_attempts: u32,
    pub metadata: ConfigMetadata,
}

#[derive(Clone)]
pub struct RedisConfig {
    /// Connection URL with any resolved password already embedded.
    pub url: String,
    pub command_timeout: Duration,
    pub connect_timeout: Duration,
}

impl RedisConfig {
    pub fn connection_url(&self) -> &str {
        &self.url
    }

    pub fn store_options(&self) -> RedisStoreOptions {
        RedisStoreOptions {
            command_timeout: self.command_timeout,
            connect_timeout: self.connect_timeout,
        }
    }

    /// The URL with its password masked, for logs and operator output.
    pub fn redacted_url(&self) -> String {
        match Url::parse(&self.url) {
            Ok(mut parsed) if parsed.password().is_some() => {
                if parsed.set_password(Some("****")).is_err() {
                    return "<unprintable redis url>".to_string();
                }
                parsed.to_string()
            }
            Ok(parsed) => parsed.to_string(),
            Err(_) => "<invalid redis url>".to_string(),
        }
    }
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("url", &self.redacted_url())
            .field("command_timeout", &self.command_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis(url: &str) -> RedisConfig {
        RedisConfig {
            url: url.to_string(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    #[test]
    fn password_is_masked_in_debug_output() {
        let config = redis("redis://:hunter2@cache.internal:6379/0");
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("****"));
    }

    #[test]
    fn store_options_carry_timeouts() {
        let mut config = redis(DEFAULT_REDIS_URL);
        config.command_timeout = Duration::from_millis(750);
        let options = config.store_options();
        assert_eq!(options.command_timeout, Duration::from_millis(750));
        assert_eq!(options.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }
}
