pub mod error;
pub mod redis_url;

use once_cell::sync::Lazy;
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::{
    models::{
        Config, ConfigMetadata, DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_ATTEMPTS,
        DEFAULT_CONNECT_TIMEOUT, RedisConfig,
        sources::{EnvConfig, FileConfig},
    },
    validation::{self, ConfigWarnings},
};
use error::ConfigLoadError;

use std::time::Duration;

pub static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("scanmesh.toml"),
        PathBuf::from("config/scanmesh.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    /// Environment snapshot to use instead of the process environment. When
    /// set, no `.env` file is loaded.
    pub env: Option<EnvConfig>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn with_env(mut self, env: EnvConfig) -> Self {
        self.options.env = Some(env);
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let (env_config, env_file_loaded) = match &self.options.env {
            Some(env) => (env.clone(), false),
            None => {
                let loaded = self.load_env_file()?;
                (EnvConfig::gather(), loaded)
            }
        };

        let (file_config, config_path) = self.load_file_config(&env_config)?;

        let (config, warnings) = compose_config(
            file_config,
            env_config,
            config_path,
            env_file_loaded,
        )?;

        Ok(ConfigLoad { config, warnings })
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        let result = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path),
            None => dotenvy::dotenv().map(|_| ()),
        };
        match result {
            Ok(()) => Ok(true),
            Err(dotenvy::Error::Io(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env_config.config_path.clone());

        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            Some(path) => path,
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
            {
                Some(path) => path.clone(),
                None => return Ok((None, None)),
            },
        };

        debug!(path = %path.display(), "reading configuration file");
        let contents =
            fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
                path: path.clone(),
                source,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
                path: path.clone(),
                source,
            })?;

        Ok((Some(file_config), Some(path)))
    }
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
    env_file_loaded: bool,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if file_config.is_none() {
        warnings.add(
            "No scanmesh.toml detected; using environment variables and defaults",
            "Create scanmesh.toml or set SCANMESH_CONFIG to point at one",
        );
    }

    let FileConfig {
        redis: file_redis,
        connect_attempts: file_connect_attempts,
    } = file_config.unwrap_or_default();

    if env.redis_url.is_none() && file_redis.url.is_none() {
        warnings.add(
            "REDIS_URL not configured; connecting to the local default",
            "Set REDIS_URL or redis.url in scanmesh.toml",
        );
    }

    let redis = RedisConfig {
        url: redis_url::resolve_redis_url(&env, &file_redis)?,
        command_timeout: env
            .command_timeout
            .or(file_redis.command_timeout_ms.map(Duration::from_millis))
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT),
        connect_timeout: env
            .connect_timeout
            .or(file_redis.connect_timeout_ms.map(Duration::from_millis))
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
    };

    let config = Config {
        redis,
        connect_attempts: env
            .connect_attempts
            .or(file_connect_attempts)
            .unwrap_or(DEFAULT_CONNECT_ATTEMPTS),
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded,
        },
    };

    warnings.extend(validation::apply_guard_rails(&config)?);
    Ok((config, warnings))
}
