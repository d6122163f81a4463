use std::{fs::read_to_string, path::Path};

use url::Url;

use crate::{
    ConfigLoadError,
    models::{
        DEFAULT_REDIS_URL,
        sources::{EnvConfig, FileRedisConfig},
    },
};

/// Picks the redis URL (env, then file, then the local default) and embeds a
/// password when the URL does not already carry one.
pub fn resolve_redis_url(
    env: &EnvConfig,
    file_redis: &FileRedisConfig,
) -> Result<String, ConfigLoadError> {
    let raw = env
        .redis_url
        .clone()
        .or_else(|| {
            file_redis
                .url
                .clone()
                .filter(|value| !value.trim().is_empty())
        })
        .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());

    let mut parsed = Url::parse(raw.trim())
        .map_err(|source| ConfigLoadError::InvalidRedisUrl { source })?;

    if parsed.password().is_none()
        && let Some(password) = resolve_redis_password(env, file_redis)?
    {
        parsed
            .set_password(Some(&password))
            .map_err(|_| ConfigLoadError::InvalidRedisPassword)?;
    }

    Ok(parsed.to_string())
}

fn resolve_redis_password(
    env: &EnvConfig,
    file_redis: &FileRedisConfig,
) -> Result<Option<String>, ConfigLoadError> {
    if let Some(password) = env.redis_password.clone() {
        return Ok(Some(password));
    }

    for path in [
        env.redis_password_file.as_ref(),
        file_redis.password_file.as_ref(),
    ]
    .into_iter()
    .flatten()
    {
        if let Some(secret) = read_secret_file(path)? {
            return Ok(Some(secret));
        }
    }

    Ok(None)
}

pub fn read_secret_file(path: &Path) -> Result<Option<String>, ConfigLoadError> {
    let contents =
        read_to_string(path).map_err(|source| ConfigLoadError::SecretFileIo {
            path: path.to_path_buf(),
            source,
        })?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}
