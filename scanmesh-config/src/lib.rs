//! Configuration library for scanmesh coordination clients.
//!
//! Settings are composed from an optional TOML file, an optional `.env`
//! file and the process environment, in increasing order of precedence, then
//! checked against a small set of guard rails before a client connects.

pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, ConfigLoaderOptions, error::ConfigLoadError};
pub use models::sources::{EnvConfig, FileConfig, FileRedisConfig};
pub use models::{Config, ConfigMetadata, RedisConfig};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
