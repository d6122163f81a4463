use std::time::Duration;

use scanmesh_model::{GroupScope, ModelError};
use thiserror::Error;

/// Failures raised by a backing store implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("wrong kind of value stored at {0}")]
    WrongType(String),

    #[error("subscription closed by the store")]
    SubscriptionClosed,

    #[error("malformed reply: {0}")]
    Protocol(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum CoordError {
    #[error("scan group not found: {0}")]
    GroupNotFound(GroupScope),

    #[error("{op} failed: {source}")]
    Store {
        op: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("malformed record at {key}: {reason}")]
    Decode { key: String, reason: String },

    #[error("invalid work item {hash}: {source}")]
    InvalidAddress {
        hash: String,
        #[source]
        source: ModelError,
    },

    #[error("invalid scan group: {0}")]
    InvalidGroup(#[source] ModelError),
}

impl CoordError {
    pub(crate) fn decode(key: &str, reason: impl Into<String>) -> Self {
        CoordError::Decode {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordError>;

/// Tags a backing-store failure with the coordination operation it aborted.
pub(crate) trait StoreResultExt<T> {
    fn op(self, op: &'static str) -> Result<T>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn op(self, op: &'static str) -> Result<T> {
        self.map_err(|source| CoordError::Store { op, source })
    }
}
