//! Backing-store abstraction shared by every coordination component.
//!
//! The trait mirrors the handful of Redis primitives the coordination layer
//! relies on: transactional multi-key writes, an atomic multi-key read,
//! set-if-absent with expiry, set algebra and publish/subscribe.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::StoreResult;

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_store;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::{RedisStore, RedisStoreOptions};

/// A write issued as part of a [`Store::transact`] batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Del(Vec<String>),
    HSet {
        key: String,
        fields: Vec<(String, String)>,
    },
    RPush {
        key: String,
        values: Vec<String>,
    },
    SAdd {
        key: String,
        members: Vec<String>,
    },
    Set {
        key: String,
        value: String,
    },
    Publish {
        channel: String,
        payload: String,
    },
}

/// A read issued as part of a [`Store::snapshot`] batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Read {
    Hash(String),
    List(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Hash(HashMap<String, String>),
    List(Vec<String>),
}

impl Reply {
    /// `None` when the reply answers a list read.
    pub fn into_hash(self) -> Option<HashMap<String, String>> {
        match self {
            Reply::Hash(fields) => Some(fields),
            Reply::List(_) => None,
        }
    }

    /// `None` when the reply answers a hash read.
    pub fn into_list(self) -> Option<Vec<String>> {
        match self {
            Reply::List(values) => Some(values),
            Reply::Hash(_) => None,
        }
    }
}

/// A message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub channel: String,
    pub payload: String,
}

pub type MessageStream = BoxStream<'static, Message>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Applies every command or none of them (MULTI/EXEC).
    async fn transact(&self, commands: Vec<Command>) -> StoreResult<()>;

    /// Reads several keys as one consistent snapshot. Replies are returned in
    /// request order; absent keys read as empty.
    async fn snapshot(&self, reads: Vec<Read>) -> StoreResult<Vec<Reply>>;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Appends `value` unless the list already holds `max` entries, as one
    /// atomic step. A list created by this call expires after `ttl`.
    /// Returns the length afterwards and whether the value was appended.
    async fn push_capped(
        &self,
        key: &str,
        value: &str,
        max: u64,
        ttl: Duration,
    ) -> StoreResult<(u64, bool)>;

    async fn sismember(&self, key: &str, member: &str) -> StoreResult<bool>;

    async fn scard(&self, key: &str) -> StoreResult<u64>;

    /// Removes and returns up to `count` arbitrary members.
    async fn spop(&self, key: &str, count: usize) -> StoreResult<Vec<String>>;

    async fn sinter(&self, left: &str, right: &str) -> StoreResult<Vec<String>>;

    /// Creates `key` only if it is absent, with the given expiry. Returns
    /// whether this call created it.
    async fn set_nx_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<bool>;

    /// Lists every key starting with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Subscribes to `channels`. The subscription is live once this returns.
    async fn subscribe(&self, channels: &[String]) -> StoreResult<MessageStream>;
}
