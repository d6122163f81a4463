//! In-process [`Store`] used by tests and single-process deployments.
//!
//! Mirrors the Redis semantics the coordination layer depends on: typed
//! values with `WRONGTYPE` errors, empty aggregates disappearing, server-side
//! expiry and fire-and-forget publish/subscribe.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{Mutex, broadcast};
use tokio::time::Instant;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use super::{Command, Message, MessageStream, Read, Reply, Store};
use crate::error::{StoreError, StoreResult};

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    List(Vec<String>),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, Entry>,
}

impl Keyspace {
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let expired = self
            .entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .is_some_and(|deadline| deadline <= Instant::now());
        if expired {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn hash_mut(&mut self, key: &str) -> StoreResult<&mut HashMap<String, String>> {
        if self.live(key).is_none() {
            self.entries.insert(key.to_string(), Entry::new(Value::Hash(HashMap::new())));
        }
        match self.entries.get_mut(key).map(|entry| &mut entry.value) {
            Some(Value::Hash(fields)) => Ok(fields),
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn list_mut(&mut self, key: &str) -> StoreResult<&mut Vec<String>> {
        if self.live(key).is_none() {
            self.entries.insert(key.to_string(), Entry::new(Value::List(Vec::new())));
        }
        match self.entries.get_mut(key).map(|entry| &mut entry.value) {
            Some(Value::List(values)) => Ok(values),
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn set_mut(&mut self, key: &str) -> StoreResult<&mut HashSet<String>> {
        if self.live(key).is_none() {
            self.entries.insert(key.to_string(), Entry::new(Value::Set(HashSet::new())));
        }
        match self.entries.get_mut(key).map(|entry| &mut entry.value) {
            Some(Value::Set(members)) => Ok(members),
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn read_hash(&mut self, key: &str) -> StoreResult<HashMap<String, String>> {
        match self.live(key).map(|entry| &entry.value) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(fields)) => Ok(fields.clone()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn read_list(&mut self, key: &str) -> StoreResult<Vec<String>> {
        match self.live(key).map(|entry| &entry.value) {
            None => Ok(Vec::new()),
            Some(Value::List(values)) => Ok(values.clone()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn read_set(&mut self, key: &str) -> StoreResult<Option<&mut HashSet<String>>> {
        match self.live(key).map(|entry| &mut entry.value) {
            None => Ok(None),
            Some(Value::Set(members)) => Ok(Some(members)),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn expire(&mut self, key: &str, ttl: Duration) {
        if let Some(entry) = self.live(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
    }

    /// Applies the batch in order. On the first failure every touched key is
    /// put back the way it was before the batch.
    fn apply_all(&mut self, commands: &[Command]) -> StoreResult<()> {
        let mut undo: HashMap<String, Option<Entry>> = HashMap::new();
        for command in commands {
            for key in touched_keys(command) {
                undo.entry(key.clone())
                    .or_insert_with(|| self.entries.get(key).cloned());
            }
            if let Err(err) = self.apply(command) {
                self.restore(undo);
                return Err(err);
            }
        }
        Ok(())
    }

    fn restore(&mut self, undo: HashMap<String, Option<Entry>>) {
        for (key, prior) in undo {
            match prior {
                Some(entry) => {
                    self.entries.insert(key, entry);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
    }

    fn apply(&mut self, command: &Command) -> StoreResult<()> {
        match command {
            Command::Del(keys) => {
                for key in keys {
                    self.entries.remove(key);
                }
            }
            Command::HSet { key, fields } => {
                let hash = self.hash_mut(key)?;
                for (field, value) in fields {
                    hash.insert(field.clone(), value.clone());
                }
            }
            Command::RPush { key, values } => {
                self.list_mut(key)?.extend(values.iter().cloned());
            }
            Command::SAdd { key, members } => {
                self.set_mut(key)?.extend(members.iter().cloned());
            }
            Command::Set { key, value } => {
                self.entries
                    .insert(key.clone(), Entry::new(Value::Str(value.clone())));
            }
            // Delivered by the caller once the batch has committed.
            Command::Publish { .. } => {}
        }
        self.drop_empty(command);
        Ok(())
    }

    fn drop_empty(&mut self, command: &Command) {
        let key = match command {
            Command::HSet { key, .. }
            | Command::RPush { key, .. }
            | Command::SAdd { key, .. } => key,
            _ => return,
        };
        let empty = match self.entries.get(key).map(|entry| &entry.value) {
            Some(Value::Hash(fields)) => fields.is_empty(),
            Some(Value::List(values)) => values.is_empty(),
            Some(Value::Set(members)) => members.is_empty(),
            _ => false,
        };
        if empty {
            self.entries.remove(key);
        }
    }
}

fn touched_keys(command: &Command) -> &[String] {
    match command {
        Command::Del(keys) => keys.as_slice(),
        Command::HSet { key, .. }
        | Command::RPush { key, .. }
        | Command::SAdd { key, .. }
        | Command::Set { key, .. } => std::slice::from_ref(key),
        Command::Publish { .. } => &[],
    }
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }
}

pub struct MemoryStore {
    keyspace: Mutex<Keyspace>,
    channels: Mutex<HashMap<String, broadcast::Sender<Message>>>,
    channel_capacity: usize,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_channel_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Messages beyond `capacity` unread by a subscriber are dropped for it.
    pub fn with_channel_capacity(capacity: usize) -> Self {
        Self {
            keyspace: Mutex::new(Keyspace::default()),
            channels: Mutex::new(HashMap::new()),
            channel_capacity: capacity.max(1),
        }
    }

    /// Number of live keys, for assertions in tests.
    pub async fn key_count(&self) -> usize {
        let mut keyspace = self.keyspace.lock().await;
        let keys: Vec<String> = keyspace.entries.keys().cloned().collect();
        keys.iter().filter(|key| keyspace.live(key).is_some()).count()
    }

    async fn publish(&self, channel: &str, payload: &str) {
        let channels = self.channels.lock().await;
        if let Some(sender) = channels.get(channel) {
            let _ = sender.send(Message {
                channel: channel.to_string(),
                payload: payload.to_string(),
            });
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn transact(&self, commands: Vec<Command>) -> StoreResult<()> {
        {
            let mut keyspace = self.keyspace.lock().await;
            keyspace.apply_all(&commands)?;
        }

        for command in &commands {
            if let Command::Publish { channel, payload } = command {
                self.publish(channel, payload).await;
            }
        }
        Ok(())
    }

    async fn snapshot(&self, reads: Vec<Read>) -> StoreResult<Vec<Reply>> {
        let mut keyspace = self.keyspace.lock().await;
        reads
            .iter()
            .map(|read| match read {
                Read::Hash(key) => keyspace.read_hash(key).map(Reply::Hash),
                Read::List(key) => keyspace.read_list(key).map(Reply::List),
            })
            .collect()
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut keyspace = self.keyspace.lock().await;
        match keyspace.live(key).map(|entry| &entry.value) {
            None => Ok(None),
            Some(Value::Str(value)) => Ok(Some(value.clone())),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn push_capped(
        &self,
        key: &str,
        value: &str,
        max: u64,
        ttl: Duration,
    ) -> StoreResult<(u64, bool)> {
        let mut keyspace = self.keyspace.lock().await;
        let len = match keyspace.live(key).map(|entry| &entry.value) {
            None => 0,
            Some(Value::List(values)) => values.len() as u64,
            Some(_) => return Err(StoreError::WrongType(key.to_string())),
        };
        if len >= max {
            return Ok((len, false));
        }

        keyspace.list_mut(key)?.push(value.to_string());
        if len == 0 {
            keyspace.expire(key, ttl);
        }
        Ok((len + 1, true))
    }

    async fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut keyspace = self.keyspace.lock().await;
        Ok(keyspace
            .read_set(key)?
            .is_some_and(|members| members.contains(member)))
    }

    async fn scard(&self, key: &str) -> StoreResult<u64> {
        let mut keyspace = self.keyspace.lock().await;
        Ok(keyspace
            .read_set(key)?
            .map_or(0, |members| members.len() as u64))
    }

    async fn spop(&self, key: &str, count: usize) -> StoreResult<Vec<String>> {
        let mut keyspace = self.keyspace.lock().await;
        let Some(members) = keyspace.read_set(key)? else {
            return Ok(Vec::new());
        };
        let popped: Vec<String> = members.iter().take(count).cloned().collect();
        for member in &popped {
            members.remove(member);
        }
        if members.is_empty() {
            keyspace.entries.remove(key);
        }
        Ok(popped)
    }

    async fn sinter(&self, left: &str, right: &str) -> StoreResult<Vec<String>> {
        let mut keyspace = self.keyspace.lock().await;
        let Some(left) = keyspace.read_set(left)?.cloned() else {
            return Ok(Vec::new());
        };
        let Some(right) = keyspace.read_set(right)? else {
            return Ok(Vec::new());
        };
        Ok(left.intersection(right).cloned().collect())
    }

    async fn set_nx_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        let mut keyspace = self.keyspace.lock().await;
        if keyspace.live(key).is_some() {
            return Ok(false);
        }
        keyspace.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keyspace = self.keyspace.lock().await;
        let candidates: Vec<String> = keyspace
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        Ok(candidates
            .into_iter()
            .filter(|key| keyspace.live(key).is_some())
            .collect())
    }

    async fn subscribe(&self, channels: &[String]) -> StoreResult<MessageStream> {
        let mut registry = self.channels.lock().await;
        let streams = channels.iter().map(|channel| {
            let sender = registry
                .entry(channel.clone())
                .or_insert_with(|| broadcast::channel(self.channel_capacity).0);
            BroadcastStream::new(sender.subscribe()).filter_map(|item| async move {
                match item {
                    Ok(message) => Some(message),
                    Err(err) => {
                        warn!(error = %err, "subscriber lagged, dropping messages");
                        None
                    }
                }
            })
        });
        let streams: Vec<_> = streams.map(StreamExt::boxed).collect();
        Ok(futures::stream::select_all(streams).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_transaction_leaves_nothing_behind() {
        let store = MemoryStore::new();
        store
            .transact(vec![Command::Set {
                key: "plain".into(),
                value: "v".into(),
            }])
            .await
            .expect("seed");

        let result = store
            .transact(vec![
                Command::SAdd {
                    key: "members".into(),
                    members: vec!["a".into()],
                },
                Command::HSet {
                    key: "plain".into(),
                    fields: vec![("f".into(), "v".into())],
                },
            ])
            .await;

        assert!(matches!(result, Err(StoreError::WrongType(_))));
        assert_eq!(store.key_count().await, 1);
        assert_eq!(store.get("plain").await.expect("get"), Some("v".into()));
    }

    #[tokio::test]
    async fn failed_transaction_restores_touched_keys() {
        let store = MemoryStore::new();
        store
            .transact(vec![
                Command::HSet {
                    key: "config".into(),
                    fields: vec![("name".into(), "before".into())],
                },
                Command::RPush {
                    key: "words".into(),
                    values: vec!["a".into(), "b".into()],
                },
                Command::Set {
                    key: "plain".into(),
                    value: "v".into(),
                },
            ])
            .await
            .expect("seed");

        let result = store
            .transact(vec![
                Command::Del(vec!["words".into()]),
                Command::HSet {
                    key: "config".into(),
                    fields: vec![("name".into(), "after".into())],
                },
                Command::RPush {
                    key: "words".into(),
                    values: vec!["c".into()],
                },
                Command::SAdd {
                    key: "plain".into(),
                    members: vec!["x".into()],
                },
            ])
            .await;
        assert!(matches!(result, Err(StoreError::WrongType(_))));

        let replies = store
            .snapshot(vec![Read::Hash("config".into()), Read::List("words".into())])
            .await
            .expect("snapshot");
        assert_eq!(
            replies[0].clone().into_hash().expect("hash")["name"],
            "before"
        );
        assert_eq!(
            replies[1].clone().into_list().expect("list"),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(store.key_count().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_expire_after_ttl() {
        let store = MemoryStore::new();
        assert!(
            store
                .set_nx_ex("lease", "1", Duration::from_secs(2))
                .await
                .expect("set")
        );
        assert!(
            !store
                .set_nx_ex("lease", "1", Duration::from_secs(2))
                .await
                .expect("set")
        );

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(store.key_count().await, 0);
        assert!(
            store
                .set_nx_ex("lease", "1", Duration::from_secs(2))
                .await
                .expect("set")
        );
    }

    #[tokio::test]
    async fn spop_removes_drained_set() {
        let store = MemoryStore::new();
        store
            .transact(vec![Command::SAdd {
                key: "q".into(),
                members: vec!["a".into(), "b".into()],
            }])
            .await
            .expect("seed");

        let popped = store.spop("q", 10).await.expect("spop");
        assert_eq!(popped.len(), 2);
        assert_eq!(store.key_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn capped_push_stops_at_max_and_expires() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(2);

        assert_eq!(store.push_capped("etld", "1", 2, ttl).await.expect("push"), (1, true));
        assert_eq!(store.push_capped("etld", "2", 2, ttl).await.expect("push"), (2, true));
        assert_eq!(store.push_capped("etld", "3", 2, ttl).await.expect("push"), (2, false));
        assert_eq!(store.push_capped("none", "1", 0, ttl).await.expect("push"), (0, false));
        assert_eq!(store.key_count().await, 1);

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(store.push_capped("etld", "4", 2, ttl).await.expect("push"), (1, true));
    }

    #[tokio::test]
    async fn capped_push_onto_a_string_is_wrong_type() {
        let store = MemoryStore::new();
        store
            .transact(vec![Command::Set {
                key: "plain".into(),
                value: "v".into(),
            }])
            .await
            .expect("seed");

        let result = store.push_capped("plain", "1", 5, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(StoreError::WrongType(_))));
    }
}
