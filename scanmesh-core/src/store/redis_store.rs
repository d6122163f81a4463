use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::{RedisResult, aio::ConnectionManager};
use tracing::{info, warn};

use super::{Command, Message, MessageStream, Read, Reply, Store};
use crate::error::{StoreError, StoreResult};

/// Redis scripts for atomic operations
mod scripts {
    use redis::Script;

    /// Reads every key in KEYS in one atomic step. ARGV[i] selects the read
    /// for KEYS[i]: `h` for HGETALL, `l` for the whole list.
    pub fn snapshot() -> Script {
        Script::new(
            r#"
            local out = {}
            for i, key in ipairs(KEYS) do
                if ARGV[i] == 'h' then
                    out[i] = redis.call('HGETALL', key)
                else
                    out[i] = redis.call('LRANGE', key, 0, -1)
                end
            end
            return out
            "#,
        )
    }

    /// RPUSH ARGV[1] onto KEYS[1] unless its length is already ARGV[2].
    /// A list this call creates expires after ARGV[3] seconds.
    /// Returns `{length, pushed}`.
    pub fn push_capped() -> Script {
        Script::new(
            r#"
            local n = redis.call('LLEN', KEYS[1])
            if n >= tonumber(ARGV[2]) then
                return {n, 0}
            end
            n = redis.call('RPUSH', KEYS[1], ARGV[1])
            if n == 1 then
                redis.call('EXPIRE', KEYS[1], ARGV[3])
            end
            return {n, 1}
            "#,
        )
    }
}

const SCAN_BATCH: usize = 500;

#[derive(Debug, Clone)]
pub struct RedisStoreOptions {
    /// Upper bound for every individual command round trip.
    pub command_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for RedisStoreOptions {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// [`Store`] backed by a Redis server through a multiplexed connection
/// manager. Pub/sub uses a dedicated connection per subscription.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: ConnectionManager,
    options: RedisStoreOptions,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("connection", &"ConnectionManager")
            .field("options", &self.options)
            .finish()
    }
}

impl RedisStore {
    /// Opens a connection. Fails fast; retrying is left to the caller.
    pub async fn connect(
        redis_url: &str,
        options: RedisStoreOptions,
    ) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)?;

        let conn = tokio::time::timeout(
            options.connect_timeout,
            ConnectionManager::new(client.clone()),
        )
        .await
        .map_err(|_| StoreError::Timeout(options.connect_timeout))??;

        info!("Connected to Redis coordination store");

        Ok(Self {
            client,
            conn,
            options,
        })
    }

    async fn timed<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        let timeout = self.options.command_timeout;
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(timeout))?
            .map_err(StoreError::from)
    }
}

fn lease_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

fn build_pipeline(commands: &[Command]) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic();

    for command in commands {
        match command {
            Command::Del(keys) => {
                if !keys.is_empty() {
                    pipe.cmd("DEL").arg(keys.as_slice()).ignore();
                }
            }
            Command::HSet { key, fields } => {
                if fields.is_empty() {
                    continue;
                }
                pipe.cmd("HSET").arg(key);
                for (field, value) in fields {
                    pipe.arg(field).arg(value);
                }
                pipe.ignore();
            }
            Command::RPush { key, values } => {
                if !values.is_empty() {
                    pipe.cmd("RPUSH").arg(key).arg(values.as_slice()).ignore();
                }
            }
            Command::SAdd { key, members } => {
                if !members.is_empty() {
                    pipe.cmd("SADD").arg(key).arg(members.as_slice()).ignore();
                }
            }
            Command::Set { key, value } => {
                pipe.cmd("SET").arg(key).arg(value).ignore();
            }
            Command::Publish { channel, payload } => {
                pipe.cmd("PUBLISH").arg(channel).arg(payload).ignore();
            }
        }
    }

    pipe
}

fn pairs_to_hash(flat: Vec<String>) -> StoreResult<HashMap<String, String>> {
    if flat.len() % 2 != 0 {
        return Err(StoreError::Protocol(format!(
            "HGETALL returned {} elements",
            flat.len()
        )));
    }
    let mut fields = HashMap::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        fields.insert(field, value);
    }
    Ok(fields)
}

#[async_trait]
impl Store for RedisStore {
    async fn transact(&self, commands: Vec<Command>) -> StoreResult<()> {
        if commands.is_empty() {
            return Ok(());
        }
        let pipe = build_pipeline(&commands);
        let mut conn = self.conn.clone();
        self.timed(async move { pipe.query_async::<()>(&mut conn).await })
            .await
    }

    async fn snapshot(&self, reads: Vec<Read>) -> StoreResult<Vec<Reply>> {
        if reads.is_empty() {
            return Ok(Vec::new());
        }
        let script = scripts::snapshot();
        let mut invocation = script.prepare_invoke();
        for read in &reads {
            match read {
                Read::Hash(key) => invocation.key(key).arg("h"),
                Read::List(key) => invocation.key(key).arg("l"),
            };
        }

        let mut conn = self.conn.clone();
        let raw: Vec<Vec<String>> = self
            .timed(async move {
                invocation.invoke_async::<Vec<Vec<String>>>(&mut conn).await
            })
            .await?;

        if raw.len() != reads.len() {
            return Err(StoreError::Protocol(format!(
                "snapshot returned {} replies for {} reads",
                raw.len(),
                reads.len()
            )));
        }

        reads
            .into_iter()
            .zip(raw)
            .map(|(read, values)| match read {
                Read::Hash(_) => pairs_to_hash(values).map(Reply::Hash),
                Read::List(_) => Ok(Reply::List(values)),
            })
            .collect()
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        self.timed(async move {
            redis::cmd("GET")
                .arg(key)
                .query_async::<Option<String>>(&mut conn)
                .await
        })
        .await
    }

    async fn push_capped(
        &self,
        key: &str,
        value: &str,
        max: u64,
        ttl: Duration,
    ) -> StoreResult<(u64, bool)> {
        let script = scripts::push_capped();
        let mut invocation = script.prepare_invoke();
        invocation
            .key(key)
            .arg(value)
            .arg(max)
            .arg(lease_seconds(ttl));

        let mut conn = self.conn.clone();
        let (len, pushed): (u64, u64) = self
            .timed(async move {
                invocation.invoke_async::<(u64, u64)>(&mut conn).await
            })
            .await?;
        Ok((len, pushed == 1))
    }

    async fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        self.timed(async move {
            redis::cmd("SISMEMBER")
                .arg(key)
                .arg(member)
                .query_async::<bool>(&mut conn)
                .await
        })
        .await
    }

    async fn scard(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        self.timed(async move {
            redis::cmd("SCARD").arg(key).query_async::<u64>(&mut conn).await
        })
        .await
    }

    async fn spop(&self, key: &str, count: usize) -> StoreResult<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        self.timed(async move {
            redis::cmd("SPOP")
                .arg(key)
                .arg(count)
                .query_async::<Vec<String>>(&mut conn)
                .await
        })
        .await
    }

    async fn sinter(&self, left: &str, right: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        self.timed(async move {
            redis::cmd("SINTER")
                .arg(left)
                .arg(right)
                .query_async::<Vec<String>>(&mut conn)
                .await
        })
        .await
    }

    async fn set_nx_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let created: Option<String> = self
            .timed(async move {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("EX")
                    .arg(lease_seconds(ttl))
                    .query_async::<Option<String>>(&mut conn)
                    .await
            })
            .await?;
        Ok(created.is_some())
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let pattern = format!("{prefix}*");
        let mut conn = self.conn.clone();
        let mut cursor = 0u64;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = self
                .timed(
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn),
                )
                .await?;
            keys.extend(batch);

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        // SCAN may return a key more than once across iterations.
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn subscribe(&self, channels: &[String]) -> StoreResult<MessageStream> {
        let mut pubsub = tokio::time::timeout(
            self.options.connect_timeout,
            self.client.get_async_pubsub(),
        )
        .await
        .map_err(|_| StoreError::Timeout(self.options.connect_timeout))??;

        for channel in channels {
            let channel = channel.clone();
            self.timed(pubsub.subscribe(channel)).await?;
        }

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let channel = msg.get_channel_name().to_string();
            match msg.get_payload::<String>() {
                Ok(payload) => Some(Message { channel, payload }),
                Err(err) => {
                    warn!(channel = %channel, error = %err, "dropping undecodable message");
                    None
                }
            }
        });
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_pairs_are_folded() {
        let fields = pairs_to_hash(vec![
            "a".into(),
            "1".into(),
            "b".into(),
            "2".into(),
        ])
        .expect("even reply");
        assert_eq!(fields.get("a").map(String::as_str), Some("1"));
        assert_eq!(fields.get("b").map(String::as_str), Some("2"));
        assert!(pairs_to_hash(vec!["dangling".into()]).is_err());
    }

    #[test]
    fn lease_seconds_has_one_second_floor() {
        assert_eq!(lease_seconds(Duration::from_millis(10)), 1);
        assert_eq!(lease_seconds(Duration::from_secs(30)), 30);
    }
}
