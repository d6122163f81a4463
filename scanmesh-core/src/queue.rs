//! Per-group address work queue with dedup.
//!
//! The queue is a pending set plus a known set. Delivery is unordered and
//! at-most-once per pop: a popped hash leaves the pending set even if the
//! consumer dies before processing it. Missed work is rediscovered on the
//! next scan cycle, so there is no acknowledgment or redelivery protocol.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use scanmesh_model::{GroupScope, ScanGroupAddress, address_hash};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{CoordError, Result, StoreResultExt};
use crate::fields;
use crate::keys::GroupKeys;
use crate::store::{Command, Read, Store};

/// Work items keyed by address hash.
pub type AddressMap = HashMap<String, ScanGroupAddress>;

#[derive(Clone)]
pub struct WorkQueue {
    store: Arc<dyn Store>,
}

impl fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkQueue").finish()
    }
}

/// Validates the item, fills in its hash and pins it to `scope`.
fn prepare(scope: GroupScope, mut address: ScanGroupAddress) -> Result<ScanGroupAddress> {
    address.ensure_hash();
    address
        .validate()
        .map_err(|source| CoordError::InvalidAddress {
            hash: address.address_hash.clone(),
            source,
        })?;
    address.org_id = scope.org_id;
    address.group_id = scope.group_id;
    Ok(address)
}

impl WorkQueue {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Enqueues a batch in one transaction. A batch containing an item with
    /// neither host nor IP is rejected before anything is written.
    pub async fn put_addresses(
        &self,
        scope: GroupScope,
        addresses: &[ScanGroupAddress],
    ) -> Result<()> {
        let prepared = addresses
            .iter()
            .cloned()
            .map(|address| prepare(scope, address))
            .collect::<Result<Vec<_>>>()?;
        self.enqueue(scope, prepared).await
    }

    /// Same as [`WorkQueue::put_addresses`] for a batch keyed by hash. The
    /// map keys are not trusted; each item's own hash is used.
    pub async fn put_address_map(
        &self,
        scope: GroupScope,
        addresses: &AddressMap,
    ) -> Result<()> {
        let prepared = addresses
            .values()
            .cloned()
            .map(|address| prepare(scope, address))
            .collect::<Result<Vec<_>>>()?;
        self.enqueue(scope, prepared).await
    }

    async fn enqueue(
        &self,
        scope: GroupScope,
        addresses: Vec<ScanGroupAddress>,
    ) -> Result<()> {
        if addresses.is_empty() {
            return Ok(());
        }

        let keys = GroupKeys::new(scope);
        let hashes: Vec<String> = addresses
            .iter()
            .map(|address| address.address_hash.clone())
            .collect();

        let mut commands = Vec::with_capacity(addresses.len() + 2);
        commands.push(Command::SAdd {
            key: keys.addr_queue(),
            members: hashes.clone(),
        });
        commands.push(Command::SAdd {
            key: keys.addr_known(),
            members: hashes,
        });
        for address in &addresses {
            commands.push(Command::HSet {
                key: keys.addr(&address.address_hash),
                fields: fields::encode(address),
            });
        }

        self.store
            .transact(commands)
            .await
            .op("queue.put_addresses")?;
        debug!(%scope, count = addresses.len(), "enqueued addresses");
        Ok(())
    }

    /// Removes up to `limit` arbitrary items from the pending set and returns
    /// their records. Records that vanished, fail to decode or belong to
    /// another group (a race with a concurrent delete) are dropped, so one
    /// bad record never costs the rest of the batch.
    pub async fn pop_addresses(
        &self,
        scope: GroupScope,
        limit: usize,
    ) -> Result<AddressMap> {
        if limit == 0 {
            return Ok(AddressMap::new());
        }

        let keys = GroupKeys::new(scope);
        let hashes = self
            .store
            .spop(&keys.addr_queue(), limit)
            .await
            .op("queue.pop_addresses")?;
        if hashes.is_empty() {
            return Ok(AddressMap::new());
        }

        let reads = hashes
            .iter()
            .map(|hash| Read::Hash(keys.addr(hash)))
            .collect();
        let replies = self
            .store
            .snapshot(reads)
            .await
            .op("queue.pop_addresses.read")?;

        let mut popped = AddressMap::with_capacity(hashes.len());
        for (hash, reply) in hashes.into_iter().zip(replies) {
            let Some(record) = reply.into_hash() else {
                warn!(%scope, %hash, "popped address read back as a list, skipping");
                continue;
            };
            if record.is_empty() {
                warn!(%scope, %hash, "popped address has no record, skipping");
                continue;
            }
            let address: ScanGroupAddress =
                match fields::decode(&keys.addr(&hash), &record) {
                    Ok(address) => address,
                    Err(err) => {
                        warn!(
                            %scope,
                            %hash,
                            error = %err,
                            "popped address record is malformed, skipping"
                        );
                        continue;
                    }
                };
            if address.scope() != scope {
                warn!(
                    %scope,
                    %hash,
                    found = %address.scope(),
                    "popped address belongs to another group, skipping"
                );
                continue;
            }
            popped.insert(hash, address);
        }

        debug!(%scope, count = popped.len(), "popped addresses");
        Ok(popped)
    }

    /// Whether the host/IP pair has ever been enqueued for this group.
    pub async fn exists(&self, scope: GroupScope, host: &str, ip: &str) -> Result<bool> {
        let keys = GroupKeys::new(scope);
        self.store
            .sismember(&keys.addr_known(), &address_hash(ip, host))
            .await
            .op("queue.exists")
    }

    /// Returns the candidates that are not yet known for this group. The
    /// known set is left untouched.
    ///
    /// Set intersection only works between stored sets, so the candidate
    /// hashes are written to a throwaway set first and removed afterwards.
    pub async fn filter_new(
        &self,
        scope: GroupScope,
        candidates: AddressMap,
    ) -> Result<AddressMap> {
        let mut candidates: AddressMap = candidates
            .into_values()
            .map(|mut address| {
                let hash = address.ensure_hash().to_string();
                (hash, address)
            })
            .collect();
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let keys = GroupKeys::new(scope);
        let scratch = keys.addr_filter(&Uuid::new_v4().simple().to_string());

        self.store
            .transact(vec![Command::SAdd {
                key: scratch.clone(),
                members: candidates.keys().cloned().collect(),
            }])
            .await
            .op("queue.filter_new.stage")?;

        let intersection = self.store.sinter(&scratch, &keys.addr_known()).await;
        let cleanup = self
            .store
            .transact(vec![Command::Del(vec![scratch])])
            .await;

        let known = intersection.op("queue.filter_new")?;
        cleanup.op("queue.filter_new.cleanup")?;

        for hash in &known {
            candidates.remove(hash);
        }
        debug!(%scope, known = known.len(), new = candidates.len(), "filtered candidates");
        Ok(candidates)
    }

    /// Number of items waiting to be popped.
    pub async fn pending_count(&self, scope: GroupScope) -> Result<u64> {
        self.store
            .scard(&GroupKeys::new(scope).addr_queue())
            .await
            .op("queue.pending_count")
    }

    /// Number of distinct addresses ever enqueued.
    pub async fn known_count(&self, scope: GroupScope) -> Result<u64> {
        self.store
            .scard(&GroupKeys::new(scope).addr_known())
            .await
            .op("queue.known_count")
    }
}
