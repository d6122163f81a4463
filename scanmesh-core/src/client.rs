use std::fmt;
use std::sync::Arc;

use crate::admission::Admission;
use crate::group::GroupStore;
use crate::notify::ChangeNotifier;
use crate::queue::WorkQueue;
use crate::store::{MemoryStore, Store};

/// Bundles every coordination component over one shared store handle.
#[derive(Clone)]
pub struct CoordinationClient {
    store: Arc<dyn Store>,
    groups: GroupStore,
    queue: WorkQueue,
    admission: Admission,
    notifier: ChangeNotifier,
}

impl fmt::Debug for CoordinationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinationClient").finish_non_exhaustive()
    }
}

impl CoordinationClient {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            groups: GroupStore::new(Arc::clone(&store)),
            queue: WorkQueue::new(Arc::clone(&store)),
            admission: Admission::new(Arc::clone(&store)),
            notifier: ChangeNotifier::new(Arc::clone(&store)),
            store,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    #[cfg(feature = "redis")]
    pub async fn connect_redis(
        redis_url: &str,
        options: crate::store::RedisStoreOptions,
    ) -> crate::Result<Self> {
        use crate::error::StoreResultExt;

        let store = crate::store::RedisStore::connect(redis_url, options)
            .await
            .op("connect")?;
        Ok(Self::new(Arc::new(store)))
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn groups(&self) -> &GroupStore {
        &self.groups
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    pub fn admission(&self) -> &Admission {
        &self.admission
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}
