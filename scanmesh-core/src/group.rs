//! Scan group configuration and run status.

use std::fmt;
use std::sync::Arc;

use scanmesh_model::{
    BruteModuleConfig, GroupScope, GroupStatus, KeywordModuleConfig,
    Module, ModuleConfigurations, NsModuleConfig,
    PortModuleConfig, ScanGroup, WebModuleConfig,
};
use tracing::{debug, info};

use crate::error::{CoordError, Result, StoreResultExt};
use crate::fields::{self, ModuleRecord};
use crate::keys::{CONFIG_CHANNEL, GroupKeys};
use crate::store::{Command, Read, Reply, Store};

#[derive(Clone)]
pub struct GroupStore {
    store: Arc<dyn Store>,
}

impl fmt::Debug for GroupStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupStore").finish()
    }
}

fn module_list_keys<M: ModuleRecord>(keys: &GroupKeys) -> Vec<String> {
    M::LIST_FIELDS
        .iter()
        .map(|field| keys.module_list(M::MODULE, field))
        .collect()
}

fn write_module<M: ModuleRecord>(
    keys: &GroupKeys,
    module: &M,
    commands: &mut Vec<Command>,
) {
    commands.push(Command::HSet {
        key: keys.module_config(M::MODULE),
        fields: fields::encode(module),
    });
    for field in M::LIST_FIELDS {
        let values = module.list_values(field);
        if !values.is_empty() {
            commands.push(Command::RPush {
                key: keys.module_list(M::MODULE, field),
                values,
            });
        }
    }
}

fn read_module_requests<M: ModuleRecord>(keys: &GroupKeys, reads: &mut Vec<Read>) {
    reads.push(Read::Hash(keys.module_config(M::MODULE)));
    for field in M::LIST_FIELDS {
        reads.push(Read::List(keys.module_list(M::MODULE, field)));
    }
}

fn next_reply(
    key: &str,
    replies: &mut impl Iterator<Item = Reply>,
) -> Result<Reply> {
    replies
        .next()
        .ok_or_else(|| CoordError::decode(key, "snapshot reply missing"))
}

fn assemble_module<M: ModuleRecord>(
    keys: &GroupKeys,
    replies: &mut impl Iterator<Item = Reply>,
) -> Result<M> {
    let key = keys.module_config(M::MODULE);
    let hash = next_reply(&key, replies)?
        .into_hash()
        .ok_or_else(|| CoordError::decode(&key, "expected a hash reply"))?;
    let mut module: M = fields::decode(&key, &hash)?;
    for field in M::LIST_FIELDS {
        let values = next_reply(&key, replies)?.into_list().ok_or_else(|| {
            CoordError::decode(&key, format!("expected a list reply for {field}"))
        })?;
        module.set_list(&key, field, values)?;
    }
    Ok(module)
}

impl GroupStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Writes the whole configuration as one transaction, resets the status
    /// to stopped and announces the change on [`CONFIG_CHANNEL`].
    pub async fn put(&self, group: &ScanGroup) -> Result<()> {
        let modules = group
            .persistable_modules()
            .map_err(CoordError::InvalidGroup)?;

        let keys = GroupKeys::new(group.scope());
        let config_key = keys.config();

        let mut stale = vec![config_key.clone()];
        for module in Module::ALL {
            stale.push(keys.module_config(module));
        }
        stale.extend(module_list_keys::<NsModuleConfig>(&keys));
        stale.extend(module_list_keys::<BruteModuleConfig>(&keys));
        stale.extend(module_list_keys::<PortModuleConfig>(&keys));
        stale.extend(module_list_keys::<WebModuleConfig>(&keys));
        stale.extend(module_list_keys::<KeywordModuleConfig>(&keys));

        let mut commands = vec![
            Command::Del(stale),
            Command::HSet {
                key: config_key.clone(),
                fields: fields::encode(group),
            },
        ];
        write_module(&keys, &modules.ns, &mut commands);
        write_module(&keys, &modules.brute, &mut commands);
        write_module(&keys, &modules.port, &mut commands);
        write_module(&keys, &modules.web, &mut commands);
        write_module(&keys, &modules.keyword, &mut commands);
        commands.push(Command::Set {
            key: keys.status(),
            value: GroupStatus::Stopped.as_str().to_string(),
        });
        commands.push(Command::Publish {
            channel: CONFIG_CHANNEL.to_string(),
            payload: config_key,
        });

        self.store.transact(commands).await.op("group.put")?;
        info!(scope = %group.scope(), name = %group.group_name, "stored scan group configuration");
        Ok(())
    }

    /// Loads the primary record and, when `want_modules` is set, all five
    /// module configurations from a single consistent snapshot.
    pub async fn get_group(
        &self,
        scope: GroupScope,
        want_modules: bool,
    ) -> Result<ScanGroup> {
        let keys = GroupKeys::new(scope);
        let config_key = keys.config();

        let mut reads = vec![Read::Hash(config_key.clone())];
        if want_modules {
            read_module_requests::<NsModuleConfig>(&keys, &mut reads);
            read_module_requests::<BruteModuleConfig>(&keys, &mut reads);
            read_module_requests::<PortModuleConfig>(&keys, &mut reads);
            read_module_requests::<WebModuleConfig>(&keys, &mut reads);
            read_module_requests::<KeywordModuleConfig>(&keys, &mut reads);
        }

        let replies = self.store.snapshot(reads).await.op("group.get")?;
        let mut replies = replies.into_iter();

        let primary = next_reply(&config_key, &mut replies)?
            .into_hash()
            .ok_or_else(|| CoordError::decode(&config_key, "expected a hash reply"))?;
        if primary.is_empty() {
            return Err(CoordError::GroupNotFound(scope));
        }

        let mut group: ScanGroup = fields::decode(&config_key, &primary)?;
        if want_modules {
            group.modules = Some(ModuleConfigurations {
                ns: assemble_module(&keys, &mut replies)?,
                brute: assemble_module(&keys, &mut replies)?,
                port: assemble_module(&keys, &mut replies)?,
                web: assemble_module(&keys, &mut replies)?,
                keyword: assemble_module(&keys, &mut replies)?,
            });
        }

        debug!(%scope, want_modules, "loaded scan group");
        Ok(group)
    }

    /// Returns whether a status record exists and the status it holds. A
    /// missing record reads as `(false, Stopped)`.
    pub async fn group_status(&self, scope: GroupScope) -> Result<(bool, GroupStatus)> {
        let key = GroupKeys::new(scope).status();
        let raw = self.store.get(&key).await.op("group.status")?;
        match raw {
            None => Ok((false, GroupStatus::Stopped)),
            Some(raw) => raw
                .parse::<GroupStatus>()
                .map(|status| (true, status))
                .map_err(|err| CoordError::decode(&key, err.to_string())),
        }
    }

    pub async fn start(&self, scope: GroupScope) -> Result<()> {
        self.set_status(scope, GroupStatus::Started, "group.start").await
    }

    pub async fn stop(&self, scope: GroupScope) -> Result<()> {
        self.set_status(scope, GroupStatus::Stopped, "group.stop").await
    }

    async fn set_status(
        &self,
        scope: GroupScope,
        status: GroupStatus,
        op: &'static str,
    ) -> Result<()> {
        self.store
            .transact(vec![Command::Set {
                key: GroupKeys::new(scope).status(),
                value: status.as_str().to_string(),
            }])
            .await
            .op(op)?;
        debug!(%scope, %status, "updated group status");
        Ok(())
    }

    /// Removes every key in the group's namespace.
    ///
    /// The enumeration and the delete are two steps: keys written by a
    /// concurrent writer between them survive. The delete itself is one
    /// transaction, so readers never see half of the enumerated keys gone.
    pub async fn delete(&self, scope: GroupScope) -> Result<usize> {
        let keys = GroupKeys::new(scope);
        let doomed = self
            .store
            .scan_prefix(&keys.namespace())
            .await
            .op("group.delete.scan")?;
        if doomed.is_empty() {
            debug!(%scope, "nothing to delete");
            return Ok(0);
        }

        let count = doomed.len();
        self.store
            .transact(vec![Command::Del(doomed)])
            .await
            .op("group.delete")?;
        info!(%scope, keys = count, "deleted scan group");
        Ok(count)
    }
}
