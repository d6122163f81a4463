//! Key-space naming for the coordination store.
//!
//! Every key a component touches is built here and carries the
//! `<org>:<group>:` prefix, so two tenants can never address each other's
//! data and a whole group can be enumerated by prefix.

use scanmesh_model::{GroupId, GroupScope, Module, OrgId, Phase};

/// Broadcast channel carrying the `<org>:<group>:config` key of every group
/// whose configuration was rewritten.
pub const CONFIG_CHANNEL: &str = "scanmesh:group:config";

/// Typed key builder for one (organization, group) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKeys {
    prefix: String,
}

impl GroupKeys {
    pub fn new(scope: GroupScope) -> Self {
        Self {
            prefix: format!("{}:{}", scope.org_id, scope.group_id),
        }
    }

    /// `<org>:<group>`
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Prefix shared by every key of the group, including the trailing `:`.
    pub fn namespace(&self) -> String {
        format!("{}:", self.prefix)
    }

    pub fn config(&self) -> String {
        format!("{}:config", self.prefix)
    }

    pub fn status(&self) -> String {
        format!("{}:status", self.prefix)
    }

    pub fn module_config(&self, module: Module) -> String {
        format!("{}:{}:config", self.prefix, module.as_str())
    }

    pub fn module_list(&self, module: Module, field: &str) -> String {
        format!("{}:{}:config:{}", self.prefix, module.as_str(), field)
    }

    pub fn addr_queue(&self) -> String {
        format!("{}:addr:queue", self.prefix)
    }

    pub fn addr_known(&self) -> String {
        format!("{}:addr:known", self.prefix)
    }

    pub fn addr(&self, hash: &str) -> String {
        format!("{}:addr:{}", self.prefix, hash)
    }

    /// Scratch set used while filtering a candidate batch.
    pub fn addr_filter(&self, token: &str) -> String {
        format!("{}:addr:filter:{}", self.prefix, token)
    }

    pub fn lease(&self, phase: Phase, zone: &str) -> String {
        format!("{}:{}:lease:{}", self.prefix, phase.as_str(), zone)
    }

    pub fn brute_etld(&self, etld: &str) -> String {
        format!("{}:brute:etld:{}", self.prefix, etld)
    }
}

/// Recovers the group scope from a `<org>:<group>:config` notification
/// payload.
pub fn parse_config_key(key: &str) -> Option<GroupScope> {
    let mut parts = key.split(':');
    let org = parts.next()?.parse::<i32>().ok()?;
    let group = parts.next()?.parse::<i32>().ok()?;
    match (parts.next(), parts.next()) {
        (Some("config"), None) => Some(GroupScope {
            org_id: OrgId(org),
            group_id: GroupId(group),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn keys() -> GroupKeys {
        GroupKeys::new(GroupScope::new(7, 42))
    }

    #[test]
    fn keys_carry_group_prefix() {
        let keys = keys();
        assert_eq!(keys.config(), "7:42:config");
        assert_eq!(keys.status(), "7:42:status");
        assert_eq!(keys.module_config(Module::Brute), "7:42:brute:config");
        assert_eq!(
            keys.module_list(Module::Port, "custom_ports"),
            "7:42:port:config:custom_ports"
        );
        assert_eq!(keys.addr_queue(), "7:42:addr:queue");
        assert_eq!(keys.addr_known(), "7:42:addr:known");
        assert_eq!(keys.lease(Phase::NsLookup, "test.org"), "7:42:ns:lease:test.org");
        assert_eq!(keys.brute_etld("example.com"), "7:42:brute:etld:example.com");
    }

    #[test]
    fn purposes_never_collide() {
        let keys = keys();
        let mut seen = HashSet::new();
        let mut all = vec![
            keys.config(),
            keys.status(),
            keys.addr_queue(),
            keys.addr_known(),
            keys.addr("abc"),
            keys.addr_filter("abc"),
            keys.brute_etld("zone"),
        ];
        for module in Module::ALL {
            all.push(keys.module_config(module));
            all.push(keys.module_list(module, "zone"));
        }
        for phase in Phase::ALL {
            all.push(keys.lease(phase, "zone"));
        }
        for key in all {
            assert!(key.starts_with(&keys.namespace()));
            assert!(seen.insert(key.clone()), "duplicate key {key}");
        }
    }

    #[test]
    fn prefix_does_not_match_longer_group_ids() {
        let one = GroupKeys::new(GroupScope::new(1, 1));
        let ten = GroupKeys::new(GroupScope::new(1, 10));
        assert!(!ten.config().starts_with(&one.namespace()));
    }

    #[test]
    fn config_key_round_trips_to_scope() {
        let scope = GroupScope::new(3, 9);
        let key = GroupKeys::new(scope).config();
        assert_eq!(parse_config_key(&key), Some(scope));
        assert_eq!(parse_config_key("3:9:status"), None);
        assert_eq!(parse_config_key("3:9:brute:config"), None);
        assert_eq!(parse_config_key("garbage"), None);
    }
}
