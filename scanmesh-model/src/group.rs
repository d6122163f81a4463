use chrono::{DateTime, Utc};

use crate::error::{ModelError, Result};
use crate::ids::{GroupId, GroupScope, OrgId};

/// A tenant-submitted collection of hosts and IPs plus the settings each
/// scanning module applies to them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanGroup {
    pub org_id: OrgId,
    pub group_id: GroupId,
    pub group_name: String,
    pub creation_time: DateTime<Utc>,
    pub created_by: String,
    pub created_by_id: i32,
    pub modified_by: String,
    pub modified_by_id: i32,
    pub modified_time: DateTime<Utc>,
    pub original_input_url: String,
    pub paused: bool,
    pub deleted: bool,
    pub last_paused_time: Option<DateTime<Utc>>,
    pub archive_after_days: i32,
    /// `None` when the group was loaded without its module settings.
    pub modules: Option<ModuleConfigurations>,
}

impl ScanGroup {
    pub fn scope(&self) -> GroupScope {
        GroupScope {
            org_id: self.org_id,
            group_id: self.group_id,
        }
    }

    /// Checks the invariants a group must satisfy before it is persisted
    /// and returns the module settings the write needs.
    pub fn persistable_modules(&self) -> Result<&ModuleConfigurations> {
        if self.group_name.trim().is_empty() {
            return Err(ModelError::InvalidGroup("group name is empty".into()));
        }
        self.modules.as_ref().ok_or_else(|| {
            ModelError::InvalidGroup(format!(
                "group {} has no module configuration",
                self.scope()
            ))
        })
    }
}

/// The five per-module sub-configurations of a scan group.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModuleConfigurations {
    pub ns: NsModuleConfig,
    pub brute: BruteModuleConfig,
    pub port: PortModuleConfig,
    pub web: WebModuleConfig,
    pub keyword: KeywordModuleConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NsModuleConfig {
    pub requests_per_second: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BruteModuleConfig {
    pub requests_per_second: i32,
    pub max_depth: i32,
    /// Extra labels tried in addition to the built-in wordlist.
    pub custom_subnames: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortModuleConfig {
    pub requests_per_second: i32,
    pub port_scan_enabled: bool,
    pub custom_ports: Vec<i32>,
    pub custom_web_ports: Vec<i32>,
    pub allowed_tlds: Vec<String>,
    pub allowed_hosts: Vec<String>,
    pub disallowed_tlds: Vec<String>,
    pub disallowed_hosts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WebModuleConfig {
    pub requests_per_second: i32,
    pub max_links: i32,
    pub take_screenshots: bool,
    pub extract_js: bool,
    pub fingerprint_frameworks: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeywordModuleConfig {
    pub keywords: Vec<String>,
}
