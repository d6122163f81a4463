use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::{ModelError, Result};
use crate::ids::{GroupId, GroupScope, OrgId};

/// Content hash identifying a host/IP pair inside a group.
///
/// The two parts are separated by a NUL byte so `("1.2.3.4", "x")` and
/// `("1.2.3.4x", "")` never hash alike.
pub fn address_hash(ip_address: &str, host_address: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip_address.as_bytes());
    hasher.update([0u8]);
    hasher.update(host_address.as_bytes());
    hex::encode(hasher.finalize())
}

/// A candidate host/IP pair waiting to be analyzed by the module workers.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanGroupAddress {
    pub address_id: i64,
    pub org_id: OrgId,
    pub group_id: GroupId,
    pub host_address: String,
    pub ip_address: String,
    pub discovery_time: Option<DateTime<Utc>>,
    pub discovered_by: String,
    pub last_scanned_time: Option<DateTime<Utc>>,
    pub last_seen_time: Option<DateTime<Utc>>,
    pub confidence_score: f32,
    pub user_confidence_score: f32,
    pub is_soa: bool,
    pub is_wildcard_zone: bool,
    pub is_hosted_service: bool,
    pub ignored: bool,
    pub found_from: String,
    pub ns_record: i32,
    /// Empty until computed by [`ScanGroupAddress::ensure_hash`].
    pub address_hash: String,
    pub deleted: bool,
}

impl ScanGroupAddress {
    pub fn new(
        scope: GroupScope,
        host_address: impl Into<String>,
        ip_address: impl Into<String>,
    ) -> Self {
        let mut address = Self {
            org_id: scope.org_id,
            group_id: scope.group_id,
            host_address: host_address.into(),
            ip_address: ip_address.into(),
            ..Default::default()
        };
        address.ensure_hash();
        address
    }

    pub fn scope(&self) -> GroupScope {
        GroupScope {
            org_id: self.org_id,
            group_id: self.group_id,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.host_address.is_empty() && self.ip_address.is_empty() {
            return Err(ModelError::MissingAddress);
        }
        Ok(())
    }

    /// Computes the address hash if it has not been set yet and returns it.
    pub fn ensure_hash(&mut self) -> &str {
        if self.address_hash.is_empty() {
            self.address_hash =
                address_hash(&self.ip_address, &self.host_address);
        }
        &self.address_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_separates_fields() {
        let a = address_hash("1.2.3.4", "example.com");
        assert_eq!(a, address_hash("1.2.3.4", "example.com"));
        assert_eq!(a.len(), 64);
        assert_ne!(address_hash("1.2.3.4", "x"), address_hash("1.2.3.4x", ""));
    }

    #[test]
    fn ensure_hash_keeps_existing_value() {
        let mut addr = ScanGroupAddress {
            host_address: "example.com".into(),
            address_hash: "preset".into(),
            ..Default::default()
        };
        assert_eq!(addr.ensure_hash(), "preset");
    }

    #[test]
    fn validate_requires_host_or_ip() {
        let empty = ScanGroupAddress::default();
        assert_eq!(empty.validate(), Err(ModelError::MissingAddress));

        let ip_only = ScanGroupAddress::new(GroupScope::new(1, 1), "", "10.0.0.1");
        assert!(ip_only.validate().is_ok());
    }
}
