//! "Do this at most once per window" gates shared by the scanning modules.
//!
//! A lease is a key created with set-if-absent and a server-side expiry. The
//! caller that creates it is admitted; everyone else skips the work until the
//! key expires. Leases carry no owner, only their creation time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use scanmesh_model::{GroupScope, Phase};
use tracing::debug;

use crate::error::{Result, StoreResultExt};
use crate::keys::GroupKeys;
use crate::store::Store;

/// Outcome of a bounded ETLD admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EtldAdmission {
    /// Brute operations recorded for the ETLD after this call.
    pub count: u64,
    pub admitted: bool,
}

#[derive(Clone)]
pub struct Admission {
    store: Arc<dyn Store>,
}

impl fmt::Debug for Admission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Admission").finish()
    }
}

/// Leases are kept in whole seconds, never shorter than one.
fn lease_ttl(ttl: Duration) -> Duration {
    Duration::from_secs(ttl.as_secs().max(1))
}

impl Admission {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Tries to take the lease for `phase` on `zone`. Returns `true` when this
    /// caller is the first within the window.
    pub async fn try_admit(
        &self,
        scope: GroupScope,
        phase: Phase,
        zone: &str,
        ttl: Duration,
    ) -> Result<bool> {
        let key = GroupKeys::new(scope).lease(phase, zone);
        let stamp = Utc::now().timestamp().to_string();
        let admitted = self
            .store
            .set_nx_ex(&key, &stamp, lease_ttl(ttl))
            .await
            .op("admission.try_admit")?;
        debug!(%scope, %phase, zone, admitted, "lease attempt");
        Ok(admitted)
    }

    pub async fn do_ns_records(&self, scope: GroupScope, zone: &str, ttl: Duration) -> Result<bool> {
        self.try_admit(scope, Phase::NsLookup, zone, ttl).await
    }

    pub async fn do_brute_zone(&self, scope: GroupScope, zone: &str, ttl: Duration) -> Result<bool> {
        self.try_admit(scope, Phase::BruteZone, zone, ttl).await
    }

    pub async fn do_mutate_zone(&self, scope: GroupScope, zone: &str, ttl: Duration) -> Result<bool> {
        self.try_admit(scope, Phase::MutateZone, zone, ttl).await
    }

    pub async fn do_web_analyze(&self, scope: GroupScope, zone: &str, ttl: Duration) -> Result<bool> {
        self.try_admit(scope, Phase::WebAnalyze, zone, ttl).await
    }

    /// Certificate-transparency lookups share the bigdata lease namespace.
    pub async fn do_ct_lookup(&self, scope: GroupScope, zone: &str, ttl: Duration) -> Result<bool> {
        self.try_admit(scope, Phase::BigdataLookup, zone, ttl).await
    }

    pub async fn do_port_scan(&self, scope: GroupScope, zone: &str, ttl: Duration) -> Result<bool> {
        self.try_admit(scope, Phase::PortScan, zone, ttl).await
    }

    /// Admits up to `max` brute operations per ETLD while the counter lives.
    /// The length check and the append happen in one atomic store step, so
    /// concurrent callers never push the counter past `max`.
    pub async fn do_brute_etld(
        &self,
        scope: GroupScope,
        etld: &str,
        ttl: Duration,
        max: u64,
    ) -> Result<EtldAdmission> {
        let key = GroupKeys::new(scope).brute_etld(etld);
        let stamp = Utc::now().timestamp().to_string();
        let (count, admitted) = self
            .store
            .push_capped(&key, &stamp, max, lease_ttl(ttl))
            .await
            .op("admission.brute_etld")?;

        if admitted {
            debug!(%scope, etld, count, max, "brute etld admitted");
        } else {
            debug!(%scope, etld, count, max, "brute etld at capacity");
        }
        Ok(EtldAdmission { count, admitted })
    }
}
