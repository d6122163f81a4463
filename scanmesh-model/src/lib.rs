//! Core data model definitions shared across scanmesh crates.
#![allow(missing_docs)]

pub mod address;
pub mod error;
pub mod group;
pub mod ids;
pub mod phase;
pub mod status;

// Intentionally curated re-exports for downstream consumers.
pub use address::{ScanGroupAddress, address_hash};
pub use error::{ModelError, Result as ModelResult};
pub use group::{
    BruteModuleConfig, KeywordModuleConfig, ModuleConfigurations,
    NsModuleConfig, PortModuleConfig, ScanGroup, WebModuleConfig,
};
pub use ids::{GroupId, GroupScope, OrgId};
pub use phase::{Module, Phase};
pub use status::GroupStatus;
