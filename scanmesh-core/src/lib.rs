//! # scanmesh core
//!
//! The group coordination store shared by the scanmesh dispatcher and its
//! fleet of stateless module workers.
//!
//! ## Overview
//!
//! - [`keys`]: the only place store keys are built; every key is scoped to
//!   an `<org>:<group>` prefix
//! - [`group`]: transactional scan group configuration and run status
//! - [`queue`]: unordered, at-most-once address work queue with dedup
//! - [`admission`]: per-phase, per-zone lease gates and the bounded ETLD
//!   counter
//! - [`notify`]: live broadcast of configuration changes
//! - [`store`]: the backing-store trait with Redis and in-memory
//!   implementations
//!
//! No component retries internally; failures are returned tagged with the
//! operation that hit them and retry policy stays with the caller.
//!
//! ## Examples
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use scanmesh_core::CoordinationClient;
//! use scanmesh_model::GroupScope;
//!
//! async fn analyze_zone(client: &CoordinationClient) -> scanmesh_core::Result<()> {
//!     let scope = GroupScope::new(1, 1);
//!     if client
//!         .admission()
//!         .do_ns_records(scope, "example.com", Duration::from_secs(600))
//!         .await?
//!     {
//!         // first worker in the window: run the NS analysis
//!     }
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod admission;
pub mod client;
pub mod error;
mod fields;
pub mod group;
pub mod keys;
pub mod notify;
pub mod queue;
pub mod store;

pub use admission::{Admission, EtldAdmission};
pub use client::CoordinationClient;
pub use error::{CoordError, Result, StoreError, StoreResult};
pub use group::GroupStore;
pub use keys::{CONFIG_CHANNEL, GroupKeys, parse_config_key};
pub use notify::ChangeNotifier;
pub use queue::{AddressMap, WorkQueue};
pub use store::{MemoryStore, Store};
