#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use scanmesh_core::{CoordinationClient, MemoryStore};
use scanmesh_model::{
    BruteModuleConfig, GroupScope, KeywordModuleConfig, ModuleConfigurations,
    NsModuleConfig, PortModuleConfig, ScanGroup, ScanGroupAddress,
    WebModuleConfig,
};

pub fn memory_client() -> (Arc<MemoryStore>, CoordinationClient) {
    let store = Arc::new(MemoryStore::new());
    let client = CoordinationClient::new(store.clone());
    (store, client)
}

fn millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).expect("valid timestamp")
}

pub fn sample_group(scope: GroupScope) -> ScanGroup {
    ScanGroup {
        org_id: scope.org_id,
        group_id: scope.group_id,
        group_name: format!("group-{}", scope.group_id),
        creation_time: millis(1_700_000_000_000),
        created_by: "alice@example.com".into(),
        created_by_id: 3,
        modified_by: "bob@example.com".into(),
        modified_by_id: 4,
        modified_time: millis(1_700_000_360_500),
        original_input_url: "s3://inputs/group.txt".into(),
        paused: false,
        deleted: false,
        last_paused_time: None,
        archive_after_days: 5,
        modules: Some(ModuleConfigurations {
            ns: NsModuleConfig {
                requests_per_second: 50,
            },
            brute: BruteModuleConfig {
                requests_per_second: 30,
                max_depth: 2,
                custom_subnames: vec!["dev".into(), "staging".into(), "vpn".into()],
            },
            port: PortModuleConfig {
                requests_per_second: 100,
                port_scan_enabled: true,
                custom_ports: vec![22, 443, 8443],
                custom_web_ports: vec![80, 8080],
                allowed_tlds: vec!["example.com".into()],
                allowed_hosts: vec!["api.example.com".into()],
                disallowed_tlds: vec!["cdn.net".into()],
                disallowed_hosts: vec![],
            },
            web: WebModuleConfig {
                requests_per_second: 10,
                max_links: 5,
                take_screenshots: true,
                extract_js: true,
                fingerprint_frameworks: false,
            },
            keyword: KeywordModuleConfig {
                keywords: vec!["acme".into(), "secret project".into()],
            },
        }),
    }
}

pub fn address(scope: GroupScope, host: &str, ip: &str) -> ScanGroupAddress {
    let mut addr = ScanGroupAddress::new(scope, host, ip);
    addr.discovered_by = "input_list".into();
    addr.discovery_time = Some(millis(1_700_000_000_000));
    addr.confidence_score = 100.0;
    addr
}

pub fn addresses(scope: GroupScope, count: usize) -> Vec<ScanGroupAddress> {
    (0..count)
        .map(|i| {
            address(
                scope,
                &format!("host{i}.example.com"),
                &format!("10.0.{}.{}", i / 250, i % 250 + 1),
            )
        })
        .collect()
}
