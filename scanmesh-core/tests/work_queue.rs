mod support;

use std::collections::HashSet;

use chrono::Utc;
use scanmesh_core::store::Command;
use scanmesh_core::{AddressMap, CoordError, GroupKeys, MemoryStore, Store};
use scanmesh_model::{GroupScope, ScanGroupAddress, address_hash};

use support::{address, addresses, memory_client};

fn keyed(items: Vec<ScanGroupAddress>) -> AddressMap {
    items
        .into_iter()
        .map(|mut item| (item.ensure_hash().to_string(), item))
        .collect()
}

/// Writes a raw record for `hash` and marks it pending, bypassing validation.
async fn seed_pending(
    store: &MemoryStore,
    scope: GroupScope,
    hash: &str,
    fields: &[(&str, &str)],
) {
    let keys = GroupKeys::new(scope);
    store
        .transact(vec![
            Command::HSet {
                key: keys.addr(hash),
                fields: fields
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
            },
            Command::SAdd {
                key: keys.addr_queue(),
                members: vec![hash.to_string()],
            },
        ])
        .await
        .expect("seed record");
}

#[tokio::test]
async fn popped_items_are_conserved() {
    let (_store, client) = memory_client();
    let queue = client.queue();
    let scope = GroupScope::new(1, 1);
    let batch = addresses(scope, 25);
    queue
        .put_address_map(scope, &keyed(batch.clone()))
        .await
        .expect("enqueue");
    assert_eq!(queue.pending_count(scope).await.expect("pending"), 25);

    let mut seen = HashSet::new();
    loop {
        let popped = queue.pop_addresses(scope, 7).await.expect("pop");
        if popped.is_empty() {
            break;
        }
        assert!(popped.len() <= 7);
        for (hash, item) in popped {
            assert_eq!(item.address_hash, hash);
            assert_eq!(item.scope(), scope);
            assert!(seen.insert(hash), "item delivered twice");
        }
    }

    let expected: HashSet<String> = batch
        .iter()
        .map(|item| address_hash(&item.ip_address, &item.host_address))
        .collect();
    assert_eq!(seen, expected);
    assert_eq!(queue.pending_count(scope).await.expect("pending"), 0);
    assert_eq!(queue.known_count(scope).await.expect("known"), 25);
}

#[tokio::test]
async fn popped_records_keep_their_fields() {
    let (_store, client) = memory_client();
    let scope = GroupScope::new(3, 7);
    let mut item = address(scope, "mail.example.com", "192.0.2.10");
    item.is_soa = true;
    item.ns_record = 2;
    item.found_from = "example.com".into();
    client
        .queue()
        .put_addresses(scope, std::slice::from_ref(&item))
        .await
        .expect("enqueue");

    let popped = client.queue().pop_addresses(scope, 10).await.expect("pop");
    let hash = address_hash("192.0.2.10", "mail.example.com");
    let stored = popped.get(&hash).expect("popped item");
    assert!(stored.is_soa);
    assert_eq!(stored.ns_record, 2);
    assert_eq!(stored.found_from, "example.com");
    assert_eq!(stored.discovery_time, item.discovery_time);
}

#[tokio::test]
async fn pop_on_empty_queue_returns_nothing() {
    let (_store, client) = memory_client();
    let scope = GroupScope::new(1, 1);
    assert!(client.queue().pop_addresses(scope, 10).await.expect("pop").is_empty());
    assert!(client.queue().pop_addresses(scope, 0).await.expect("pop").is_empty());
}

#[tokio::test]
async fn enqueue_stamps_the_target_scope() {
    let (_store, client) = memory_client();
    let scope = GroupScope::new(4, 4);
    let foreign = address(GroupScope::new(8, 8), "a.example.com", "10.1.1.1");
    client
        .queue()
        .put_addresses(scope, &[foreign])
        .await
        .expect("enqueue");

    let popped = client.queue().pop_addresses(scope, 5).await.expect("pop");
    assert_eq!(popped.len(), 1);
    assert!(popped.values().all(|item| item.scope() == scope));
}

#[tokio::test]
async fn batch_with_an_empty_address_is_rejected_whole() {
    let (store, client) = memory_client();
    let scope = GroupScope::new(1, 1);
    let mut batch = addresses(scope, 3);
    batch.push(ScanGroupAddress::new(scope, "", ""));

    let err = client
        .queue()
        .put_addresses(scope, &batch)
        .await
        .expect_err("empty address");
    assert!(matches!(err, CoordError::InvalidAddress { .. }));
    assert_eq!(store.key_count().await, 0);
}

#[tokio::test]
async fn known_addresses_are_filtered_and_known_set_is_unchanged() {
    let (store, client) = memory_client();
    let queue = client.queue();
    let scope = GroupScope::new(2, 2);

    let known = addresses(scope, 4);
    queue.put_addresses(scope, &known).await.expect("enqueue");
    let keys_before = store.key_count().await;

    let fresh = address(scope, "new.example.com", "10.9.9.9");
    let mut candidates = keyed(known.clone());
    candidates.extend(keyed(vec![fresh]));

    let remaining = queue.filter_new(scope, candidates).await.expect("filter");
    assert_eq!(remaining.len(), 1);
    assert!(remaining.contains_key(&address_hash("10.9.9.9", "new.example.com")));

    assert_eq!(queue.known_count(scope).await.expect("known"), 4);
    assert!(!queue.exists(scope, "new.example.com", "10.9.9.9").await.expect("exists"));
    assert_eq!(store.key_count().await, keys_before, "scratch set must be removed");
}

#[tokio::test]
async fn known_set_survives_pop() {
    let (_store, client) = memory_client();
    let queue = client.queue();
    let scope = GroupScope::new(2, 3);
    let item = address(scope, "www.example.com", "198.51.100.4");

    assert!(!queue.exists(scope, "www.example.com", "198.51.100.4").await.expect("exists"));
    queue.put_addresses(scope, &[item.clone()]).await.expect("enqueue");
    queue.pop_addresses(scope, 10).await.expect("pop");

    assert!(queue.exists(scope, "www.example.com", "198.51.100.4").await.expect("exists"));
    let remaining = queue
        .filter_new(scope, keyed(vec![item]))
        .await
        .expect("filter");
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn map_keys_are_recomputed_from_items() {
    let (_store, client) = memory_client();
    let scope = GroupScope::new(6, 1);
    let item = address(scope, "db.example.com", "10.2.2.2");
    let mut map = AddressMap::new();
    map.insert("bogus".into(), item);

    client.queue().put_address_map(scope, &map).await.expect("enqueue");
    let popped = client.queue().pop_addresses(scope, 5).await.expect("pop");
    assert!(popped.contains_key(&address_hash("10.2.2.2", "db.example.com")));
    assert!(!popped.contains_key("bogus"));
}

#[tokio::test]
async fn queues_are_isolated_per_group() {
    let (_store, client) = memory_client();
    let first = GroupScope::new(1, 1);
    let second = GroupScope::new(1, 11);
    client
        .queue()
        .put_addresses(first, &addresses(first, 3))
        .await
        .expect("enqueue");

    assert!(client.queue().pop_addresses(second, 10).await.expect("pop").is_empty());
    assert_eq!(client.queue().pending_count(first).await.expect("pending"), 3);
}

#[tokio::test]
async fn malformed_record_does_not_cost_the_batch() {
    let (store, client) = memory_client();
    let queue = client.queue();
    let scope = GroupScope::new(1, 1);
    queue
        .put_addresses(scope, &addresses(scope, 5))
        .await
        .expect("enqueue");
    seed_pending(
        &store,
        scope,
        "garbled",
        &[("org_id", "1"), ("group_id", "1"), ("is_soa", "maybe")],
    )
    .await;

    let popped = queue.pop_addresses(scope, 100).await.expect("pop");
    assert_eq!(popped.len(), 5);
    assert!(!popped.contains_key("garbled"));
    assert_eq!(queue.pending_count(scope).await.expect("pending"), 0);
}

#[tokio::test]
async fn record_from_another_group_is_skipped() {
    let (store, client) = memory_client();
    let queue = client.queue();
    let scope = GroupScope::new(1, 1);
    queue
        .put_addresses(scope, &addresses(scope, 3))
        .await
        .expect("enqueue");
    seed_pending(
        &store,
        scope,
        "stray",
        &[
            ("org_id", "1"),
            ("group_id", "2"),
            ("host_address", "stray.example.com"),
        ],
    )
    .await;

    let popped = queue.pop_addresses(scope, 100).await.expect("pop");
    assert_eq!(popped.len(), 3);
    assert!(!popped.contains_key("stray"));
    assert!(popped.values().all(|item| item.scope() == scope));
    assert_eq!(queue.pending_count(scope).await.expect("pending"), 0);
}

#[tokio::test]
async fn popped_times_keep_full_precision() {
    let (_store, client) = memory_client();
    let scope = GroupScope::new(3, 8);
    let mut item = address(scope, "scan.example.com", "192.0.2.77");
    item.last_seen_time = Some(Utc::now());
    item.last_scanned_time = Some(Utc::now());
    client
        .queue()
        .put_addresses(scope, std::slice::from_ref(&item))
        .await
        .expect("enqueue");

    let popped = client.queue().pop_addresses(scope, 1).await.expect("pop");
    let stored = popped
        .get(&address_hash("192.0.2.77", "scan.example.com"))
        .expect("popped item");
    assert_eq!(stored.last_seen_time, item.last_seen_time);
    assert_eq!(stored.last_scanned_time, item.last_scanned_time);
}
