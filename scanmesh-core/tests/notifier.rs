mod support;

use std::time::Duration;

use scanmesh_core::{CONFIG_CHANNEL, GroupKeys, parse_config_key};
use scanmesh_model::GroupScope;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use support::{memory_client, sample_group};

#[tokio::test]
async fn put_announces_the_config_key() {
    let (_store, client) = memory_client();
    let scope = GroupScope::new(1, 1);
    let cancel = CancellationToken::new();
    let (started_tx, started_rx) = oneshot::channel();
    let (message_tx, mut message_rx) = mpsc::unbounded_channel();

    let notifier = client.notifier().clone();
    let token = cancel.clone();
    let subscriber = tokio::spawn(async move {
        notifier
            .subscribe_group_changes(
                token,
                move || {
                    let _ = started_tx.send(());
                },
                move |channel, payload| {
                    let _ = message_tx.send((channel.to_string(), payload.to_string()));
                },
            )
            .await
    });

    started_rx.await.expect("subscription started");
    client.groups().put(&sample_group(scope)).await.expect("put");

    let (channel, payload) = tokio::time::timeout(Duration::from_secs(5), message_rx.recv())
        .await
        .expect("message in time")
        .expect("message");
    assert_eq!(channel, CONFIG_CHANNEL);
    assert_eq!(payload, GroupKeys::new(scope).config());
    assert_eq!(parse_config_key(&payload), Some(scope));

    cancel.cancel();
    subscriber
        .await
        .expect("subscriber task")
        .expect("clean shutdown");
    assert!(message_rx.try_recv().is_err(), "exactly one message expected");
}

#[tokio::test]
async fn status_changes_are_not_announced() {
    let (_store, client) = memory_client();
    let scope = GroupScope::new(1, 2);
    client.groups().put(&sample_group(scope)).await.expect("put");

    let cancel = CancellationToken::new();
    let (started_tx, started_rx) = oneshot::channel();
    let (message_tx, mut message_rx) = mpsc::unbounded_channel::<String>();
    let notifier = client.notifier().clone();
    let token = cancel.clone();
    let subscriber = tokio::spawn(async move {
        notifier
            .subscribe_group_changes(
                token,
                move || {
                    let _ = started_tx.send(());
                },
                move |_, payload| {
                    let _ = message_tx.send(payload.to_string());
                },
            )
            .await
    });

    started_rx.await.expect("subscription started");
    client.groups().start(scope).await.expect("start");
    client.groups().stop(scope).await.expect("stop");
    client
        .notifier()
        .publish(CONFIG_CHANNEL, "marker")
        .await
        .expect("publish");

    let first = tokio::time::timeout(Duration::from_secs(5), message_rx.recv())
        .await
        .expect("message in time")
        .expect("message");
    assert_eq!(first, "marker");

    cancel.cancel();
    subscriber
        .await
        .expect("subscriber task")
        .expect("clean shutdown");
}

#[tokio::test]
async fn cancelled_before_any_message_returns_ok() {
    let (_store, client) = memory_client();
    let cancel = CancellationToken::new();
    cancel.cancel();
    client
        .notifier()
        .subscribe(cancel, || {}, |_, _| {}, &["scanmesh:test"])
        .await
        .expect("cancelled subscription");
}
