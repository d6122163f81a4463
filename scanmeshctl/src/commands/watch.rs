use anyhow::Result;
use scanmesh_core::{CoordinationClient, parse_config_key};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn run(client: &CoordinationClient) -> Result<()> {
    let cancel = CancellationToken::new();

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
        }
        on_signal.cancel();
    });

    client
        .notifier()
        .subscribe_group_changes(
            cancel,
            || info!("watching for scan group changes, ctrl-c to stop"),
            |channel, payload| match parse_config_key(payload) {
                Some(scope) => println!("{channel}\t{payload}\tgroup {scope} changed"),
                None => println!("{channel}\t{payload}"),
            },
        )
        .await?;
    Ok(())
}
