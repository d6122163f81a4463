//! Broadcast of scan group configuration changes.
//!
//! Delivery is live-only: a subscriber that is not connected when a message
//! is published never sees it, and nothing is redelivered.

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{CoordError, Result, StoreError, StoreResultExt};
use crate::keys::CONFIG_CHANNEL;
use crate::store::{Command, Store};

#[derive(Clone)]
pub struct ChangeNotifier {
    store: Arc<dyn Store>,
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier").finish()
    }
}

impl ChangeNotifier {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        self.store
            .transact(vec![Command::Publish {
                channel: channel.to_string(),
                payload: payload.to_string(),
            }])
            .await
            .op("notify.publish")
    }

    /// Runs a subscription until `cancel` fires.
    ///
    /// `on_start` is called once the subscription is live; `on_message`
    /// receives `(channel, payload)` for each message in publish order per
    /// channel. Returns an error if the store closes the subscription.
    pub async fn subscribe<S, M>(
        &self,
        cancel: CancellationToken,
        on_start: S,
        mut on_message: M,
        channels: &[&str],
    ) -> Result<()>
    where
        S: FnOnce() + Send,
        M: FnMut(&str, &str) + Send,
    {
        let channels: Vec<String> =
            channels.iter().map(|channel| channel.to_string()).collect();
        let mut messages = self
            .store
            .subscribe(&channels)
            .await
            .op("notify.subscribe")?;

        info!(?channels, "subscription live");
        on_start();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(?channels, "subscription cancelled");
                    return Ok(());
                }
                message = messages.next() => match message {
                    Some(message) => {
                        debug!(channel = %message.channel, "notification received");
                        on_message(&message.channel, &message.payload);
                    }
                    None => {
                        return Err(CoordError::Store {
                            op: "notify.subscribe",
                            source: StoreError::SubscriptionClosed,
                        });
                    }
                }
            }
        }
    }

    /// Subscribes to the well-known group configuration channel.
    pub async fn subscribe_group_changes<S, M>(
        &self,
        cancel: CancellationToken,
        on_start: S,
        on_message: M,
    ) -> Result<()>
    where
        S: FnOnce() + Send,
        M: FnMut(&str, &str) + Send,
    {
        self.subscribe(cancel, on_start, on_message, &[CONFIG_CHANNEL])
            .await
    }
}
