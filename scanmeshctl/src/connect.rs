use std::time::Duration;

use anyhow::{Result, anyhow};
use rand::Rng;
use scanmesh_config::Config;
use scanmesh_core::CoordinationClient;
use tracing::{info, warn};

const BASE_DELAY: Duration = Duration::from_millis(250);
const MAX_DELAY: Duration = Duration::from_secs(8);

/// Exponential delay for the given retry (0-based), capped at [`MAX_DELAY`],
/// before jitter.
pub fn backoff_delay(retry: u32) -> Duration {
    let factor = 1u32.checked_shl(retry.min(16)).unwrap_or(u32::MAX);
    BASE_DELAY.saturating_mul(factor).min(MAX_DELAY)
}

/// Adds up to half of `delay` again so a fleet restarting together spreads out.
fn with_jitter(delay: Duration) -> Duration {
    let spread = delay.as_millis() as u64 / 2;
    let extra = rand::rng().random_range(0..=spread);
    delay + Duration::from_millis(extra)
}

pub async fn connect_with_backoff(config: &Config) -> Result<CoordinationClient> {
    let url = config.redis.connection_url();
    let attempts = config.connect_attempts.max(1);

    for attempt in 1..=attempts {
        match CoordinationClient::connect_redis(url, config.redis.store_options())
            .await
        {
            Ok(client) => {
                info!(url = %config.redis.redacted_url(), attempt, "connected");
                return Ok(client);
            }
            Err(err) if attempt < attempts => {
                let delay = with_jitter(backoff_delay(attempt - 1));
                warn!(
                    error = %err,
                    attempt,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    "coordination store unavailable, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                return Err(anyhow!(err).context(format!(
                    "could not reach {} after {attempts} attempts",
                    config.redis.redacted_url()
                )));
            }
        }
    }

    Err(anyhow!("no connection attempts configured"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_then_caps() {
        assert_eq!(backoff_delay(0), Duration::from_millis(250));
        assert_eq!(backoff_delay(1), Duration::from_millis(500));
        assert_eq!(backoff_delay(3), Duration::from_secs(2));
        assert_eq!(backoff_delay(10), MAX_DELAY);
        assert_eq!(backoff_delay(40), MAX_DELAY);
    }

    #[test]
    fn jitter_stays_within_half_the_delay() {
        for _ in 0..100 {
            let jittered = with_jitter(Duration::from_secs(2));
            assert!(jittered >= Duration::from_secs(2));
            assert!(jittered <= Duration::from_secs(3));
        }
    }
}
