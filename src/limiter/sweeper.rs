use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::interval};
use tracing::{debug, warn};

use super::Limiter;

/// Shortest period between sweeps; smaller values, zero included, are raised to it.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Periodically evict windows that elapsed more than `grace` ago, bounding store size.
///
/// A failed sweep is logged and retried on the next tick; it never affects admission.
pub fn spawn(limiter: Arc<Limiter>, every: Duration, grace: Duration) -> JoinHandle<()> {
    let mut sweep_interval = interval(every.max(MIN_SWEEP_INTERVAL));

    tokio::spawn(async move {
        // first tick completes immediately
        sweep_interval.tick().await;

        loop {
            sweep_interval.tick().await;

            match limiter.evict_expired(grace).await {
                Ok(0) => {}
                Ok(evicted) => debug!("Evicted {} expired rate limit windows", evicted),
                Err(e) => warn!("Failed to evict expired rate limit windows: {}", e),
            }
        }
    })
}
