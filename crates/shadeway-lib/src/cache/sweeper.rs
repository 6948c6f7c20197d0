//! Periodic removal of expired cache entries.
//!
//! The sweeper is bound to a [`CancellationToken`] owned by whoever spawns it,
//! so the service can stop it deterministically on shutdown:
//!
//! ```ignore
//! let shutdown = CancellationToken::new();
//! let sweeper = CacheSweeper::new(Duration::from_secs(300)).with_targets(router.sweep_targets());
//! let handle = tokio::spawn(sweeper.run(shutdown.clone()));
//! // ...
//! shutdown.cancel();
//! handle.await?;
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::Sweep;

/// Default interval between sweeps (five minutes).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Background task that purges expired entries from a set of caches.
pub struct CacheSweeper {
    targets: Vec<Arc<dyn Sweep>>,
    interval: Duration,
}

impl CacheSweeper {
    pub fn new(interval: Duration) -> Self {
        Self {
            targets: Vec::new(),
            interval,
        }
    }

    pub fn with_target(mut self, target: Arc<dyn Sweep>) -> Self {
        self.targets.push(target);
        self
    }

    pub fn with_targets(mut self, targets: impl IntoIterator<Item = Arc<dyn Sweep>>) -> Self {
        self.targets.extend(targets);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sweep every target once and return the number of entries removed.
    ///
    /// A target that panics is logged and skipped; the others are still swept.
    pub fn sweep_once(&self) -> usize {
        let mut removed = 0;
        for target in &self.targets {
            match catch_unwind(AssertUnwindSafe(|| target.sweep_expired())) {
                Ok(0) => debug!(cache = target.name(), "no expired entries"),
                Ok(count) => {
                    info!(cache = target.name(), removed = count, "expired cache entries removed");
                    removed += count;
                }
                Err(_) => error!(cache = target.name(), "cache sweep panicked"),
            }
        }
        removed
    }

    /// Sweep on a fixed interval until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            caches = self.targets.len(),
            "cache sweeper starting"
        );

        let mut interval = tokio::time::interval(self.interval);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("cache sweeper shutting down");
                    break;
                }

                _ = interval.tick() => {
                    self.sweep_once();
                }
            }
        }
    }
}
