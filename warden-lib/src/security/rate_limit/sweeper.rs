use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::limiter::AbuseDetector;

/// Seconds since the Unix epoch, the timestamp unit used by the detector.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Spawn a task that evicts idle clients every `interval` until `cancel`
/// fires.
///
/// Uses wall-clock time; callers that feed the detector synthetic
/// timestamps should call [`AbuseDetector::sweep_idle`] themselves.
pub fn spawn_sweeper(
    detector: Arc<AbuseDetector>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("idle sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = detector.sweep_idle(unix_now());
                    if evicted > 0 {
                        let stats = detector.stats();
                        info!(evicted, tracked = stats.tracked_clients, "idle sweep finished");
                    }
                }
            }
        }
    })
}
