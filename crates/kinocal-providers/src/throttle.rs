//! Minimum spacing between consecutive requests to one upstream.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::trace;

/// Paces requests so that two consecutive calls to [`Throttle::wait`] return
/// at least `interval` apart.
///
/// The lock is held while sleeping, so concurrent callers queue up behind
/// each other instead of all waking at once.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Default spacing between requests.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until the next request may go out, then claims that slot.
    ///
    /// The first call never waits.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            if ready_at > Instant::now() {
                trace!(delay_ms = (ready_at - Instant::now()).as_millis() as u64, "throttling");
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}
