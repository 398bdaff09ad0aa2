use dashmap::DashMap;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use url::Url;

/// Spaces requests to the same host at least `delay` apart.
///
/// Each caller reserves the next free slot for its host atomically, so
/// concurrent workers queue up behind each other instead of bursting.
pub struct DomainThrottle {
    delay: Duration,
    next_slot: DashMap<String, Instant>,
}

impl DomainThrottle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_slot: DashMap::new(),
        }
    }

    /// Reserve a slot and return when it starts.
    pub fn reserve(&self, url: &Url) -> Instant {
        let now = Instant::now();
        if self.delay.is_zero() {
            return now;
        }

        let host = url.host_str().unwrap_or_default().to_string();
        let mut slot = self.next_slot.entry(host).or_insert(now);
        let start = (*slot).max(now);
        *slot = start + self.delay;
        start
    }

    pub async fn wait(&self, url: &Url) {
        let start = self.reserve(url);
        sleep_until(start).await;
    }
}
