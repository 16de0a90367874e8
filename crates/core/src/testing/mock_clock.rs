//! Virtual clock for timer-driven tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::clock::Clock;

/// Clock whose `sleep` advances virtual time instead of waiting.
///
/// Time is shared by every task holding the clock, so concurrent sleepers
/// each push it forward.
#[derive(Debug)]
pub struct MockClock {
    start: DateTime<Utc>,
    elapsed_ms: AtomicU64,
    sleeps: AtomicU64,
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    /// Clock starting at a fixed instant (2025-01-01 09:30:00 UTC).
    pub fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2025, 1, 1, 9, 30, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::starting_at(start)
    }

    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            start,
            elapsed_ms: AtomicU64::new(0),
            sleeps: AtomicU64::new(0),
        }
    }

    /// Move virtual time forward without sleeping.
    pub fn advance(&self, by: Duration) {
        self.elapsed_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    /// Virtual time passed since the start instant.
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms.load(Ordering::SeqCst))
    }

    /// Number of `sleep` calls so far.
    pub fn sleep_count(&self) -> u64 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        self.start + chrono::Duration::milliseconds(self.elapsed_ms.load(Ordering::SeqCst) as i64)
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}
