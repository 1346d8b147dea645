//! Sliding-window limiter capping how many jobs a worker starts per window.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// At most `max` job starts per `per`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max: u32,
    pub per: Duration,
}

impl RateLimit {
    pub const fn per_second(max: u32) -> Self {
        Self {
            max,
            per: Duration::from_secs(1),
        }
    }
}

/// Shared between all tasks of one worker.
pub struct RateLimiter {
    limit: RateLimit,
    starts: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            starts: Mutex::new(VecDeque::with_capacity(limit.max as usize)),
        }
    }

    /// Record a start at `now` if the window has room, otherwise return
    /// how long to wait before trying again.
    pub async fn try_acquire_at(&self, now: Instant) -> Result<(), Duration> {
        let mut starts = self.starts.lock().await;
        while let Some(&oldest) = starts.front() {
            if now.duration_since(oldest) >= self.limit.per {
                starts.pop_front();
            } else {
                break;
            }
        }

        if (starts.len() as u32) < self.limit.max.max(1) {
            starts.push_back(now);
            return Ok(());
        }
        let oldest = starts.front().copied().unwrap_or(now);
        Err(self.limit.per.saturating_sub(now.duration_since(oldest)))
    }

    /// Wait until a start is permitted.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire_at(Instant::now()).await {
                Ok(()) => return,
                Err(wait) => tokio::time::sleep(wait).await,
            }
        }
    }
}
