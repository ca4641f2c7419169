//! Per-user sliding window rate limiting
//!
//! Every AI-backed request is admitted only if the user has fewer than
//! `limit` admitted requests inside the rolling window. The window is
//! half-open: a request made at `t` stops counting at exactly `t + window`.

use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Result of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request was recorded and may proceed
    Allowed,
    /// The quota is exhausted; nothing was recorded
    Denied {
        /// Time until the oldest live request leaves the window
        retry_after: Duration,
    },
}

impl Admission {
    /// Returns true for [`Admission::Allowed`]
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Wait time in whole seconds, rounded up; zero when allowed
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            Self::Allowed => 0,
            Self::Denied { retry_after } => {
                let secs = retry_after.as_secs();
                if retry_after.subsec_nanos() > 0 {
                    secs + 1
                } else {
                    secs
                }
            }
        }
    }
}

/// Ordered timestamps of one user's admitted requests
#[derive(Debug, Clone, Default)]
pub struct WindowLog {
    hits: VecDeque<Instant>,
}

impl WindowLog {
    /// Creates an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to record a request at `now`.
    ///
    /// Expired timestamps are pruned only when the request is admitted, so a
    /// denial leaves the log untouched.
    pub fn admit(&mut self, now: Instant, limit: usize, window: Duration) -> Admission {
        let expired = self.expired_prefix(now, window);
        let live = self.hits.len() - expired;

        if live < limit {
            self.hits.drain(..expired);
            self.hits.push_back(now);
            return Admission::Allowed;
        }

        let retry_after = self
            .hits
            .get(expired)
            .map_or(Duration::ZERO, |oldest| {
                window.saturating_sub(now.saturating_duration_since(*oldest))
            });
        Admission::Denied { retry_after }
    }

    /// Number of requests still inside the window at `now`
    #[must_use]
    pub fn live_count(&self, now: Instant, window: Duration) -> usize {
        self.hits.len() - self.expired_prefix(now, window)
    }

    /// Stored timestamps, oldest first
    #[must_use]
    pub fn timestamps(&self) -> Vec<Instant> {
        self.hits.iter().copied().collect()
    }

    fn expired_prefix(&self, now: Instant, window: Duration) -> usize {
        self.hits
            .partition_point(|hit| now.saturating_duration_since(*hit) >= window)
    }
}

/// Concurrent per-user rate limiter
///
/// Each user's log sits behind its own async mutex inside a bounded moka
/// cache. Entries idle for a full window hold only expired timestamps and
/// are evicted automatically.
///
/// The cache uses plain LRU eviction. Under TinyLFU a new log can be refused
/// admission when the cache is full, and that user would then start from an
/// empty log on every request. With LRU only users idle longer than
/// `max_users` others can lose their log.
pub struct RateLimiter {
    sessions: Cache<i64, Arc<Mutex<WindowLog>>>,
    limit: usize,
    window: Duration,
    denied_count: AtomicU64,
}

impl RateLimiter {
    /// Creates a limiter admitting `limit` requests per `window` per user
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use treasure_hunter_bot::rate_limiter::RateLimiter;
    ///
    /// let limiter = RateLimiter::new(10, Duration::from_secs(60), 10_000);
    /// assert_eq!(limiter.limit(), 10);
    /// ```
    #[must_use]
    pub fn new(limit: usize, window: Duration, max_users: u64) -> Self {
        let sessions = Cache::builder()
            .max_capacity(max_users)
            .eviction_policy(EvictionPolicy::lru())
            .time_to_idle(window)
            .build();

        Self {
            sessions,
            limit,
            window,
            denied_count: AtomicU64::new(0),
        }
    }

    /// Check and record a request for `user_id` at the current instant
    pub async fn admit(&self, user_id: i64) -> Admission {
        self.admit_at(user_id, Instant::now()).await
    }

    /// Check and record a request for `user_id` at an explicit instant
    pub async fn admit_at(&self, user_id: i64, now: Instant) -> Admission {
        let log = self
            .sessions
            .get_with(user_id, async { Arc::new(Mutex::new(WindowLog::new())) })
            .await;

        let admission = log.lock().await.admit(now, self.limit, self.window);

        if let Admission::Denied { retry_after } = admission {
            let total = self.denied_count.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(
                user_id,
                retry_after_ms = retry_after.as_millis(),
                total_denied = total,
                "Request throttled"
            );
        }

        admission
    }

    /// Snapshot of a user's stored timestamps, oldest first
    pub async fn timestamps(&self, user_id: i64) -> Vec<Instant> {
        match self.sessions.get(&user_id).await {
            Some(log) => log.lock().await.timestamps(),
            None => Vec::new(),
        }
    }

    /// Configured requests per window
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Configured window length
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Total number of denied requests since start
    #[must_use]
    pub fn denied_count(&self) -> u64 {
        self.denied_count.load(Ordering::Relaxed)
    }

    /// Approximate number of users currently tracked
    #[must_use]
    pub fn tracked_users(&self) -> u64 {
        self.sessions.entry_count()
    }
}
