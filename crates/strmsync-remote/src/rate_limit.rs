//! Rate limiting for the remote listing API
//!
//! Bounds how fast enumeration workers may call the remote store.
//!
//! ## Architecture
//!
//! - [`SlidingWindowLimiter`]: at most `max_calls` calls within any trailing
//!   `time_window`, shared by every worker of one enumeration
//! - [`EndpointCooldown`]: minimum spacing between successive calls of one
//!   wrapped endpoint, independent of other endpoints
//!
//! Neither limiter ever fails; both only delay.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use strmsync_remote::rate_limit::{EndpointCooldown, SlidingWindowLimiter};
//!
//! # async fn example() {
//! let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(1));
//! limiter.acquire().await;
//!
//! let cooldown = EndpointCooldown::new("list", Duration::from_millis(500));
//! let page = cooldown.call(|| async { 42 }).await;
//! # }
//! ```

use std::{
    collections::VecDeque,
    future::Future,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use tracing::{debug, warn};

/// Shortest sleep between re-checks of a full window
const MIN_WAIT: Duration = Duration::from_millis(1);

// ============================================================================
// SlidingWindowLimiter
// ============================================================================

/// Sliding-window call limiter.
///
/// Keeps the timestamps of recent calls (never more than `max_calls`),
/// pruning those older than the window on every acquisition. When the window
/// is full the caller sleeps until the oldest timestamp ages out, then
/// re-checks.
///
/// Thread-safe and designed to be shared via `Arc<SlidingWindowLimiter>`.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    /// Creates a limiter allowing `max_calls` calls per `window`.
    ///
    /// A `max_calls` of zero is treated as one.
    pub fn new(max_calls: u32, window: Duration) -> Self {
        let max_calls = (max_calls as usize).max(1);
        Self {
            max_calls,
            window,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    /// Creates a limiter from fractional window seconds, as configured.
    pub fn from_secs_f64(max_calls: u32, window_secs: f64) -> Self {
        Self::new(max_calls, Duration::from_secs_f64(window_secs.max(0.0)))
    }

    /// Maximum calls per window.
    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    fn lock_calls(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records a call if the window has room.
    ///
    /// Returns the recorded timestamp, or the time to wait before the oldest
    /// call leaves the window.
    pub fn try_acquire(&self) -> Result<Instant, Duration> {
        let mut calls = self.lock_calls();
        let now = Instant::now();

        while let Some(&oldest) = calls.front() {
            if now.duration_since(oldest) >= self.window {
                calls.pop_front();
            } else {
                break;
            }
        }

        if calls.len() < self.max_calls {
            calls.push_back(now);
            Ok(now)
        } else {
            // Full window: the front entry is the next to expire
            let oldest = calls.front().copied().unwrap_or(now);
            Err(self.window.saturating_sub(now.duration_since(oldest)))
        }
    }

    /// Waits until a call is permitted, records it, and returns its timestamp.
    ///
    /// Yields to the tokio runtime while waiting.
    pub async fn acquire(&self) -> Instant {
        loop {
            match self.try_acquire() {
                Ok(at) => return at,
                Err(wait) => {
                    let wait = wait.max(MIN_WAIT);
                    debug!(
                        wait_ms = wait.as_millis() as u64,
                        "Rate limit window full, waiting"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Blocking variant of [`SlidingWindowLimiter::acquire`] for callers
    /// running on a dedicated OS thread.
    pub fn acquire_blocking(&self) -> Instant {
        loop {
            match self.try_acquire() {
                Ok(at) => return at,
                Err(wait) => std::thread::sleep(wait.max(MIN_WAIT)),
            }
        }
    }

    /// Number of calls currently inside the window.
    pub fn in_window(&self) -> usize {
        let calls = self.lock_calls();
        let now = Instant::now();
        calls
            .iter()
            .filter(|&&t| now.duration_since(t) < self.window)
            .count()
    }
}

// ============================================================================
// EndpointCooldown
// ============================================================================

/// Minimum spacing between successive invocations of one endpoint.
///
/// Each caller reserves the next free start time under a short lock and
/// then sleeps until it without holding anything, so concurrent callers
/// are spaced `cooldown` apart and each waits only for its own slot.
#[derive(Debug)]
pub struct EndpointCooldown {
    name: String,
    cooldown: Duration,
    last_slot: Mutex<Option<Instant>>,
}

impl EndpointCooldown {
    /// Creates a cooldown for the endpoint called `name`.
    pub fn new(name: impl Into<String>, cooldown: Duration) -> Self {
        Self {
            name: name.into(),
            cooldown,
            last_slot: Mutex::new(None),
        }
    }

    /// Endpoint name, for logging.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured spacing.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Claims the earliest start time at least `cooldown` after the
    /// previously claimed one.
    fn reserve(&self) -> Instant {
        let mut last = self.last_slot.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let slot = match *last {
            Some(prev) => (prev + self.cooldown).max(now),
            None => now,
        };
        *last = Some(slot);
        slot
    }

    /// Waits for a free slot, then runs `f`.
    pub async fn call<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let slot = self.reserve();
        let wait = slot.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            debug!(
                endpoint = %self.name,
                wait_ms = wait.as_millis() as u64,
                "Endpoint cooling down"
            );
            tokio::time::sleep_until(tokio::time::Instant::from_std(slot)).await;
        }
        f().await
    }
}

// ============================================================================
// Retry-After header parsing helpers
// ============================================================================

/// Parses a Retry-After header value into a Duration.
///
/// The header can be either:
/// - An integer number of seconds (e.g., "30")
/// - An HTTP-date (e.g., "Fri, 31 Dec 2025 23:59:59 GMT") - parsed as seconds from now
///
/// Falls back to the default duration if parsing fails.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let now = chrono::Utc::now();
        let target = date.with_timezone(&chrono::Utc);
        if target > now {
            let diff = target - now;
            if let Some(secs) = diff
                .num_seconds()
                .try_into()
                .ok()
                .filter(|&s: &u64| s <= 3600)
            {
                return Duration::from_secs(secs);
            }
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}

// ============================================================================
// Unit tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    // ====================================================================
    // SlidingWindowLimiter tests
    // ====================================================================

    #[test]
    fn test_limiter_creation() {
        let limiter = SlidingWindowLimiter::new(3, Duration::from_secs(1));
        assert_eq!(limiter.max_calls(), 3);
        assert_eq!(limiter.window(), Duration::from_secs(1));
        assert_eq!(limiter.in_window(), 0);
    }

    #[test]
    fn test_zero_max_calls_is_treated_as_one() {
        let limiter = SlidingWindowLimiter::new(0, Duration::from_secs(1));
        assert_eq!(limiter.max_calls(), 1);
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_err());
    }

    #[test]
    fn test_try_acquire_fills_window() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
        let wait = limiter.try_acquire().unwrap_err();
        assert!(wait > Duration::from_secs(59));
        assert!(wait <= Duration::from_secs(60));
        assert_eq!(limiter.in_window(), 2);
    }

    #[test]
    fn test_old_calls_are_pruned() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_err());

        std::thread::sleep(Duration::from_millis(30));

        assert!(limiter.try_acquire().is_ok());
    }

    #[test]
    fn test_acquire_blocking_waits_for_window() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_millis(50));
        let first = limiter.acquire_blocking();
        let second = limiter.acquire_blocking();
        assert!(second.duration_since(first) >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_acquire_succeeds_immediately() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_secs(1));
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_acquire_waits_when_full() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_millis(100));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_concurrent_acquire_never_exceeds_window() {
        let window = Duration::from_millis(200);
        let limiter = Arc::new(SlidingWindowLimiter::new(2, window));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.acquire().await }));
        }

        let mut stamps = Vec::new();
        for handle in handles {
            stamps.push(handle.await.unwrap());
        }
        stamps.sort();

        // Any three consecutive calls must span at least one full window
        for trio in stamps.windows(3) {
            assert!(
                trio[2].duration_since(trio[0]) >= window,
                "three calls within {:?}",
                trio[2].duration_since(trio[0])
            );
        }
    }

    #[test]
    fn test_concurrent_threads_no_overallocation() {
        let limiter = Arc::new(SlidingWindowLimiter::new(10, Duration::from_secs(60)));
        let mut handles = vec![];

        for _ in 0..50 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || limiter.try_acquire().is_ok()));
        }

        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(granted, 10);
    }

    // ====================================================================
    // EndpointCooldown tests
    // ====================================================================

    #[tokio::test]
    async fn test_cooldown_first_call_is_immediate() {
        let cooldown = EndpointCooldown::new("list", Duration::from_secs(5));
        let start = Instant::now();
        let value = cooldown.call(|| async { 7 }).await;
        assert_eq!(value, 7);
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(cooldown.name(), "list");
    }

    #[tokio::test]
    async fn test_cooldown_spaces_successive_calls() {
        let cooldown = EndpointCooldown::new("list", Duration::from_millis(80));
        let first = cooldown.call(|| async { Instant::now() }).await;
        let second = cooldown.call(|| async { Instant::now() }).await;
        assert!(second.duration_since(first) >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_cooldowns_are_independent() {
        let a = EndpointCooldown::new("a", Duration::from_secs(5));
        let b = EndpointCooldown::new("b", Duration::from_secs(5));
        a.call(|| async {}).await;

        let start = Instant::now();
        b.call(|| async {}).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_sleeping_caller_does_not_block_others() {
        let cooldown = Arc::new(EndpointCooldown::new("list", Duration::from_secs(10)));
        cooldown.call(|| async {}).await;

        let sleeper = tokio::spawn({
            let cooldown = Arc::clone(&cooldown);
            async move { cooldown.call(|| async {}).await }
        });
        tokio::task::yield_now().await;

        let start = Instant::now();
        let slot = cooldown.reserve();
        assert!(start.elapsed() < Duration::from_millis(50));
        // The sleeper holds the next slot; ours is the one after it
        assert!(slot.duration_since(start) > Duration::from_secs(15));
        assert!(!sleeper.is_finished());
        sleeper.abort();
    }

    #[test]
    fn test_reserve_claims_consecutive_slots() {
        let cooldown = EndpointCooldown::new("list", Duration::from_secs(10));
        let first = cooldown.reserve();
        let second = cooldown.reserve();
        let third = cooldown.reserve();
        assert_eq!(second.duration_since(first), Duration::from_secs(10));
        assert_eq!(third.duration_since(second), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_cooldown_under_concurrency() {
        let cooldown = Arc::new(EndpointCooldown::new("list", Duration::from_millis(40)));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let cooldown = Arc::clone(&cooldown);
            handles.push(tokio::spawn(async move {
                cooldown.call(|| async { Instant::now() }).await
            }));
        }
        let mut stamps = Vec::new();
        for handle in handles {
            stamps.push(handle.await.unwrap());
        }
        stamps.sort();
        for pair in stamps.windows(2) {
            // Small tolerance: the stamp is taken after the sleep ends
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(35));
        }
    }

    // ====================================================================
    // parse_retry_after tests
    // ====================================================================

    #[test]
    fn test_parse_retry_after_seconds() {
        let duration = parse_retry_after("30", Duration::from_secs(60));
        assert_eq!(duration, Duration::from_secs(30));
    }

    #[test]
    fn test_parse_retry_after_with_whitespace() {
        let duration = parse_retry_after("  45  ", Duration::from_secs(60));
        assert_eq!(duration, Duration::from_secs(45));
    }

    #[test]
    fn test_parse_retry_after_invalid_falls_back() {
        let default = Duration::from_secs(60);
        assert_eq!(parse_retry_after("not-a-number", default), default);
        assert_eq!(parse_retry_after("", default), default);
    }
}
