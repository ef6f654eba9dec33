//! Token bucket for throttling calls to rate-limited collaborators
//!
//! The bucket is an ordinary value: callers share it by reference (or `Arc`)
//! instead of consulting a process-wide "last call" timestamp.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Classic token bucket: holds at most `capacity` tokens, refilled
/// continuously at `refill_per_sec`. Starts full.
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            capacity,
            refill_per_sec: refill_per_sec.max(f64::MIN_POSITIVE),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// `n` calls per second with a burst of `n`.
    pub fn per_second(n: u32) -> Self {
        Self::new(n, f64::from(n.max(1)))
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.reserve().is_none()
    }

    /// Block until a token is available, then take it.
    pub fn acquire(&self) {
        while let Some(wait) = self.reserve() {
            std::thread::sleep(wait);
        }
    }

    /// Tokens currently available (after refill).
    pub fn available(&self) -> f64 {
        let mut state = self.lock();
        self.refill(&mut state, Instant::now());
        state.tokens
    }

    /// Take a token, or report how long until one is available.
    fn reserve(&self) -> Option<Duration> {
        let mut state = self.lock();
        self.refill(&mut state, Instant::now());
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            None
        } else {
            let missing = 1.0 - state.tokens;
            Some(Duration::from_secs_f64(missing / self.refill_per_sec))
        }
    }

    /// The state is consistent between statements, so a poisoned lock is usable.
    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("capacity", &self.capacity)
            .field("refill_per_sec", &self.refill_per_sec)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_limited_to_capacity() {
        // Slow refill so the test is not timing-sensitive
        let bucket = TokenBucket::new(3, 0.001);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn refills_over_time() {
        let bucket = TokenBucket::new(1, 200.0);
        assert!(bucket.try_acquire());
        std::thread::sleep(Duration::from_millis(20));
        assert!(bucket.try_acquire());
    }

    #[test]
    fn acquire_blocks_until_token() {
        let bucket = TokenBucket::new(1, 50.0);
        bucket.acquire();
        let start = Instant::now();
        bucket.acquire();
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn never_exceeds_capacity() {
        let bucket = TokenBucket::new(2, 1000.0);
        std::thread::sleep(Duration::from_millis(10));
        assert!(bucket.available() <= 2.0);
    }

    #[test]
    fn survives_poisoned_lock() {
        let bucket = TokenBucket::per_second(2);
        let panicked = std::thread::scope(|s| {
            s.spawn(|| {
                let _guard = bucket.state.lock().unwrap();
                panic!("holder died");
            })
            .join()
            .is_err()
        });
        assert!(panicked);
        assert!(bucket.state.is_poisoned());
        assert!(bucket.try_acquire());
        assert!(bucket.available() < 2.0);
    }
}
