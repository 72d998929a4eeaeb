//! Sampling hook (spec.md §4.7): a pluggable gate checked after the level
//! filter and before slot claim.

use crate::level::Level;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// A pluggable gate deciding whether an otherwise-enabled call proceeds.
///
/// Mirrors the external-interface contract in spec.md §6: a single
/// `allow(level) -> bool` method, checked on the hot path.
pub trait Sampler: Send + Sync {
    /// Returns `true` if the call at `level` should proceed.
    fn allow(&self, level: Level) -> bool;
}

/// Allows every call; the default when no sampler is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSampler;

impl Sampler for NoopSampler {
    #[inline]
    fn allow(&self, _level: Level) -> bool {
        true
    }
}

/// Reference token-bucket sampler (spec.md §4.7).
///
/// `capacity` tokens refill at a rate of `refill` tokens every `interval`.
/// Non-positive parameters fall back to the documented defaults: capacity
/// 1, refill 1, interval 1ms.
pub struct TokenBucketSampler {
    capacity: u64,
    refill: u64,
    interval_nanos: u64,
    tokens: AtomicU64,
    last_refill_nanos: AtomicI64,
    clock: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl TokenBucketSampler {
    /// Creates a token-bucket sampler using `std::time::Instant`-derived
    /// wall time for refills.
    pub fn new(capacity: i64, refill: i64, interval: Duration) -> Self {
        Self::with_clock(capacity, refill, interval, system_now_nanos)
    }

    /// Creates a token-bucket sampler with an injectable time source, for
    /// deterministic tests.
    pub fn with_clock(
        capacity: i64,
        refill: i64,
        interval: Duration,
        clock: impl Fn() -> i64 + Send + Sync + 'static,
    ) -> Self {
        let capacity = if capacity > 0 { capacity as u64 } else { 1 };
        let refill = if refill > 0 { refill as u64 } else { 1 };
        let interval_nanos = if interval.is_zero() {
            1_000_000
        } else {
            interval.as_nanos().min(u64::MAX as u128) as u64
        };
        let now = clock();
        Self {
            capacity,
            refill,
            interval_nanos,
            tokens: AtomicU64::new(capacity),
            last_refill_nanos: AtomicI64::new(now),
            clock: Box::new(clock),
        }
    }

    fn refill_lazily(&self) {
        let now = (self.clock)();
        let last = self.last_refill_nanos.load(Ordering::Relaxed);
        let elapsed = now.saturating_sub(last);
        if elapsed < self.interval_nanos as i64 {
            return;
        }
        let periods = (elapsed as u64) / self.interval_nanos;
        if periods == 0 {
            return;
        }
        if self
            .last_refill_nanos
            .compare_exchange(
                last,
                last + (periods * self.interval_nanos) as i64,
                Ordering::Relaxed,
                Ordering::Relaxed,
            )
            .is_ok()
        {
            let grant = periods.saturating_mul(self.refill).min(self.capacity);
            self.tokens
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |t| {
                    Some((t + grant).min(self.capacity))
                })
                .ok();
        }
    }
}

impl Sampler for TokenBucketSampler {
    fn allow(&self, _level: Level) -> bool {
        self.refill_lazily();
        self.tokens
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |t| {
                if t == 0 {
                    None
                } else {
                    Some(t - 1)
                }
            })
            .is_ok()
    }
}

fn system_now_nanos() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn noop_always_allows() {
        let sampler = NoopSampler;
        for _ in 0..1000 {
            assert!(sampler.allow(Level::Info));
        }
    }

    #[test]
    fn token_bucket_allows_up_to_capacity_then_denies() {
        let now = Rc::new(Cell::new(0i64));
        let now_clone = Rc::clone(&now);
        // Single-threaded test: Rc is fine to move into a Send+Sync closure
        // only because we never actually share it across threads.
        struct FakeClock(Rc<Cell<i64>>);
        unsafe impl Send for FakeClock {}
        unsafe impl Sync for FakeClock {}
        impl FakeClock {
            fn get(&self) -> i64 {
                self.0.get()
            }
        }
        let clock = FakeClock(now_clone);
        let sampler = TokenBucketSampler::with_clock(3, 3, Duration::from_millis(1), move || clock.get());

        assert!(sampler.allow(Level::Info));
        assert!(sampler.allow(Level::Info));
        assert!(sampler.allow(Level::Info));
        assert!(!sampler.allow(Level::Info));

        now.set(2_000_000);
        assert!(sampler.allow(Level::Info));
    }

    #[test]
    fn non_positive_parameters_fall_back_to_defaults() {
        let sampler = TokenBucketSampler::new(0, -1, Duration::ZERO);
        assert!(sampler.allow(Level::Info));
        assert!(!sampler.allow(Level::Info));
    }
}
