//! Consumer/producer wait strategies (spec.md §4.5 "Idle strategies").
//!
//! These compose with [`crate::backoff::Backoff`] rather than replace it:
//! `Backoff` is the mechanical spin/yield primitive used inside a single
//! wait loop, while an `IdleStrategy` is the policy object a caller selects
//! via [`crate::config::IdleStrategyKind`] to decide how aggressively (or
//! politely) that loop should wait across many iterations.

use crate::backoff::Backoff;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A wait policy consulted once per failed poll of the ring.
pub trait IdleStrategy: Send + Sync {
    /// Called when there was no work to do; may spin, yield, sleep, or park.
    fn idle(&self);
    /// Called when work was found, to let a strategy reset any internal
    /// escalation state (e.g. a spin counter).
    fn reset(&self);
    /// Called by a producer after committing a record, to wake any consumer
    /// parked on [`IdleStrategy::idle`]. Strategies that never park may
    /// no-op this.
    fn wake_up(&self) {}
}

/// Pure spin-loop hinting; lowest latency, highest CPU usage.
#[derive(Debug, Default)]
pub struct Spinning;

impl IdleStrategy for Spinning {
    #[inline]
    fn idle(&self) {
        std::hint::spin_loop();
    }
    #[inline]
    fn reset(&self) {}
}

/// Spins briefly, then yields to the OS scheduler; reuses the teacher's
/// [`Backoff`] verbatim.
#[derive(Debug, Default)]
pub struct Yielding {
    backoff: Mutex<Backoff>,
}

impl IdleStrategy for Yielding {
    fn idle(&self) {
        self.backoff.lock().snooze();
    }
    fn reset(&self) {
        self.backoff.lock().reset();
    }
}

/// Sleeps with progressively longer backoff, capped at `max_sleep`.
pub struct Sleeping {
    step: AtomicU64,
    max_sleep: Duration,
}

impl Sleeping {
    /// Creates a sleeping strategy that escalates up to `max_sleep` between
    /// polls.
    pub fn new(max_sleep: Duration) -> Self {
        Self {
            step: AtomicU64::new(0),
            max_sleep,
        }
    }
}

impl Default for Sleeping {
    fn default() -> Self {
        Self::new(Duration::from_millis(1))
    }
}

impl IdleStrategy for Sleeping {
    fn idle(&self) {
        let step = self.step.fetch_add(1, Ordering::Relaxed).min(10);
        let nanos = (self.max_sleep.as_nanos() as u64 / 10).saturating_mul(step + 1);
        std::thread::sleep(Duration::from_nanos(nanos).min(self.max_sleep));
    }
    fn reset(&self) {
        self.step.store(0, Ordering::Relaxed);
    }
}

/// Parks on a condvar until woken by [`IdleStrategy::wake_up`] or a timeout
/// elapses, avoiding busy-waiting entirely at the cost of wake-up latency.
pub struct ChannelWakeup {
    inner: Mutex<()>,
    condvar: Condvar,
    timeout: Duration,
}

impl ChannelWakeup {
    /// Creates a park-based strategy with the given maximum park duration.
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(()),
            condvar: Condvar::new(),
            timeout,
        }
    }
}

impl Default for ChannelWakeup {
    fn default() -> Self {
        Self::new(Duration::from_millis(5))
    }
}

impl IdleStrategy for ChannelWakeup {
    fn idle(&self) {
        let mut guard = self.inner.lock();
        self.condvar.wait_for(&mut guard, self.timeout);
    }
    fn reset(&self) {}
    fn wake_up(&self) {
        self.condvar.notify_all();
    }
}

/// Composite strategy escalating spin → yield → sleep → park
/// (spec.md §4.5 default `Adaptive` strategy).
pub struct Adaptive {
    backoff: Mutex<Backoff>,
    sleeping: Sleeping,
    park: ChannelWakeup,
}

impl Default for Adaptive {
    fn default() -> Self {
        Self {
            backoff: Mutex::new(Backoff::new()),
            sleeping: Sleeping::new(Duration::from_millis(1)),
            park: ChannelWakeup::new(Duration::from_millis(5)),
        }
    }
}

impl IdleStrategy for Adaptive {
    fn idle(&self) {
        let mut backoff = self.backoff.lock();
        if !backoff.is_completed() {
            backoff.snooze();
            return;
        }
        drop(backoff);
        self.sleeping.idle();
        self.park.idle();
    }

    fn reset(&self) {
        self.backoff.lock().reset();
        self.sleeping.reset();
    }

    fn wake_up(&self) {
        self.park.wake_up();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinning_idle_does_not_panic() {
        let s = Spinning;
        s.idle();
        s.reset();
    }

    #[test]
    fn sleeping_escalates_then_caps() {
        let s = Sleeping::new(Duration::from_millis(2));
        for _ in 0..20 {
            s.idle();
        }
    }

    #[test]
    fn channel_wakeup_wakes_on_notify() {
        use std::sync::Arc;
        let strategy = Arc::new(ChannelWakeup::new(Duration::from_secs(5)));
        let waiter = Arc::clone(&strategy);
        let handle = std::thread::spawn(move || {
            waiter.idle();
        });
        std::thread::sleep(Duration::from_millis(20));
        strategy.wake_up();
        handle.join().unwrap();
    }

    #[test]
    fn adaptive_idle_does_not_panic() {
        let a = Adaptive::default();
        for _ in 0..8 {
            a.idle();
        }
        a.reset();
        a.wake_up();
    }
}
