//! Process-wide cached clock (spec.md §4.3 "Timestamping").
//!
//! Reading the wall clock on every logging call is a measurable hot-path
//! cost at the throughput this crate targets. Instead, a dedicated
//! background thread refreshes a cached nanosecond timestamp at a fixed
//! interval, and producers read it with a single relaxed atomic load.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicI64, AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of "now", abstracted so tests can inject a deterministic clock
/// (spec.md SPEC_FULL.md ambient "Clock" component).
pub trait Clock: Send + Sync {
    /// Returns nanoseconds since the Unix epoch.
    fn now_nanos(&self) -> i64;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now_nanos(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0)
    }
}

struct CachedClockState {
    nanos: AtomicI64,
    running: AtomicBool,
}

/// Process-wide cached clock: a background thread refreshes [`CACHED_CLOCK`]
/// every `refresh interval`, and [`cached_now_nanos`] reads it with a single
/// relaxed load.
static CACHED_CLOCK: Lazy<Arc<CachedClockState>> = Lazy::new(|| {
    Arc::new(CachedClockState {
        nanos: AtomicI64::new(SystemClock.now_nanos()),
        running: AtomicBool::new(false),
    })
});

/// Handle to the background clock-refresh thread.
///
/// Dropping the handle does not stop the thread; call [`ClockHandle::shutdown`]
/// explicitly (mirrors the teacher's explicit `ShutdownHandle` lifecycle
/// style in `ringmpsc-stream`).
pub struct ClockHandle {
    join: Option<JoinHandle<()>>,
    state: Arc<CachedClockState>,
}

impl ClockHandle {
    /// Stops the background thread and waits for it to exit.
    pub fn shutdown(mut self) {
        self.state.running.store(false, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for ClockHandle {
    fn drop(&mut self) {
        self.state.running.store(false, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Starts the background clock-refresh thread at the given interval.
///
/// Calling this more than once is safe; each call spawns its own updater
/// thread against the same shared cell, and each returned handle stops only
/// the thread it started.
pub fn init(refresh_interval: Duration) -> ClockHandle {
    let state = Arc::clone(&CACHED_CLOCK);
    state.running.store(true, Ordering::SeqCst);
    let thread_state = Arc::clone(&state);
    let join = std::thread::Builder::new()
        .name("ringlog-clock".to_owned())
        .spawn(move || {
            while thread_state.running.load(Ordering::Relaxed) {
                thread_state
                    .nanos
                    .store(SystemClock.now_nanos(), Ordering::Relaxed);
                std::thread::sleep(refresh_interval);
            }
        })
        .expect("failed to spawn ringlog clock thread");

    ClockHandle {
        join: Some(join),
        state,
    }
}

/// Reads the cached timestamp without touching the system clock.
///
/// If [`init`] was never called, this returns whatever was cached at first
/// access (effectively a single real clock read), which is still correct —
/// just not kept fresh.
#[inline]
pub fn cached_now_nanos() -> i64 {
    CACHED_CLOCK.nanos.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_produces_increasing_values() {
        let a = SystemClock.now_nanos();
        std::thread::sleep(Duration::from_millis(1));
        let b = SystemClock.now_nanos();
        assert!(b >= a);
    }

    #[test]
    fn background_thread_refreshes_cache() {
        let handle = init(Duration::from_millis(1));
        let before = cached_now_nanos();
        std::thread::sleep(Duration::from_millis(20));
        let after = cached_now_nanos();
        assert!(after >= before);
        handle.shutdown();
    }
}
