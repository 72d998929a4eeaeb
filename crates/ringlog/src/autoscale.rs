//! Adaptive single-ring ↔ sharded-ring wrapper (spec.md §4.9 "Auto-scaling").
//!
//! Both backends stay alive at once; an `ArcSwap`-backed mode flag routes
//! each call to whichever is active, so switching never interrupts a call
//! in flight. A background monitor thread samples four per-window signals
//! on the active backend every `window` — writes/sec, CAS-retry contention
//! ratio, average per-call claim latency, and distinct recent producer
//! thread count — and escalates or de-escalates only after `K` consecutive
//! windows agree (hysteresis) and `cooldown` has elapsed since the last
//! switch, to avoid flapping under bursty load.

use crate::field::Field;
use crate::level::Level;
use crate::record::Record;
use crate::ring::Ring;
use crate::shard::ShardedRing;
use crate::logger::Logger;
use crate::stats::StatsSnapshot;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Which backend is currently serving calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Routing through the single shared [`Ring`].
    Single,
    /// Routing through the [`ShardedRing`].
    Sharded,
}

/// Consecutive out-of-band windows required before a mode switch
/// (spec.md §4.9: hysteresis).
const HYSTERESIS_WINDOWS: u32 = 3;
/// Minimum time between two mode switches.
const COOLDOWN: Duration = Duration::from_secs(1);

// spec.md §4.9's four escalation signals: writes/sec, contention ratio,
// average per-call latency, and distinct producer thread count. Single is
// abandoned for Sharded when *any* escalate threshold is crossed, and
// Sharded is abandoned for Single only when *all three* de-escalate
// thresholds (no distinct-producers term — spec.md is explicit that the
// de-escalate condition omits it) are satisfied at once.

/// Escalate: writes/sec at or above this looks like more throughput than a
/// single CAS-arbitrated ring should take.
const ESCALATE_WRITES_PER_SEC: f64 = 50_000.0;
/// De-escalate: writes/sec at or below this no longer needs sharding.
const DESCALATE_WRITES_PER_SEC: f64 = 5_000.0;
/// Escalate: fraction of claim attempts that required a CAS retry.
const ESCALATE_CONTENTION_RATIO: f64 = 0.05;
/// De-escalate: CAS-retry fraction low enough that a single ring is cheap.
const DESCALATE_CONTENTION_RATIO: f64 = 0.01;
/// Escalate: average per-call claim latency, in nanoseconds.
const ESCALATE_AVG_LATENCY_NANOS: f64 = 2_000.0;
/// De-escalate: average per-call claim latency, in nanoseconds.
const DESCALATE_AVG_LATENCY_NANOS: f64 = 500.0;
/// Escalate: distinct producer threads seen recently.
const ESCALATE_DISTINCT_PRODUCERS: u64 = 4;

/// Holds both ring backends simultaneously and routes calls between them.
pub struct AutoScalingLogger {
    single: Logger<Ring<Record>>,
    sharded: Logger<ShardedRing<Record>>,
    mode: Arc<ArcSwap<Mode>>,
    monitor_running: Arc<AtomicBool>,
    monitor: std::sync::Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl AutoScalingLogger {
    /// Wraps an already-started single-ring logger and an already-started
    /// sharded-ring logger, starting in [`Mode::Single`].
    pub fn new(single: Logger<Ring<Record>>, sharded: Logger<ShardedRing<Record>>) -> Self {
        Self {
            single,
            sharded,
            mode: Arc::new(ArcSwap::from_pointee(Mode::Single)),
            monitor_running: Arc::new(AtomicBool::new(false)),
            monitor: std::sync::Mutex::new(None),
        }
    }

    /// Returns the currently active backend.
    pub fn mode(&self) -> Mode {
        **self.mode.load()
    }

    /// Starts the background monitor thread that watches load and switches
    /// `mode` under hysteresis.
    pub fn start_monitoring(&self, window: Duration) {
        let mut slot = self.monitor.lock().expect("autoscale monitor mutex poisoned");
        if slot.is_some() {
            return;
        }
        self.monitor_running.store(true, Ordering::Release);
        let running = Arc::clone(&self.monitor_running);
        let mode = Arc::clone(&self.mode);
        let single_stats = SamplerHandle::new(self.single.clone());
        let sharded_stats = SamplerHandle::new(self.sharded.clone());

        let join = std::thread::Builder::new()
            .name("ringlog-autoscale".to_owned())
            .spawn(move || {
                let mut consecutive = 0u32;
                let mut last_switch = Instant::now() - COOLDOWN;
                let mut prev_single = single_stats.snapshot();
                let mut prev_sharded = sharded_stats.snapshot();

                while running.load(Ordering::Relaxed) {
                    std::thread::sleep(window);
                    let cur_single = single_stats.snapshot();
                    let cur_sharded = sharded_stats.snapshot();

                    let current_mode = **mode.load();
                    let over_threshold = match current_mode {
                        Mode::Single => {
                            window_signals(&prev_single, &cur_single, window).wants_sharded()
                        }
                        Mode::Sharded => {
                            window_signals(&prev_sharded, &cur_sharded, window).wants_single()
                        }
                    };

                    if over_threshold {
                        consecutive += 1;
                    } else {
                        consecutive = 0;
                    }

                    if consecutive >= HYSTERESIS_WINDOWS && last_switch.elapsed() >= COOLDOWN {
                        let next = match current_mode {
                            Mode::Single => Mode::Sharded,
                            Mode::Sharded => Mode::Single,
                        };
                        mode.store(Arc::new(next));
                        last_switch = Instant::now();
                        consecutive = 0;
                    }

                    prev_single = cur_single;
                    prev_sharded = cur_sharded;
                }
            })
            .expect("failed to spawn ringlog autoscale monitor thread");

        *slot = Some(join);
    }

    /// Stops the background monitor thread, if running.
    pub fn stop_monitoring(&self) {
        self.monitor_running.store(false, Ordering::Release);
        if let Some(join) = self.monitor.lock().expect("autoscale monitor mutex poisoned").take() {
            let _ = join.join();
        }
    }

    /// Logs at `level` through whichever backend is currently active.
    #[track_caller]
    pub fn log(&self, level: Level, message: &str, fields: &[Field]) {
        match self.mode() {
            Mode::Single => dispatch(&self.single, level, message, fields),
            Mode::Sharded => dispatch(&self.sharded, level, message, fields),
        }
    }

    /// Flushes whichever backend is currently active.
    pub fn sync(&self, deadline: Duration) -> Result<(), crate::error::FlushError> {
        match self.mode() {
            Mode::Single => self.single.sync(deadline),
            Mode::Sharded => self.sharded.sync(deadline),
        }
    }

    /// Closes both backends (both were alive the whole time; draining
    /// whichever wasn't active is cheap since it received no traffic).
    pub fn close(&self, deadline: Duration) -> Result<(), crate::error::FlushError> {
        self.stop_monitoring();
        let a = self.single.close(deadline);
        let b = self.sharded.close(deadline);
        a.and(b)
    }
}

#[track_caller]
fn dispatch<R: crate::ring::RingStore<Item = Record>>(
    logger: &Logger<R>,
    level: Level,
    message: &str,
    fields: &[Field],
) {
    match level {
        Level::Debug => logger.debug(message, fields),
        Level::Info => logger.info(message, fields),
        Level::Warn => logger.warn(message, fields),
        Level::Error => logger.error(message, fields),
        Level::DPanic => logger.dpanic(message, fields),
        Level::Panic => logger.panic(message, fields),
        Level::Fatal | Level::DisableStacktrace => logger.fatal(message, fields),
    }
}

/// Thin wrapper so the monitor thread can sample either concrete `Logger<R>`
/// uniformly without making the monitor itself generic.
struct SamplerHandle {
    snapshot_fn: Box<dyn Fn() -> StatsSnapshot + Send>,
}

impl SamplerHandle {
    fn new<R: crate::ring::RingStore<Item = Record> + 'static>(logger: Logger<R>) -> Self {
        Self {
            snapshot_fn: Box::new(move || logger.stats()),
        }
    }

    fn snapshot(&self) -> StatsSnapshot {
        (self.snapshot_fn)()
    }
}

/// The four per-window decision signals from spec.md §4.9.
struct WindowSignals {
    writes_per_sec: f64,
    contention_ratio: f64,
    avg_latency_nanos: f64,
    distinct_producers: u64,
}

impl WindowSignals {
    fn wants_sharded(&self) -> bool {
        self.writes_per_sec >= ESCALATE_WRITES_PER_SEC
            || self.contention_ratio >= ESCALATE_CONTENTION_RATIO
            || self.avg_latency_nanos >= ESCALATE_AVG_LATENCY_NANOS
            || self.distinct_producers >= ESCALATE_DISTINCT_PRODUCERS
    }

    fn wants_single(&self) -> bool {
        self.writes_per_sec <= DESCALATE_WRITES_PER_SEC
            && self.contention_ratio <= DESCALATE_CONTENTION_RATIO
            && self.avg_latency_nanos <= DESCALATE_AVG_LATENCY_NANOS
    }
}

fn window_signals(prev: &StatsSnapshot, cur: &StatsSnapshot, window: Duration) -> WindowSignals {
    let writes = cur.buffered.saturating_sub(prev.buffered);
    let contention = cur.contention.saturating_sub(prev.contention);
    let latency_total = cur.latency_nanos_total.saturating_sub(prev.latency_nanos_total);
    let latency_samples = cur.latency_samples.saturating_sub(prev.latency_samples);

    WindowSignals {
        writes_per_sec: writes as f64 / window.as_secs_f64().max(f64::EPSILON),
        contention_ratio: {
            let attempts = writes + contention;
            if attempts == 0 {
                0.0
            } else {
                contention as f64 / attempts as f64
            }
        },
        avg_latency_nanos: if latency_samples == 0 {
            0.0
        } else {
            latency_total as f64 / latency_samples as f64
        },
        distinct_producers: cur.distinct_producers,
    }
}
