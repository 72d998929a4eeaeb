//! Log level and the atomic level filter (spec.md §3 "Level", §4.7).

use std::sync::atomic::{AtomicI32, Ordering};

/// Total order of severities, `Debug < Info < ... < Fatal`.
///
/// `DisableStacktrace` is a sentinel above `Fatal` used only as a
/// `stack_level` value meaning "never capture a stacktrace" — it is never
/// the level of an actual record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum Level {
    /// Verbose diagnostic detail.
    Debug = 0,
    /// Normal operational messages.
    Info = 1,
    /// Recoverable but noteworthy conditions.
    Warn = 2,
    /// Errors that do not abort the current operation.
    Error = 3,
    /// Error that panics in development mode only.
    DPanic = 4,
    /// Error that always panics after the record is committed.
    Panic = 5,
    /// Error that flushes and terminates the process.
    Fatal = 6,
    /// Sentinel: disables stacktrace collection regardless of level.
    DisableStacktrace = 7,
}

impl Level {
    /// Lossless round-trip through the `i32` representation used by the
    /// atomic filter cell.
    #[inline]
    pub const fn from_i32(v: i32) -> Option<Self> {
        Some(match v {
            0 => Self::Debug,
            1 => Self::Info,
            2 => Self::Warn,
            3 => Self::Error,
            4 => Self::DPanic,
            5 => Self::Panic,
            6 => Self::Fatal,
            7 => Self::DisableStacktrace,
            _ => return None,
        })
    }

    /// Short, lowercase name as most encoders would render it.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::DPanic => "dpanic",
            Self::Panic => "panic",
            Self::Fatal => "fatal",
            Self::DisableStacktrace => "disable_stacktrace",
        }
    }
}

/// Lock-free minimum-level filter, shared by every producer thread.
///
/// `Enabled(l)` is the single atomic load on the hot path described in
/// spec.md §4.4 step 1.
#[derive(Debug)]
pub struct LevelFilter {
    min: AtomicI32,
}

impl LevelFilter {
    /// Creates a filter with the given initial minimum level.
    pub fn new(level: Level) -> Self {
        Self {
            min: AtomicI32::new(level as i32),
        }
    }

    /// Atomically updates the minimum level.
    #[inline]
    pub fn set(&self, level: Level) {
        self.min.store(level as i32, Ordering::Relaxed);
    }

    /// Returns the current minimum level.
    #[inline]
    pub fn get(&self) -> Level {
        Level::from_i32(self.min.load(Ordering::Relaxed)).unwrap_or(Level::Info)
    }

    /// Returns `true` if `level` passes the filter (spec.md §4.4 step 1).
    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        (level as i32) >= self.min.load(Ordering::Relaxed)
    }
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::new(Level::Info)
    }
}
