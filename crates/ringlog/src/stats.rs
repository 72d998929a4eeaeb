//! Observability counters (spec.md §7 "Propagation policy", §9 "Stats").
//!
//! Hot-path failures (ring full, field overflow, encoder/sink errors) never
//! return a `Result` to the caller; they increment a counter here instead.
//! This mirrors the teacher's `Metrics` struct in spirit, but backs every
//! field with its own atomic so readers never need a lock. Each counter is
//! `CachePadded` (the teacher's dependency on `crossbeam-utils`, used here
//! the same way it uses `CacheAligned` in `ring.rs`): these counters are
//! written from every producer thread, so without padding they would sit
//! on one or two cache lines and turn every log call into a false-sharing
//! hot spot.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Number of thread-hash buckets used to approximate the count of distinct
/// recent producer threads (spec.md §4.9's "distinct producers" signal).
/// Collisions under-count rather than over-count, which is the safer
/// direction for an escalation signal.
const RECENT_PRODUCER_SLOTS: usize = 64;

/// Atomics-backed counters, one instance shared between every producer and
/// the consumer thread.
#[derive(Debug)]
pub struct Stats {
    /// Records successfully claimed and committed into the ring.
    pub buffered: CachePadded<AtomicU64>,
    /// Records drained and handed to the encoder/sink by the consumer.
    pub processed: CachePadded<AtomicU64>,
    /// Records dropped because the ring (or a shard) was full under the
    /// `Drop` backpressure policy.
    pub dropped: CachePadded<AtomicU64>,
    /// Individual fields dropped due to per-record capacity overflow.
    pub dropped_fields: CachePadded<AtomicU64>,
    /// Errors returned by [`crate::sink::Sink::write`] or `sync`.
    pub sink_errors: CachePadded<AtomicU64>,
    /// Errors returned by [`crate::encoder::Encoder::encode`].
    pub encoder_errors: CachePadded<AtomicU64>,
    /// Panics caught and recovered inside the consumer loop.
    pub panics_recovered: CachePadded<AtomicU64>,
    /// Sum of per-call claim latency in nanoseconds, for the auto-scaling
    /// monitor's average-latency signal (spec.md §4.9).
    latency_nanos_total: CachePadded<AtomicU64>,
    /// Number of latency samples contributing to `latency_nanos_total`.
    latency_samples: CachePadded<AtomicU64>,
    /// Last-seen timestamp (nanos) per thread-hash bucket, used to
    /// approximate the count of distinct recent producer threads.
    recent_producers: Box<[AtomicI64]>,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            buffered: CachePadded::new(AtomicU64::new(0)),
            processed: CachePadded::new(AtomicU64::new(0)),
            dropped: CachePadded::new(AtomicU64::new(0)),
            dropped_fields: CachePadded::new(AtomicU64::new(0)),
            sink_errors: CachePadded::new(AtomicU64::new(0)),
            encoder_errors: CachePadded::new(AtomicU64::new(0)),
            panics_recovered: CachePadded::new(AtomicU64::new(0)),
            latency_nanos_total: CachePadded::new(AtomicU64::new(0)),
            latency_samples: CachePadded::new(AtomicU64::new(0)),
            recent_producers: (0..RECENT_PRODUCER_SLOTS).map(|_| AtomicI64::new(i64::MIN)).collect(),
        }
    }
}

/// A point-in-time snapshot of [`Stats`], safe to pass across threads or
/// serialize for an encoder's own diagnostic output.
///
/// `capacity` and `batch_size` are not tracked by [`Stats`] itself (they are
/// properties of the ring and the configured consumer batch, not counters);
/// [`crate::logger::Logger::stats`] fills them in, matching spec.md §6's
/// documented `stats() -> { capacity, batch_size, buffered, processed,
/// dropped, ... }` surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Ring (or summed shard) capacity in slots.
    pub capacity: u64,
    /// Configured consumer batch size.
    pub batch_size: u64,
    /// See [`Stats::buffered`].
    pub buffered: u64,
    /// See [`Stats::processed`].
    pub processed: u64,
    /// See [`Stats::dropped`].
    pub dropped: u64,
    /// See [`Stats::dropped_fields`].
    pub dropped_fields: u64,
    /// See [`Stats::sink_errors`].
    pub sink_errors: u64,
    /// See [`Stats::encoder_errors`].
    pub encoder_errors: u64,
    /// See [`Stats::panics_recovered`].
    pub panics_recovered: u64,
    /// Summed ring CAS-retry contention (see [`crate::ring::Ring::contention`]).
    pub contention: u64,
    /// Sum of per-call claim latency in nanoseconds since construction.
    pub latency_nanos_total: u64,
    /// Number of samples contributing to `latency_nanos_total`.
    pub latency_samples: u64,
    /// Approximate count of distinct producer threads seen recently (see
    /// [`Stats::distinct_producers_since`]).
    pub distinct_producers: u64,
}

impl Stats {
    /// Creates a fresh, zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a consistent-enough snapshot (each field loaded independently;
    /// counters may be marginally skewed relative to each other under
    /// concurrent updates, which is acceptable for a diagnostics surface).
    /// `capacity`, `batch_size`, and `contention` are left at `0`: `Stats`
    /// itself has no notion of ring topology, so `Logger::stats` fills them
    /// in from the ring it owns.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            capacity: 0,
            batch_size: 0,
            buffered: self.buffered.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            dropped_fields: self.dropped_fields.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
            encoder_errors: self.encoder_errors.load(Ordering::Relaxed),
            panics_recovered: self.panics_recovered.load(Ordering::Relaxed),
            contention: 0,
            latency_nanos_total: self.latency_nanos_total.load(Ordering::Relaxed),
            latency_samples: self.latency_samples.load(Ordering::Relaxed),
            distinct_producers: 0,
        }
    }

    /// Records a producer-thread claim latency sample, in nanoseconds.
    #[inline]
    pub(crate) fn record_latency(&self, nanos: u64) {
        self.latency_nanos_total.fetch_add(nanos, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Marks the calling thread as an active producer as of `now_nanos`,
    /// for [`Stats::distinct_producers_since`] to later count.
    #[inline]
    pub(crate) fn record_producer_seen(&self, now_nanos: i64) {
        let slot = Self::producer_slot();
        self.recent_producers[slot].store(now_nanos, Ordering::Relaxed);
    }

    /// Approximate count of distinct producer threads that called
    /// [`Stats::record_producer_seen`] within `window` of `now_nanos`.
    pub fn distinct_producers_since(&self, now_nanos: i64, window: Duration) -> u64 {
        let cutoff = now_nanos.saturating_sub(window.as_nanos() as i64);
        self.recent_producers
            .iter()
            .filter(|slot| slot.load(Ordering::Relaxed) >= cutoff)
            .count() as u64
    }

    fn producer_slot() -> usize {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::thread::current().id().hash(&mut hasher);
        (hasher.finish() as usize) % RECENT_PRODUCER_SLOTS
    }

    #[inline]
    pub(crate) fn record_buffered(&self) {
        self.buffered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_processed(&self, n: u64) {
        self.processed.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dropped_fields(&self, n: u64) {
        if n > 0 {
            self.dropped_fields.fetch_add(n, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn record_sink_error(&self) {
        self.sink_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_encoder_error(&self) {
        self.encoder_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_panic_recovered(&self) {
        self.panics_recovered.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_updates() {
        let stats = Stats::new();
        stats.record_buffered();
        stats.record_dropped();
        stats.record_dropped_fields(3);
        let snap = stats.snapshot();
        assert_eq!(snap.buffered, 1);
        assert_eq!(snap.dropped, 1);
        assert_eq!(snap.dropped_fields, 3);
        assert_eq!(snap.processed, 0);
    }
}
