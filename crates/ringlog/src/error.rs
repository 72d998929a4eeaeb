//! Error taxonomy for `ringlog-core` (spec.md §7).
//!
//! Logging calls themselves never return errors — failures on the hot path
//! surface only through [`crate::stats::Stats`] counters (spec.md §7
//! "Propagation policy"). These types cover the lifecycle operations that
//! *do* return explicit results: construction, flush, and sink/encoder
//! reporting.

use thiserror::Error;

/// Errors raised while validating a [`crate::config::Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `capacity` was not a power of two.
    #[error("ring capacity {0} is not a power of two")]
    CapacityNotPowerOfTwo(usize),

    /// `capacity` was zero.
    #[error("ring capacity must be positive")]
    CapacityNotPositive,

    /// `batch_size` exceeded `capacity`.
    #[error("batch_size {batch_size} exceeds capacity {capacity}")]
    BatchSizeExceedsCapacity {
        /// The configured batch size.
        batch_size: usize,
        /// The configured ring capacity.
        capacity: usize,
    },

    /// `num_rings` was zero or otherwise out of range for the sharded topology.
    #[error("num_rings {0} is out of range (must be 1..=128)")]
    InvalidShardCount(usize),
}

/// Error returned by [`crate::logger::Logger::sync`] when the flush deadline
/// elapses before the consumer acknowledges the tombstone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlushError {
    /// The configured (or caller-supplied) deadline elapsed first.
    #[error("flush deadline elapsed before the consumer acknowledged")]
    DeadlineExceeded,

    /// The logger was already closed; there is no consumer left to flush through.
    #[error("logger is closed")]
    LoggerClosed,
}

/// Error surfaced by a [`crate::sink::Sink`] implementation.
///
/// Sink errors never stop the consumer loop (spec.md §4.11): they are
/// counted on [`crate::stats::Stats`] and, if registered, passed to the
/// logger's error-handler hook.
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    /// The underlying write failed.
    #[error("sink write failed: {0}")]
    Write(String),

    /// The underlying sync/flush failed.
    #[error("sink sync failed: {0}")]
    Sync(String),

    /// The sink was already closed.
    #[error("sink is closed")]
    Closed,
}

/// Error surfaced by a [`crate::encoder::Encoder`] implementation.
///
/// Like [`SinkError`], never stops the consumer loop: counted on
/// [`crate::stats::Stats`] and the malformed record is dropped rather than
/// written.
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    /// The record could not be serialized in its current form.
    #[error("encode failed: {0}")]
    Failed(String),
}

/// Error returned by [`crate::ring::Ring::claim`]-adjacent registration APIs
/// (sharded-ring shard registration, mirroring the teacher's `ChannelError`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// The ring (or every shard of a sharded ring) has been closed.
    #[error("ring is closed")]
    Closed,
}

impl FlushError {
    /// Returns `true` if retrying the flush later could plausibly succeed.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }
}
