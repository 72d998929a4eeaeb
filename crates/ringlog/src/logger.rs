//! The logging facade (spec.md §4.2, §4.4, §4.9, §4.10).
//!
//! `Logger<R>` is generic over its ring backend so the hot path — level
//! check, sample check, claim, populate, commit — is fully monomorphised
//! for either [`crate::ring::Ring`] (spec.md §4.5) or
//! [`crate::shard::ShardedRing`] (spec.md §4.6), never going through a
//! vtable for the part of the call that actually touches the ring.

use crate::buffer_pool::BufferPool;
use crate::caller::Caller;
use crate::config::{BackpressurePolicy, Config};
use crate::consumer::{self, ConsumerHandle, FlushState};
use crate::encoder::Encoder;
use crate::error::{ConfigError, FlushError};
use crate::field::Field;
use crate::hook::Hook;
use crate::idle::{Adaptive, IdleStrategy};
use crate::level::{Level, LevelFilter};
use crate::record::Record;
use crate::ring::{Ring, RingStore};
use crate::sampler::{NoopSampler, Sampler};
use crate::shard::ShardedRing;
use crate::sink::Sink;
use crate::stats::{Stats, StatsSnapshot};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Window over which [`Logger::stats`] counts a producer thread as "recent"
/// for the distinct-producers signal (spec.md §4.9).
const DISTINCT_PRODUCER_WINDOW: Duration = Duration::from_secs(5);

/// A structured logger bound to one ring backend `R`.
///
/// Cloning a `Logger` is cheap (every shared field is an `Arc`) and is how
/// derived loggers ([`Logger::named`], [`Logger::with`]) are produced: they
/// share the ring, consumer thread, and stats with their parent, differing
/// only in `logger_name` and `bound_fields`.
pub struct Logger<R: RingStore<Item = Record>> {
    ring: Arc<R>,
    level_filter: Arc<LevelFilter>,
    sampler: Arc<dyn Sampler>,
    stats: Arc<Stats>,
    idle: Arc<dyn IdleStrategy>,
    flush_state: Arc<FlushState>,
    flush_requested: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
    logger_name: String,
    bound_fields: Vec<Field>,
    development: bool,
    enable_caller: bool,
    caller_skip: u32,
    stack_level: Level,
    stack_capture: Arc<dyn Fn() -> Option<String> + Send + Sync>,
    backpressure_policy: BackpressurePolicy,
    encoder: Arc<dyn Encoder>,
    sink: Arc<dyn Sink>,
    hooks: Arc<[Arc<dyn Hook>]>,
    buffer_pool: Arc<BufferPool>,
    batch_size: usize,
    consumer: Arc<Mutex<Option<ConsumerHandle>>>,
}

impl<R: RingStore<Item = Record>> Clone for Logger<R> {
    fn clone(&self) -> Self {
        Self {
            ring: Arc::clone(&self.ring),
            level_filter: Arc::clone(&self.level_filter),
            sampler: Arc::clone(&self.sampler),
            stats: Arc::clone(&self.stats),
            idle: Arc::clone(&self.idle),
            flush_state: Arc::clone(&self.flush_state),
            flush_requested: Arc::clone(&self.flush_requested),
            closed: Arc::clone(&self.closed),
            logger_name: self.logger_name.clone(),
            bound_fields: self.bound_fields.clone(),
            development: self.development,
            enable_caller: self.enable_caller,
            caller_skip: self.caller_skip,
            stack_level: self.stack_level,
            stack_capture: Arc::clone(&self.stack_capture),
            backpressure_policy: self.backpressure_policy,
            encoder: Arc::clone(&self.encoder),
            sink: Arc::clone(&self.sink),
            hooks: Arc::clone(&self.hooks),
            buffer_pool: Arc::clone(&self.buffer_pool),
            batch_size: self.batch_size,
            consumer: Arc::clone(&self.consumer),
        }
    }
}

/// Construction parameters not carried by [`Config`] (spec.md §6 "external
/// interface"): the pluggable encoder/sink/hooks and optional sampler.
pub struct LoggerBuilder {
    config: Config,
    encoder: Arc<dyn Encoder>,
    sink: Arc<dyn Sink>,
    hooks: Vec<Arc<dyn Hook>>,
    sampler: Arc<dyn Sampler>,
    idle: Option<Arc<dyn IdleStrategy>>,
    buffer_pool: Arc<BufferPool>,
    stack_capture: Option<Arc<dyn Fn() -> Option<String> + Send + Sync>>,
}

impl LoggerBuilder {
    /// Starts a builder from a validated [`Config`] plus the two mandatory
    /// pluggable components.
    pub fn new(config: Config, encoder: Arc<dyn Encoder>, sink: Arc<dyn Sink>) -> Self {
        Self {
            config,
            encoder,
            sink,
            hooks: Vec::new(),
            sampler: Arc::new(NoopSampler),
            idle: None,
            buffer_pool: Arc::new(BufferPool::default()),
            stack_capture: None,
        }
    }

    /// Registers a consumer-side observation hook.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Installs a sampler (default: allow everything).
    #[must_use]
    pub fn with_sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Overrides the default [`Adaptive`] idle strategy.
    #[must_use]
    pub fn with_idle_strategy(mut self, idle: Arc<dyn IdleStrategy>) -> Self {
        self.idle = Some(idle);
        self
    }

    /// Overrides the default encode-buffer pool.
    #[must_use]
    pub fn with_buffer_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.buffer_pool = pool;
        self
    }

    /// Installs a pluggable stacktrace capture function, invoked on the
    /// producer's hot path only when `level >= config.stack_level` (spec.md
    /// §4.4 step 3). Defaults to a no-op returning `None`.
    #[must_use]
    pub fn with_stack_capture(mut self, capture: Arc<dyn Fn() -> Option<String> + Send + Sync>) -> Self {
        self.stack_capture = Some(capture);
        self
    }

    /// Builds a [`Logger`] over a single shared [`Ring`] (spec.md §4.5).
    pub fn build_single(self) -> Result<Logger<Ring<Record>>, ConfigError> {
        let ring = Arc::new(Ring::new(self.config.capacity)?);
        Ok(Logger::from_parts(ring, self.config, self))
    }

    /// Builds a [`Logger`] over a [`ShardedRing`] (spec.md §4.6).
    pub fn build_sharded(self) -> Result<Logger<ShardedRing<Record>>, ConfigError> {
        let per_shard = self.config.capacity / self.config.num_rings.max(1);
        let ring = Arc::new(ShardedRing::new(
            self.config.num_rings,
            per_shard.max(1).next_power_of_two(),
        )?);
        Ok(Logger::from_parts(ring, self.config, self))
    }
}

impl<R: RingStore<Item = Record>> Logger<R> {
    fn from_parts(ring: Arc<R>, config: Config, builder: LoggerBuilder) -> Self {
        Self {
            ring,
            level_filter: Arc::new(LevelFilter::default()),
            sampler: builder.sampler,
            stats: Arc::new(Stats::new()),
            idle: builder.idle.unwrap_or_else(|| Arc::new(Adaptive::default())),
            flush_state: Arc::new(FlushState::new()),
            flush_requested: Arc::new(AtomicU64::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
            logger_name: String::new(),
            bound_fields: Vec::new(),
            development: config.development,
            enable_caller: config.enable_caller,
            caller_skip: config.caller_skip,
            stack_level: config.stack_level,
            stack_capture: builder
                .stack_capture
                .unwrap_or_else(|| Arc::new(|| None) as Arc<dyn Fn() -> Option<String> + Send + Sync>),
            backpressure_policy: config.backpressure_policy,
            encoder: builder.encoder,
            sink: builder.sink,
            hooks: Arc::from(builder.hooks),
            buffer_pool: builder.buffer_pool,
            batch_size: config.batch_size,
            consumer: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts the dedicated consumer thread. Calling this more than once
    /// (e.g. on a derived logger that shares the parent's consumer slot) is
    /// a no-op past the first call.
    pub fn start(&self) -> &Self
    where
        R: 'static,
    {
        let mut slot = self.consumer.lock();
        if slot.is_some() {
            return self;
        }
        let handle = consumer::spawn(
            Arc::clone(&self.ring),
            Arc::clone(&self.encoder),
            Arc::clone(&self.sink),
            Arc::clone(&self.hooks),
            Arc::clone(&self.buffer_pool),
            Arc::clone(&self.stats),
            Arc::clone(&self.idle),
            self.batch_size,
            Arc::clone(&self.flush_state),
            format!("ringlog-consumer-{}", if self.logger_name.is_empty() { "root" } else { &self.logger_name }),
        );
        *slot = Some(handle);
        self
    }

    /// Flushes every record claimed (by the calling thread) before this
    /// call, blocking up to `deadline`, then stops accepting new records
    /// and joins the consumer thread.
    ///
    /// Per SPEC_FULL.md's resolution of an Open Question: close does not
    /// wait for producers currently parked on a full ring under the
    /// `Block` policy — it only guarantees already-committed records (and
    /// the flush tombstone itself) drain.
    pub fn close(&self, deadline: Duration) -> Result<(), FlushError> {
        let result = self.sync(deadline);
        self.closed.store(true, Ordering::Release);
        self.ring.close();
        if let Some(handle) = self.consumer.lock().take() {
            handle.stop();
        }
        result
    }

    /// Blocks until every record claimed (by any producer thread) before
    /// this call has been drained by the consumer, or `deadline` elapses.
    ///
    /// Under a sharded ring (spec.md §4.6), a single tombstone would only
    /// ever land on the calling thread's own shard, guaranteeing nothing
    /// about records sitting in the others. Per spec.md §4.6, a tombstone is
    /// enqueued on *every* shard and all of them are waited on jointly.
    pub fn sync(&self, deadline: Duration) -> Result<(), FlushError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FlushError::LoggerClosed);
        }
        let shard_count = self.ring.shard_count() as u64;
        let target = self.flush_requested.fetch_add(shard_count, Ordering::AcqRel) + shard_count;
        let deadline_instant = Instant::now() + deadline;

        for shard in 0..self.ring.shard_count() {
            loop {
                match self.ring.claim_on_shard(shard, |record| {
                    record.reset();
                    record.is_flush_marker = true;
                }) {
                    Ok(true) => break,
                    Ok(false) => {
                        if Instant::now() >= deadline_instant {
                            return Err(FlushError::DeadlineExceeded);
                        }
                        self.idle.idle();
                    }
                    Err(_) => return Err(FlushError::LoggerClosed),
                }
            }
        }
        self.idle.wake_up();

        let mut guard = self.flush_state.lock.lock();
        while self.flush_state.completed.load(Ordering::Acquire) < target {
            let remaining = deadline_instant.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(FlushError::DeadlineExceeded);
            }
            let result = self.flush_state.condvar.wait_for(&mut guard, remaining);
            if result.timed_out() && self.flush_state.completed.load(Ordering::Acquire) < target {
                return Err(FlushError::DeadlineExceeded);
            }
        }
        Ok(())
    }

    /// Sets the minimum enabled level.
    pub fn set_level(&self, level: Level) {
        self.level_filter.set(level);
    }

    /// Returns the minimum enabled level.
    pub fn level(&self) -> Level {
        self.level_filter.get()
    }

    /// A read-only snapshot of this logger's counters (spec.md §6: `stats()
    /// -> { capacity, batch_size, buffered, processed, dropped, ... }`).
    pub fn stats(&self) -> StatsSnapshot {
        let mut snap = self.stats.snapshot();
        snap.capacity = self.ring.capacity() as u64;
        snap.batch_size = self.batch_size as u64;
        snap.contention = self.ring.contention();
        snap.distinct_producers = self
            .stats
            .distinct_producers_since(crate::clock::cached_now_nanos(), DISTINCT_PRODUCER_WINDOW);
        snap
    }

    /// Derives a child logger whose name is `parent.child` (spec.md §4.2
    /// "Derived loggers"), sharing every other resource with `self`.
    #[must_use]
    pub fn named(&self, child: &str) -> Self {
        let mut next = self.clone();
        next.logger_name = if self.logger_name.is_empty() {
            child.to_owned()
        } else {
            format!("{}.{}", self.logger_name, child)
        };
        next
    }

    /// Derives a child logger with `fields` bound to every subsequent call
    /// (spec.md §4.2), in addition to any already bound on `self`.
    #[must_use]
    pub fn with(&self, fields: impl IntoIterator<Item = Field>) -> Self {
        let mut next = self.clone();
        next.bound_fields.extend(fields);
        next
    }

    #[track_caller]
    fn log(&self, level: Level, message: &str, fields: &[Field]) {
        if !self.level_filter.enabled(level) {
            return;
        }
        if !self.sampler.allow(level) {
            return;
        }
        if self.closed.load(Ordering::Relaxed) {
            return;
        }

        // Called directly (not via a combinator) so `#[track_caller]`
        // resolves through this function's own call site rather than
        // through a generic helper's internals.
        let caller = if self.enable_caller {
            if self.caller_skip > 0 {
                Caller::capture_at_depth(self.caller_skip)
            } else {
                Some(Caller::capture())
            }
        } else {
            None
        };
        let timestamp_nanos = crate::clock::cached_now_nanos();
        self.stats.record_producer_seen(timestamp_nanos);
        let stacktrace = if level >= self.stack_level {
            (self.stack_capture)()
        } else {
            None
        };
        let bound_fields = &self.bound_fields;
        let logger_name = &self.logger_name;
        let dropped_fields = std::cell::Cell::new(0u32);

        let populate = |record: &mut Record| {
            record.reset();
            record.level = level;
            record.message.push_str(message);
            record.logger_name.push_str(logger_name);
            record.timestamp_nanos = timestamp_nanos;
            record.caller = caller;
            record.stacktrace = stacktrace;
            record.extend_fields(bound_fields.iter().cloned());
            record.extend_fields(fields.iter().cloned());
            dropped_fields.set(record.dropped_field_count);
        };

        let outcome = match self.backpressure_policy {
            BackpressurePolicy::Drop => self.ring.claim(populate),
            BackpressurePolicy::Block => self.ring.claim_blocking(self.idle.as_ref(), populate).map(|()| true),
        };

        match outcome {
            Ok(true) => {
                self.stats.record_buffered();
                self.stats.record_dropped_fields(u64::from(dropped_fields.get()));
                let elapsed = (crate::clock::cached_now_nanos() - timestamp_nanos).max(0) as u64;
                self.stats.record_latency(elapsed);
                self.idle.wake_up();
            }
            Ok(false) | Err(_) => self.stats.record_dropped(),
        }

        match level {
            Level::Fatal => {
                let _ = self.sync(Duration::from_secs(5));
                std::process::exit(1);
            }
            Level::Panic => panic!("{message}"),
            Level::DPanic if self.development => panic!("{message}"),
            _ => {}
        }
    }

    /// Logs at [`Level::Debug`].
    #[track_caller]
    pub fn debug(&self, message: &str, fields: &[Field]) {
        self.log(Level::Debug, message, fields);
    }
    /// Logs at [`Level::Info`].
    #[track_caller]
    pub fn info(&self, message: &str, fields: &[Field]) {
        self.log(Level::Info, message, fields);
    }
    /// Logs at [`Level::Warn`].
    #[track_caller]
    pub fn warn(&self, message: &str, fields: &[Field]) {
        self.log(Level::Warn, message, fields);
    }
    /// Logs at [`Level::Error`].
    #[track_caller]
    pub fn error(&self, message: &str, fields: &[Field]) {
        self.log(Level::Error, message, fields);
    }
    /// Logs at [`Level::DPanic`]: panics if `development` mode is on.
    #[track_caller]
    pub fn dpanic(&self, message: &str, fields: &[Field]) {
        self.log(Level::DPanic, message, fields);
    }
    /// Logs at [`Level::Panic`], then panics unconditionally.
    #[track_caller]
    pub fn panic(&self, message: &str, fields: &[Field]) {
        self.log(Level::Panic, message, fields);
    }
    /// Logs at [`Level::Fatal`], flushes, then terminates the process.
    #[track_caller]
    pub fn fatal(&self, message: &str, fields: &[Field]) {
        self.log(Level::Fatal, message, fields);
    }

    /// Printf-style variant of [`Logger::debug`]: pass `format_args!(...)`.
    #[track_caller]
    pub fn debugf(&self, args: std::fmt::Arguments<'_>) {
        self.log(Level::Debug, &args.to_string(), &[]);
    }
    /// Printf-style variant of [`Logger::info`].
    #[track_caller]
    pub fn infof(&self, args: std::fmt::Arguments<'_>) {
        self.log(Level::Info, &args.to_string(), &[]);
    }
    /// Printf-style variant of [`Logger::warn`].
    #[track_caller]
    pub fn warnf(&self, args: std::fmt::Arguments<'_>) {
        self.log(Level::Warn, &args.to_string(), &[]);
    }
    /// Printf-style variant of [`Logger::error`].
    #[track_caller]
    pub fn errorf(&self, args: std::fmt::Arguments<'_>) {
        self.log(Level::Error, &args.to_string(), &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use std::time::Duration;

    fn test_logger() -> (Logger<Ring<Record>>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let builder = LoggerBuilder::new(
            Config::new(64, 16, crate::config::Architecture::Single, 1).unwrap(),
            Arc::new(crate::encoder::TextEncoder::default()),
            sink.clone() as Arc<dyn Sink>,
        );
        let logger = builder.build_single().unwrap();
        logger.start();
        (logger, sink)
    }

    #[test]
    fn logs_pass_through_to_sink() {
        let (logger, sink) = test_logger();
        logger.info("hello", &[]);
        logger.close(Duration::from_secs(1)).unwrap();
        let text = String::from_utf8(sink.contents()).unwrap();
        assert!(text.contains("hello"));
    }

    #[test]
    fn level_filter_suppresses_disabled_calls() {
        let (logger, sink) = test_logger();
        logger.set_level(Level::Warn);
        logger.info("suppressed", &[]);
        logger.warn("visible", &[]);
        logger.close(Duration::from_secs(1)).unwrap();
        let text = String::from_utf8(sink.contents()).unwrap();
        assert!(!text.contains("suppressed"));
        assert!(text.contains("visible"));
    }

    #[test]
    fn derived_logger_composes_dotted_name_and_bound_fields() {
        let (logger, sink) = test_logger();
        let child = logger.named("db").with(vec![Field::string("shard", "0")]);
        child.info("connected", &[]);
        logger.close(Duration::from_secs(1)).unwrap();
        let text = String::from_utf8(sink.contents()).unwrap();
        assert!(text.contains("logger=db"));
        assert!(text.contains("shard="));
    }

    #[test]
    fn sync_blocks_until_prior_records_drain() {
        let (logger, sink) = test_logger();
        for i in 0..10 {
            logger.info(&format!("line {i}"), &[]);
        }
        logger.sync(Duration::from_secs(2)).unwrap();
        let text = String::from_utf8(sink.contents()).unwrap();
        assert!(text.contains("line 9"));
        logger.close(Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn secret_fields_are_redacted_end_to_end() {
        let (logger, sink) = test_logger();
        logger.info("login", &[Field::secret("password", "hunter2")]);
        logger.close(Duration::from_secs(1)).unwrap();
        let text = String::from_utf8(sink.contents()).unwrap();
        assert!(!text.contains("hunter2"));
    }
}
