//! The dedicated consumer thread (spec.md §4.11 "Consumer loop").
//!
//! One OS thread per [`crate::logger::Logger`], started by
//! [`crate::logger::Logger::start`]. Drains a batch, encodes it, writes it,
//! runs hooks, and reports the flush tombstone (spec.md §4.10) — all
//! isolated from producers by `catch_unwind` so a panicking encoder or hook
//! never takes down a producer thread.

use crate::buffer_pool::BufferPool;
use crate::encoder::Encoder;
use crate::hook::Hook;
use crate::idle::IdleStrategy;
use crate::record::Record;
use crate::ring::RingStore;
use crate::sink::Sink;
use crate::stats::Stats;
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Shared flush-acknowledgment state between [`crate::logger::Logger::sync`]
/// callers and the consumer thread.
pub struct FlushState {
    pub(crate) completed: AtomicU64,
    pub(crate) lock: Mutex<()>,
    pub(crate) condvar: Condvar,
}

impl FlushState {
    pub fn new() -> Self {
        Self {
            completed: AtomicU64::new(0),
            lock: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    fn acknowledge(&self) {
        self.completed.fetch_add(1, Ordering::Release);
        let _guard = self.lock.lock();
        self.condvar.notify_all();
    }
}

impl Default for FlushState {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running consumer thread.
pub struct ConsumerHandle {
    join: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl ConsumerHandle {
    /// Signals the consumer to stop after draining whatever remains, and
    /// waits for it to exit.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawns the consumer thread for `ring`.
#[allow(clippy::too_many_arguments)]
pub fn spawn<R>(
    ring: Arc<R>,
    encoder: Arc<dyn Encoder>,
    sink: Arc<dyn Sink>,
    hooks: Arc<[Arc<dyn Hook>]>,
    buffer_pool: Arc<BufferPool>,
    stats: Arc<Stats>,
    idle: Arc<dyn IdleStrategy>,
    batch_size: usize,
    flush_state: Arc<FlushState>,
    thread_name: String,
) -> ConsumerHandle
where
    R: RingStore<Item = Record> + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    let thread_running = Arc::clone(&running);

    let join = std::thread::Builder::new()
        .name(thread_name)
        .spawn(move || {
            let mut buf = buffer_pool.acquire();
            loop {
                let mut drained_non_flush = 0usize;
                let drained = ring.consume_batch(batch_size, |record: &Record| {
                    let result = catch_unwind(AssertUnwindSafe(|| {
                        if record.is_flush_marker {
                            // Everything claimed ahead of this tombstone must
                            // reach the sink, durably, before the waiting
                            // `sync` caller is woken (spec.md §4.10): flush
                            // the batch buffer and call `sink.sync()` first,
                            // then acknowledge.
                            if !buf.is_empty() {
                                if let Err(_err) = sink.write(&buf) {
                                    stats.record_sink_error();
                                }
                                buf.clear();
                            }
                            if sink.sync().is_err() {
                                stats.record_sink_error();
                            }
                            flush_state.acknowledge();
                            return;
                        }
                        match encoder.encode(record, crate::clock::cached_now_nanos(), &mut buf) {
                            Ok(()) => drained_non_flush += 1,
                            Err(_) => stats.record_encoder_error(),
                        }
                        for hook in hooks.iter() {
                            hook.on_record(record);
                        }
                    }));
                    if result.is_err() {
                        stats.record_panic_recovered();
                    }
                });

                if !buf.is_empty() {
                    if let Err(_err) = sink.write(&buf) {
                        stats.record_sink_error();
                    }
                    buf.clear();
                }
                if drained_non_flush > 0 {
                    stats.record_processed(drained_non_flush as u64);
                }

                if drained == 0 {
                    if !thread_running.load(Ordering::Relaxed) && ring.is_empty() {
                        break;
                    }
                    idle.idle();
                } else {
                    idle.reset();
                }
            }
            let _ = sink.sync();
            buffer_pool.release(buf);
        })
        .expect("failed to spawn ringlog consumer thread");

    ConsumerHandle {
        join: Some(join),
        running,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::idle::Spinning;
    use crate::ring::Ring;
    use crate::sink::MemorySink;

    #[test]
    fn drains_records_and_writes_through_sink() {
        let config = Config::default();
        let ring: Arc<Ring<Record>> = Arc::new(Ring::new(config.capacity).unwrap());
        let sink = Arc::new(MemorySink::new());
        let encoder: Arc<dyn Encoder> = Arc::new(crate::encoder::TextEncoder::default());
        let hooks: Arc<[Arc<dyn Hook>]> = Arc::from(Vec::<Arc<dyn Hook>>::new());
        let pool = Arc::new(BufferPool::default());
        let stats = Arc::new(Stats::new());
        let idle: Arc<dyn IdleStrategy> = Arc::new(Spinning);
        let flush_state = Arc::new(FlushState::new());

        ring.claim(|r| {
            r.reset();
            r.message.push_str("hello");
        })
        .unwrap();

        let handle = spawn(
            Arc::clone(&ring),
            encoder,
            sink.clone() as Arc<dyn Sink>,
            hooks,
            pool,
            Arc::clone(&stats),
            idle,
            32,
            flush_state,
            "test-consumer".to_owned(),
        );

        std::thread::sleep(std::time::Duration::from_millis(50));
        handle.stop();

        let written = String::from_utf8(sink.contents()).unwrap();
        assert!(written.contains("hello"));
        assert_eq!(stats.snapshot().processed, 1);
    }
}
