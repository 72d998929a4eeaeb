//! The sharded-ring backend (spec.md §4.6 "Sharded ring").
//!
//! This is the teacher crate's `Channel<T>`/`Producer<T>` design
//! (`channel.rs`): N independent rings, one fan-in consumer. The teacher
//! assigns producers to rings via explicit `register()` calls returning a
//! non-`Clone` `Producer<T>` handle bound to one ring for its whole
//! lifetime; here, since `Logger` calls are made from arbitrary application
//! threads rather than from dedicated registered producer threads, shard
//! assignment is instead a thread-local affinity hash assigned lazily on
//! first use, and the fan-in consumer round-robins across shards rather
//! than iterating a fixed `0..producer_count` (spec.md §4.6: "round-robin
//! across shards" with no producer registration step).

use crate::error::{ConfigError, RingError};
use crate::idle::IdleStrategy;
use crate::ring::{Ring, RingStore};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

thread_local! {
    static SHARD_HINT: Cell<Option<usize>> = const { Cell::new(None) };
}

/// N independent [`Ring`]s behind one logical multi-producer queue.
///
/// Grounded on the teacher's ring-decomposition design: true single-ring
/// CAS contention (see [`crate::ring::Ring`]) is traded for N rings that
/// each see only a fraction of the producer traffic, at the cost of losing
/// strict global FIFO order (ordering is preserved per-shard, which is what
/// spec.md §4.6 requires: "ordering within a single producer is preserved").
pub struct ShardedRing<T> {
    rings: Box<[Ring<T>]>,
    next_shard: AtomicUsize,
    closed: AtomicBool,
}

impl<T: Default> ShardedRing<T> {
    /// Creates a sharded ring with `num_shards` independent rings, each of
    /// `capacity_per_shard` slots.
    pub fn new(num_shards: usize, capacity_per_shard: usize) -> Result<Self, ConfigError> {
        if !(1..=128).contains(&num_shards) {
            return Err(ConfigError::InvalidShardCount(num_shards));
        }
        let rings = (0..num_shards)
            .map(|_| Ring::new(capacity_per_shard))
            .collect::<Result<Vec<_>, _>>()?
            .into_boxed_slice();
        Ok(Self {
            rings,
            next_shard: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }
}

impl<T> ShardedRing<T> {
    /// Number of independent rings backing this shard set.
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.rings.len()
    }

    /// Assigns (and caches) the calling thread's shard via round-robin over
    /// first-use order. Every subsequent call from the same thread reuses
    /// the same shard, which is what guarantees per-producer FIFO order.
    fn shard_for_current_thread(&self) -> usize {
        SHARD_HINT.with(|cell| {
            if let Some(idx) = cell.get() {
                idx
            } else {
                let idx = self.next_shard.fetch_add(1, Ordering::Relaxed) % self.rings.len();
                cell.set(Some(idx));
                idx
            }
        })
    }

    /// Claims a slot on the calling thread's assigned shard.
    pub fn claim(&self, f: impl FnOnce(&mut T)) -> Result<bool, RingError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(RingError::Closed);
        }
        self.rings[self.shard_for_current_thread()].claim(f)
    }

    /// Claims a slot on a specific shard, bypassing the calling thread's
    /// own affinity. Used by [`crate::logger::Logger::sync`] to enqueue a
    /// flush tombstone on every shard in turn (spec.md §4.6).
    pub fn claim_on_shard(&self, shard: usize, f: impl FnOnce(&mut T)) -> Result<bool, RingError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(RingError::Closed);
        }
        self.rings[shard].claim(f)
    }

    /// Claims a slot on the calling thread's assigned shard, retrying via
    /// `idle` until space frees or the shard set closes.
    pub fn claim_blocking(
        &self,
        idle: &dyn IdleStrategy,
        f: impl FnOnce(&mut T),
    ) -> Result<(), RingError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(RingError::Closed);
        }
        self.rings[self.shard_for_current_thread()].claim_blocking(idle, f)
    }

    /// Drains up to `max` records fairly across shards: each round offers
    /// every shard an equal quota (`ceil(max / shard_count)`), repeating
    /// until `max` is reached or a full round drains nothing.
    pub fn consume_batch(&self, max: usize, mut f: impl FnMut(&T)) -> usize {
        let n_shards = self.rings.len();
        if n_shards == 0 || max == 0 {
            return 0;
        }
        let per_round_quota = max.div_ceil(n_shards);
        let mut total = 0;
        loop {
            let mut progressed = false;
            for ring in self.rings.iter() {
                if total >= max {
                    break;
                }
                let take = per_round_quota.min(max - total);
                let got = ring.consume_batch(take, &mut f);
                if got > 0 {
                    progressed = true;
                }
                total += got;
            }
            if total >= max || !progressed {
                break;
            }
        }
        total
    }

    /// Marks every shard closed.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        for ring in self.rings.iter() {
            ring.close();
        }
    }

    /// Returns `true` once [`ShardedRing::close`] has been called.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Sum of occupied slots across every shard.
    pub fn len(&self) -> usize {
        self.rings.iter().map(Ring::len).sum()
    }

    /// Returns `true` if every shard is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of slot capacity across every shard.
    pub fn capacity(&self) -> usize {
        self.rings.iter().map(Ring::capacity).sum()
    }

    /// Sum of CAS-retry contention across every shard.
    pub fn contention(&self) -> u64 {
        self.rings.iter().map(Ring::contention).sum()
    }
}

impl<T> RingStore for ShardedRing<T> {
    type Item = T;

    fn claim(&self, f: impl FnOnce(&mut T)) -> Result<bool, RingError> {
        ShardedRing::claim(self, f)
    }

    fn claim_blocking(&self, idle: &dyn IdleStrategy, f: impl FnOnce(&mut T)) -> Result<(), RingError> {
        ShardedRing::claim_blocking(self, idle, f)
    }

    fn consume_batch(&self, max: usize, f: impl FnMut(&T)) -> usize {
        ShardedRing::consume_batch(self, max, f)
    }

    fn close(&self) {
        ShardedRing::close(self);
    }

    fn is_closed(&self) -> bool {
        ShardedRing::is_closed(self)
    }

    fn len(&self) -> usize {
        ShardedRing::len(self)
    }

    fn capacity(&self) -> usize {
        ShardedRing::capacity(self)
    }

    fn contention(&self) -> u64 {
        ShardedRing::contention(self)
    }

    fn shard_count(&self) -> usize {
        ShardedRing::shard_count(self)
    }

    fn claim_on_shard(&self, shard: usize, f: impl FnOnce(&mut T)) -> Result<bool, RingError> {
        ShardedRing::claim_on_shard(self, shard, f)
    }
}
