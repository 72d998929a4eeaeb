//! Property-based tests for the ring invariants documented in
//! `invariants.rs` / SPEC_FULL.md.

use proptest::prelude::*;
use ringlog_core::Ring;

#[derive(Default, Debug, Clone, Copy, PartialEq)]
struct Item(u64);

proptest! {
    /// INV-SEQ-01: occupied slots never exceed capacity, before or after
    /// any sequence of claims and drains.
    #[test]
    fn prop_bounded_count(
        writes in 0usize..200,
        drain_batch in 1usize..32,
    ) {
        let ring: Ring<Item> = Ring::new(64).unwrap();
        let capacity = ring.capacity();

        for i in 0..writes {
            let _ = ring.claim(|v| v.0 = i as u64);
            prop_assert!(ring.len() <= capacity,
                "INV-SEQ-01 violated after claim {}: len {} > capacity {}", i, ring.len(), capacity);
        }

        loop {
            let n = ring.consume_batch(drain_batch, |_| {});
            prop_assert!(ring.len() <= capacity, "INV-SEQ-01 violated during drain");
            if n == 0 {
                break;
            }
        }
    }
}

proptest! {
    /// INV-SEQ-02: `len()` moves by exactly one on a successful claim and
    /// decreases after a non-empty drain.
    #[test]
    fn prop_monotonic_progress(
        ops in prop::collection::vec(prop::bool::ANY, 1..100),
    ) {
        let ring: Ring<Item> = Ring::new(32).unwrap();

        for op in ops {
            let len_before = ring.len();
            if op {
                if ring.claim(|v| v.0 = 1).unwrap() {
                    prop_assert_eq!(ring.len(), len_before + 1);
                }
            } else {
                let consumed = ring.consume_batch(1, |_| {});
                if consumed > 0 {
                    prop_assert!(ring.len() < len_before);
                }
            }
        }
    }
}

proptest! {
    /// INV-ORD-03: a ring can never yield more records than were
    /// successfully claimed into it, and draining everything empties it.
    #[test]
    fn prop_happens_before(
        writes in 0usize..80,
    ) {
        let ring: Ring<Item> = Ring::new(128).unwrap();

        let mut produced = 0usize;
        for i in 0..writes {
            if ring.claim(|v| v.0 = i as u64).unwrap() {
                produced += 1;
            }
        }
        prop_assert_eq!(ring.len(), produced);

        let mut consumed = 0usize;
        loop {
            let n = ring.consume_batch(16, |_| consumed += 1);
            if n == 0 {
                break;
            }
        }
        prop_assert!(consumed <= produced);
        prop_assert!(ring.is_empty());
    }
}

proptest! {
    /// Claimed-then-drained values come back in the same order they were
    /// claimed (FIFO from a single producer thread).
    #[test]
    fn prop_single_producer_fifo(
        values in prop::collection::vec(0u64..10_000, 0..64),
    ) {
        let ring: Ring<Item> = Ring::new(128).unwrap();
        for &v in &values {
            ring.claim(|slot| slot.0 = v).unwrap();
        }
        let mut seen = Vec::new();
        ring.consume_batch(values.len(), |slot| seen.push(slot.0));
        prop_assert_eq!(seen, values);
    }
}
