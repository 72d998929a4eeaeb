//! Debug assertion macros for ring buffer and record invariants.
//!
//! These macros provide runtime checks for the invariants documented in
//! `spec.md` / `SPEC_FULL.md`. They are only active in debug builds
//! (`#[cfg(debug_assertions)]`), so there is zero overhead in release
//! builds.

// =============================================================================
// INV-SEQ-01: Bounded occupancy
// =============================================================================

/// Assert that occupied slots never exceed capacity.
///
/// **Invariant**: `0 <= (producer - consumer) <= capacity`
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "INV-SEQ-01 violated: occupied {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

// =============================================================================
// INV-SEQ-02: Monotonic progress
// =============================================================================

/// Assert that a cursor only increases (wrapping comparisons aside).
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "INV-SEQ-02 violated: {} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

// =============================================================================
// INV-REC-01: Field capacity
// =============================================================================

/// Assert that a record never reports more than `RECORD_FIELD_CAPACITY` live fields.
macro_rules! debug_assert_field_count_bounded {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "INV-REC-01 violated: field count {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

// =============================================================================
// INV-CH-01: Per-shard FIFO (sharded ring)
// =============================================================================

/// Assert monotonic per-shard consumption count, used to spot-check FIFO
/// ordering within a single shard during debug builds.
macro_rules! debug_assert_fifo_count {
    ($shard_id:expr, $old_count:expr, $new_count:expr) => {
        debug_assert!(
            $new_count >= $old_count,
            "INV-CH-01 violated: shard {} consumption count went from {} to {}",
            $shard_id,
            $old_count,
            $new_count
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_field_count_bounded;
pub(crate) use debug_assert_fifo_count;
pub(crate) use debug_assert_monotonic;
