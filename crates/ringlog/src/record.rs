//! The in-ring record shape (spec.md §3 "Record", §4.3).
//!
//! A `Record` lives directly inside a ring slot: the producer writes into it
//! in place and the consumer reads it in place, with no intermediate
//! allocation on the hot path. Field storage is a fixed-capacity array
//! rather than a `Vec` so that constructing a `Record` never allocates.

use crate::caller::Caller;
use crate::field::Field;
use crate::invariants::debug_assert_field_count_bounded;
use crate::level::Level;

/// Maximum number of fields a single record can carry (spec.md §3: "a
/// zero-allocation Field/Record model with 32-field fixed capacity").
pub const RECORD_FIELD_CAPACITY: usize = 32;

/// A single log event, pre-allocated inside a ring slot.
///
/// Producers populate a `Record` via [`Record::reset`] followed by
/// [`Record::push_field`] calls; the consumer reads the populated record and
/// then the slot is recycled (and the `Record` reset again) for the next
/// claim.
#[derive(Debug, Clone)]
pub struct Record {
    /// Severity of this event.
    pub level: Level,
    /// Primary human-readable message.
    pub message: String,
    /// Dot-separated hierarchical logger name (spec.md §4.2 "Derived loggers").
    pub logger_name: String,
    /// Structured fields attached to this event, in attachment order.
    fields: [Option<Field>; RECORD_FIELD_CAPACITY],
    /// Number of live entries in `fields`.
    field_count: usize,
    /// Fields dropped because the record was already at capacity.
    pub dropped_field_count: u32,
    /// Call site, if caller capture is enabled.
    pub caller: Option<Caller>,
    /// Captured stacktrace text, if stack capture applied to this record.
    pub stacktrace: Option<String>,
    /// Nanoseconds since the Unix epoch, stamped by the producer at claim time.
    pub timestamp_nanos: i64,
    /// Marks this slot as a flush tombstone rather than a real event
    /// (spec.md §4.10 "Sync/flush protocol"). The consumer recognizes this
    /// flag, signals the waiting [`crate::logger::Logger::sync`] caller, and
    /// does not hand the slot to the encoder/sink.
    pub is_flush_marker: bool,
}

impl Record {
    /// Creates an empty record at `Level::Info` with no message or fields.
    pub fn new() -> Self {
        Self {
            level: Level::Info,
            message: String::new(),
            logger_name: String::new(),
            fields: Default::default(),
            field_count: 0,
            dropped_field_count: 0,
            caller: None,
            stacktrace: None,
            timestamp_nanos: 0,
            is_flush_marker: false,
        }
    }

    /// Clears the record for reuse, retaining the fields array's allocation
    /// footprint (each `Option<Field>` is set to `None`, dropping any owned
    /// `String`/`Vec<u8>` payloads from the previous record).
    pub fn reset(&mut self) {
        self.level = Level::Info;
        self.message.clear();
        self.logger_name.clear();
        for slot in &mut self.fields {
            *slot = None;
        }
        self.field_count = 0;
        self.dropped_field_count = 0;
        self.caller = None;
        self.stacktrace = None;
        self.timestamp_nanos = 0;
        self.is_flush_marker = false;
    }

    /// Appends a field, or counts it as dropped if the record is already at
    /// [`RECORD_FIELD_CAPACITY`] (spec.md §4.3 "overflow truncation").
    ///
    /// Field-key collisions are not deduplicated: both entries are kept
    /// (SPEC_FULL.md Open Question resolution), matching the last-write-wins
    /// behavior an encoder applies when it serializes duplicate keys.
    pub fn push_field(&mut self, field: Field) {
        debug_assert_field_count_bounded!(self.field_count, RECORD_FIELD_CAPACITY);
        if self.field_count < RECORD_FIELD_CAPACITY {
            self.fields[self.field_count] = Some(field);
            self.field_count += 1;
        } else {
            self.dropped_field_count += 1;
        }
    }

    /// Appends every field from `iter`, truncating (and counting drops) once
    /// capacity is reached.
    pub fn extend_fields(&mut self, iter: impl IntoIterator<Item = Field>) {
        for field in iter {
            self.push_field(field);
        }
    }

    /// Returns the live fields in attachment order.
    #[inline]
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields[..self.field_count].iter().filter_map(Option::as_ref)
    }

    /// Number of live fields currently attached.
    #[inline]
    pub fn field_count(&self) -> usize {
        self.field_count
    }

    /// Returns `true` if no fields were dropped due to overflow.
    #[inline]
    pub fn is_within_capacity(&self) -> bool {
        self.dropped_field_count == 0
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;

    #[test]
    fn push_field_accumulates_in_order() {
        let mut r = Record::new();
        r.push_field(Field::string("a", "1"));
        r.push_field(Field::string("b", "2"));
        assert_eq!(r.field_count(), 2);
        let keys: Vec<_> = r.fields().map(|f| f.key).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn push_field_truncates_past_capacity() {
        let mut r = Record::new();
        for i in 0..RECORD_FIELD_CAPACITY + 5 {
            r.push_field(Field::new("k", i as i64));
        }
        assert_eq!(r.field_count(), RECORD_FIELD_CAPACITY);
        assert_eq!(r.dropped_field_count, 5);
        assert!(!r.is_within_capacity());
    }

    #[test]
    fn reset_clears_everything() {
        let mut r = Record::new();
        r.message.push_str("hello");
        r.push_field(Field::string("a", "1"));
        r.dropped_field_count = 3;
        r.caller = Some(Caller {
            file: "x.rs",
            line: 1,
            column: 1,
        });
        r.reset();
        assert_eq!(r.field_count(), 0);
        assert_eq!(r.dropped_field_count, 0);
        assert!(r.message.is_empty());
        assert!(r.caller.is_none());
    }
}
