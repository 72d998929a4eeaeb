//! Record encoding (spec.md §4.11 "Encoder").

use crate::error::EncodeError;
use crate::record::Record;

/// Serializes a [`Record`] into an output byte buffer.
///
/// Runs exclusively on the consumer thread, never on a producer's hot path.
/// Implementations must redact [`crate::field::FieldValue::Secret`] fields
/// unless explicitly configured not to (spec.md §4.3 "Secret redaction
/// contract").
pub trait Encoder: Send + Sync {
    /// Appends the encoded form of `record` to `out`. `now` is the consumer
    /// thread's clock reading at encode time (spec.md §4.8), distinct from
    /// `record.timestamp_nanos` (stamped by the producer at claim time) —
    /// the gap between the two is the record's end-to-end processing delay.
    /// An `Err` drops the record (it is never partially written) and is
    /// counted on [`crate::stats::Stats::encoder_errors`].
    fn encode(&self, record: &Record, now: i64, out: &mut Vec<u8>) -> Result<(), EncodeError>;
}

/// Compact `key=value` encoder, one record per line.
///
/// Grounded in the plain-text formatters common across the reference pack's
/// logging examples; secrets redact to `***`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextEncoder {
    /// When `true`, [`crate::field::FieldValue::Secret`] values are emitted
    /// in the clear. Intended only for local development.
    pub reveal_secrets: bool,
}

impl Encoder for TextEncoder {
    fn encode(&self, record: &Record, now: i64, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        use std::fmt::Write as _;
        let mut line = String::with_capacity(128);
        let _ = write!(
            line,
            "ts={} lag={} level={} logger={} msg={:?}",
            record.timestamp_nanos,
            now.saturating_sub(record.timestamp_nanos),
            record.level.as_str(),
            record.logger_name,
            record.message
        );
        for field in record.fields() {
            let _ = write!(line, " {}=", field.key);
            match (&field.value, self.reveal_secrets) {
                (crate::field::FieldValue::Secret(_), false) => line.push_str("***"),
                (crate::field::FieldValue::Secret(s), true) => {
                    let _ = write!(line, "{s:?}");
                }
                (value, _) => append_value(&mut line, value),
            }
        }
        if let Some(caller) = record.caller {
            let _ = write!(line, " caller={caller}");
        }
        if let Some(stack) = &record.stacktrace {
            let _ = write!(line, " stack={stack:?}");
        }
        if record.dropped_field_count > 0 {
            let _ = write!(line, " dropped_fields={}", record.dropped_field_count);
        }
        line.push('\n');
        out.extend_from_slice(line.as_bytes());
        Ok(())
    }
}

fn append_value(line: &mut String, value: &crate::field::FieldValue) {
    use crate::field::FieldValue;
    use std::fmt::Write as _;
    match value {
        FieldValue::String(s) | FieldValue::Any(s) | FieldValue::Error(s) => {
            let _ = write!(line, "{s:?}");
        }
        FieldValue::Bytes(b) => {
            let _ = write!(line, "{}b", b.len());
        }
        FieldValue::Int8(v) => {
            let _ = write!(line, "{v}");
        }
        FieldValue::Int16(v) => {
            let _ = write!(line, "{v}");
        }
        FieldValue::Int32(v) => {
            let _ = write!(line, "{v}");
        }
        FieldValue::Int64(v) => {
            let _ = write!(line, "{v}");
        }
        FieldValue::UInt8(v) => {
            let _ = write!(line, "{v}");
        }
        FieldValue::UInt16(v) => {
            let _ = write!(line, "{v}");
        }
        FieldValue::UInt32(v) => {
            let _ = write!(line, "{v}");
        }
        FieldValue::UInt64(v) => {
            let _ = write!(line, "{v}");
        }
        FieldValue::Float32(v) => {
            let _ = write!(line, "{v}");
        }
        FieldValue::Float64(v) => {
            let _ = write!(line, "{v}");
        }
        FieldValue::Bool(v) => {
            let _ = write!(line, "{v}");
        }
        FieldValue::Duration(v) | FieldValue::Timestamp(v) => {
            let _ = write!(line, "{v}");
        }
        FieldValue::Secret(_) => line.push_str("***"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::level::Level;

    #[test]
    fn redacts_secrets_by_default() {
        let mut record = Record::new();
        record.level = Level::Info;
        record.message = "login".to_owned();
        record.push_field(Field::secret("password", "hunter2"));
        let mut out = Vec::new();
        TextEncoder::default().encode(&record, 0, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("password=***"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn reveal_secrets_opts_in() {
        let mut record = Record::new();
        record.push_field(Field::secret("password", "hunter2"));
        let mut out = Vec::new();
        TextEncoder { reveal_secrets: true }.encode(&record, 0, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("hunter2"));
    }
}
