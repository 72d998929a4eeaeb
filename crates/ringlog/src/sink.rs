//! Output destinations (spec.md §4.11 "Sink", §4.10 "Sync/flush protocol").

use crate::error::SinkError;
use std::io::Write as _;
use std::sync::Mutex;

/// Where encoded bytes go. Runs exclusively on the consumer thread.
pub trait Sink: Send + Sync {
    /// Writes `buf` (already encoded by an [`crate::encoder::Encoder`]).
    fn write(&self, buf: &[u8]) -> Result<(), SinkError>;

    /// Flushes any internal buffering, honoring the sync protocol's
    /// "durable as of this call" contract (spec.md §4.10).
    fn sync(&self) -> Result<(), SinkError>;

    /// Releases any held resources. Default no-op for sinks without an
    /// explicit close step (e.g. stdout).
    fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Writes to stdout, line-buffered by the OS.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn write(&self, buf: &[u8]) -> Result<(), SinkError> {
        std::io::stdout()
            .lock()
            .write_all(buf)
            .map_err(|e| SinkError::Write(e.to_string()))
    }

    fn sync(&self) -> Result<(), SinkError> {
        std::io::stdout()
            .lock()
            .flush()
            .map_err(|e| SinkError::Sync(e.to_string()))
    }
}

/// In-memory sink, primarily for tests: retains every write in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    buf: Mutex<Vec<u8>>,
}

impl MemorySink {
    /// Creates an empty in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.buf.lock().expect("memory sink mutex poisoned").clone()
    }
}

impl Sink for MemorySink {
    fn write(&self, buf: &[u8]) -> Result<(), SinkError> {
        self.buf
            .lock()
            .expect("memory sink mutex poisoned")
            .extend_from_slice(buf);
        Ok(())
    }

    fn sync(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_accumulates_writes_in_order() {
        let sink = MemorySink::new();
        sink.write(b"a").unwrap();
        sink.write(b"b").unwrap();
        sink.sync().unwrap();
        assert_eq!(sink.contents(), b"ab");
    }
}
