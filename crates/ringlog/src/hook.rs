//! Consumer-side observation hooks (spec.md §4.11 "Hook").

use crate::record::Record;

/// A side-observer invoked by the consumer thread after a record is drained,
/// before (and independent of) encoding/writing.
///
/// Per spec.md §4.11: hooks run only on the consumer thread, must not
/// mutate the record, and must not block (a blocking hook stalls every
/// shard's drain along with it).
pub trait Hook: Send + Sync {
    /// Observes a drained record. Must return promptly.
    fn on_record(&self, record: &Record);
}

/// A hook built from a plain closure, for ad hoc registration.
pub struct FnHook<F>(pub F)
where
    F: Fn(&Record) + Send + Sync;

impl<F> Hook for FnHook<F>
where
    F: Fn(&Record) + Send + Sync,
{
    fn on_record(&self, record: &Record) {
        (self.0)(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn fn_hook_is_invoked() {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&count);
        let hook = FnHook(move |_: &Record| {
            counted.fetch_add(1, Ordering::Relaxed);
        });
        hook.on_record(&Record::new());
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }
}
