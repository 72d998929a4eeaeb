//! Call-site capture (spec.md §4.3 "Caller").

/// Compact call-site location, captured without allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// Source file path as known to the compiler (`file!()`/`Location::file`).
    pub file: &'static str,
    /// Line number within `file`.
    pub line: u32,
    /// Column number within `line`.
    pub column: u32,
}

impl Caller {
    /// Captures the location of the immediate caller of this function.
    ///
    /// `#[track_caller]` on the call chain above this point (the logger's
    /// public logging methods) makes `Location::caller()` resolve to the
    /// application call site rather than to internal logger code.
    #[track_caller]
    #[inline]
    #[must_use]
    pub fn capture() -> Self {
        let loc = std::panic::Location::caller();
        Self {
            file: loc.file(),
            line: loc.line(),
            column: loc.column(),
        }
    }

    /// Captures the call site `skip` frames above the immediate application
    /// caller, by walking a fully symbolized backtrace (spec.md §6
    /// `caller_skip`).
    ///
    /// `#[track_caller]` only ever reports the immediate call site; it
    /// cannot see past a non-`#[track_caller]` wrapper the application
    /// itself defines around its logging calls. Honoring `caller_skip`
    /// therefore requires walking the real stack, which costs orders of
    /// magnitude more than [`Caller::capture`] — this path is only reached
    /// when `caller_skip > 0`, an explicit opt-in.
    ///
    /// Frames belonging to this crate itself are filtered out by symbol
    /// name (not by a fixed positional offset), so the result is stable
    /// across inlining decisions in this crate's own wrapper functions.
    #[must_use]
    pub fn capture_at_depth(skip: u32) -> Option<Self> {
        let bt = backtrace::Backtrace::new();
        let mut remaining = skip;
        for frame in bt.frames() {
            for symbol in frame.symbols() {
                let is_internal = symbol
                    .name()
                    .map(|name| name.to_string().contains("ringlog_core"))
                    .unwrap_or(false);
                if is_internal {
                    continue;
                }
                if remaining > 0 {
                    remaining -= 1;
                    continue;
                }
                let Some(file) = symbol.filename().and_then(|p| p.to_str()) else {
                    continue;
                };
                let Some(line) = symbol.lineno() else {
                    continue;
                };
                let column = symbol.colno().unwrap_or(0);
                return Some(Self {
                    file: Box::leak(file.to_owned().into_boxed_str()),
                    line,
                    column,
                });
            }
        }
        None
    }
}

impl std::fmt::Display for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_reports_this_file() {
        let caller = Caller::capture();
        assert!(caller.file.ends_with("caller.rs"));
        assert!(caller.line > 0);
    }

    #[test]
    fn capture_at_depth_skips_past_internal_frames() {
        let caller = Caller::capture_at_depth(0).expect("backtrace should resolve a frame");
        assert!(caller.file.ends_with("caller.rs"));
    }

    #[test]
    fn display_format() {
        let caller = Caller {
            file: "src/main.rs",
            line: 10,
            column: 5,
        };
        assert_eq!(caller.to_string(), "src/main.rs:10:5");
    }
}
