#![forbid(unsafe_code)]

//! Per-pass diagnostics on stderr, controlled by environment variable.
//!
//! Set `DBUI_DEBUG_TRACE=1` to print one line per scheduler flush and per
//! representation event. When unset, [`emit`] is a single static bool load.
//!
//! ```text
//! [dbui      12ms ThreadId(1)] flush batch=3 queued=0
//! [dbui      12ms ThreadId(1)] pass widget=w4 flags=GEOMETRY | CONTENT failed=0
//! ```

use std::fmt;
use std::sync::LazyLock;
use std::time::Instant;

use dbui_core::WidgetId;

use crate::dirty::DirtyFlags;

static DEBUG_TRACE_ENABLED: LazyLock<bool> = LazyLock::new(|| {
    std::env::var("DBUI_DEBUG_TRACE")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
});

static START_TIME: LazyLock<Instant> = LazyLock::new(Instant::now);

#[inline]
pub fn is_enabled() -> bool {
    *DEBUG_TRACE_ENABLED
}

/// Milliseconds since first use, for correlating output across threads.
#[inline]
pub fn elapsed_ms() -> u64 {
    START_TIME.elapsed().as_millis() as u64
}

/// One runtime event worth a trace line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    /// A UI callback drained `batch` representations; `queued` wait for the
    /// next one.
    Flush { batch: usize, queued: usize },
    /// A representation went live watching `watched`.
    Created { widget: WidgetId, watched: DirtyFlags },
    /// A pass reconciled `flags`, `failed` of them with an error.
    Pass {
        widget: WidgetId,
        flags: DirtyFlags,
        failed: u32,
    },
    Disposed { widget: WidgetId },
}

fn write_flags(f: &mut fmt::Formatter<'_>, flags: DirtyFlags) -> fmt::Result {
    if flags.is_empty() {
        f.write_str("-")
    } else {
        bitflags::parser::to_writer(&flags, &mut *f)
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Flush { batch, queued } => write!(f, "flush batch={batch} queued={queued}"),
            Self::Created { widget, watched } => {
                write!(f, "created widget={widget} watched=")?;
                write_flags(f, watched)
            }
            Self::Pass {
                widget,
                flags,
                failed,
            } => {
                write!(f, "pass widget={widget} flags=")?;
                write_flags(f, flags)?;
                write!(f, " failed={failed}")
            }
            Self::Disposed { widget } => write!(f, "disposed widget={widget}"),
        }
    }
}

/// The stderr line for `event` at `elapsed_ms`.
pub fn format_line(elapsed_ms: u64, event: &TraceEvent) -> String {
    format!(
        "[dbui {elapsed_ms:>8}ms {:?}] {event}",
        std::thread::current().id()
    )
}

/// Print `event` to stderr when `DBUI_DEBUG_TRACE` is set.
#[inline]
pub fn emit(event: TraceEvent) {
    if is_enabled() {
        eprintln!("{}", format_line(elapsed_ms(), &event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbui_core::WidgetBuilder;

    #[test]
    fn elapsed_is_monotonic() {
        let t1 = elapsed_ms();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(elapsed_ms() >= t1);
    }

    #[test]
    fn pass_line_names_the_widget_and_flags() {
        let widget = WidgetBuilder::new("label").build().unwrap();
        let event = TraceEvent::Pass {
            widget: widget.id(),
            flags: DirtyFlags::GEOMETRY | DirtyFlags::CONTENT,
            failed: 1,
        };
        let line = format_line(42, &event);
        assert!(line.starts_with("[dbui       42ms ThreadId("), "{line}");
        let expected = format!("pass widget={} flags=GEOMETRY | CONTENT failed=1", widget.id());
        assert!(line.ends_with(&expected), "{line}");
    }

    #[test]
    fn empty_flags_print_a_dash() {
        let widget = WidgetBuilder::new("group").build().unwrap();
        let event = TraceEvent::Created {
            widget: widget.id(),
            watched: DirtyFlags::empty(),
        };
        assert_eq!(event.to_string(), format!("created widget={} watched=-", widget.id()));
        assert_eq!(
            TraceEvent::Flush { batch: 3, queued: 0 }.to_string(),
            "flush batch=3 queued=0"
        );
    }
}
