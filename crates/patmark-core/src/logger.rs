//! Stderr logger for examples and host applications.
//!
//! Lines look like `[  0.012s DEBUG patmark_detector] 3 candidates`. The
//! elapsed time is measured from the first call to [`init_with_level`].
//! The level applies to `patmark*` crates; dependencies only log warnings
//! and errors.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

/// Effective filter for a record target. Records from crates outside the
/// `patmark` family are capped at `Warn`.
fn max_level_for(target: &str, level: LevelFilter) -> LevelFilter {
    if crate_of(target).starts_with("patmark") {
        level
    } else {
        level.min(LevelFilter::Warn)
    }
}

#[inline]
fn crate_of(target: &str) -> &str {
    target.split("::").next().unwrap_or(target)
}

fn format_line(elapsed_s: f64, level: Level, target: &str, args: &std::fmt::Arguments) -> String {
    format!("[{elapsed_s:7.3}s {level:>5} {}] {args}", crate_of(target))
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= max_level_for(metadata.target(), self.level)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(
            self.started.elapsed().as_secs_f64(),
            record.level(),
            record.target(),
            record.args(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger with the provided level filter.
///
/// Only the first call installs the logger; later calls are no-ops.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| StderrLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install a `tracing` subscriber honouring `RUST_LOG` (default `info`).
///
/// Span close events are reported so per-frame stage timings show up.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
