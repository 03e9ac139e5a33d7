//! # Diagnostics
//!
//! Side channel for failures inside the logging pipeline itself: malformed
//! settings, events that could not be formatted, writes the stream refused.
//!
//! Implementations must never route back into a [`ConsoleLoggerProvider`]
//! that reports to them, or a broken stream would feed on itself.
//!
//! [`ConsoleLoggerProvider`]: crate::provider::ConsoleLoggerProvider


use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;

use crate::error::{ConfigurationError, FormatError, SinkWriteError};

/// `tracing` target used by [`TracingDiagnostics`]. The tracing bridge skips
/// events on this target.
pub const DIAGNOSTICS_TARGET: &str = "ttlog_console::diagnostics";

/// A single internal failure.
#[derive(Debug)]
pub enum Diagnostic {
  /// Settings could not be resolved; defaults are in effect.
  Configuration(ConfigurationError),
  /// An event was written in reduced form.
  Format { category: String, error: FormatError },
  /// An event was lost because the stream refused it.
  DroppedEvent { error: SinkWriteError, total_dropped: u64 },
  /// An event was written but the stream failed to flush it.
  FlushFailed(SinkWriteError),
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Diagnostic::Configuration(e) => write!(f, "configuration rejected, using defaults: {}", e),
      Diagnostic::Format { category, error } => {
        write!(f, "event for `{}` written without formatting: {}", category, error)
      },
      Diagnostic::DroppedEvent {
        error,
        total_dropped,
      } => write!(f, "event dropped ({} so far): {}", total_dropped, error),
      Diagnostic::FlushFailed(error) => write!(f, "flush after write failed: {}", error),
    }
  }
}

/// Receiver of [`Diagnostic`]s.
pub trait Diagnostics: Send + Sync {
  fn report(&self, diagnostic: Diagnostic);
}

/// Writes one report line to `out`. A failing `out` loses the report.
pub(crate) fn write_report<W: Write>(out: &mut W, diagnostic: &Diagnostic) {
  let _ = writeln!(out, "[ttlog-console] {}", diagnostic);
}

/// Writes diagnostics to stderr. The default channel.
///
/// A closed or broken stderr silently loses reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrDiagnostics;

impl Diagnostics for StderrDiagnostics {
  fn report(&self, diagnostic: Diagnostic) {
    write_report(&mut io::stderr().lock(), &diagnostic);
  }
}

/// Emits diagnostics as `tracing` warnings on [`DIAGNOSTICS_TARGET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
  fn report(&self, diagnostic: Diagnostic) {
    tracing::warn!(target: DIAGNOSTICS_TARGET, "{}", diagnostic);
  }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
  fn report(&self, _diagnostic: Diagnostic) {}
}

/// Keeps every report in memory, mostly for tests of host applications.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
  reports: Mutex<Vec<Diagnostic>>,
}

impl CollectingDiagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Rendered form of every report so far, oldest first.
  pub fn messages(&self) -> Vec<String> {
    self.lock().iter().map(ToString::to_string).collect()
  }

  /// Removes and returns all reports.
  pub fn take(&self) -> Vec<Diagnostic> {
    std::mem::take(&mut *self.lock())
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
    self.reports.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl Diagnostics for CollectingDiagnostics {
  fn report(&self, diagnostic: Diagnostic) {
    self.lock().push(diagnostic);
  }
}
