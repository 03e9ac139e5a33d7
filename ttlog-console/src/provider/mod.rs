//! # Provider
//!
//! [`ConsoleLoggerProvider`] is the long-lived object a host keeps: it owns
//! the settings snapshot, the console sink and the formatter, and hands out
//! cheap per-category [`Logger`] handles.
//!
//! ## Architecture
//!
//! - **Settings**: `ArcSwap` snapshot, loaded once per log call
//! - **Loggers**: cached per category in a `DashMap`, first caller wins
//! - **Formatting**: on the caller's thread, panics contained
//! - **Output**: one serialized write per event
//!
//! Nothing a [`Logger`] does can fail or panic outward. Formatting problems
//! and refused writes end up in [`ConsoleLoggerProvider::format_failures`],
//! [`ConsoleLoggerProvider::dropped_events`] and the diagnostic channel.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use ttlog_console::diagnostics::NullDiagnostics;
//! use ttlog_console::event::LogLevel;
//! use ttlog_console::provider::ConsoleLoggerProvider;
//! use ttlog_console::settings::{Settings, TimeZoneSetting};
//! use ttlog_console::sink::MemoryStream;
//!
//! let stream = MemoryStream::new();
//! let provider = ConsoleLoggerProvider::builder()
//!   .settings(Settings::default().with_colors(false).with_time_zone(TimeZoneSetting::Utc))
//!   .stream(stream.clone())
//!   .diagnostics(Arc::new(NullDiagnostics))
//!   .build();
//!
//! let log = provider.get_logger("App.Service");
//! log.info("started");
//! log.log(LogLevel::Warn, 7, "slow", None, &["request 1"]);
//! provider.dispose();
//!
//! assert_eq!(stream.write_count(), 2);
//! ```
//!
//! Hosts must not point two providers at the same output stream; nothing
//! here guards against it.


use std::error::Error;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::diagnostics::{Diagnostic, Diagnostics, StderrDiagnostics};
use crate::error::{panic_message, FormatError};
use crate::event::{ExceptionRecord, LogEvent, LogLevel};
use crate::formatter::{fallback_segment, render, ConsoleFormatter, LogFormatter, Rendered, Segments};
use crate::scope::{self, ScopeGuard};
use crate::settings::{Settings, SettingsHolder, SettingsResolver, SettingsSource};
use crate::sink::ConsoleSink;

/// State shared by the provider and every logger handle.
struct Shared {
  settings: Arc<SettingsHolder>,
  sink: ConsoleSink,
  formatter: Box<dyn LogFormatter>,
  diagnostics: Arc<dyn Diagnostics>,
  format_failures: AtomicU64,
}

impl Shared {
  /// Renders and writes `event` against `settings`.
  ///
  /// The caller has already checked that the event is enabled.
  fn emit(&self, event: &LogEvent, settings: &Settings) {
    let rendered = panic::catch_unwind(AssertUnwindSafe(|| {
      render(self.formatter.as_ref(), event, settings)
    }))
    .unwrap_or_else(|payload| {
      let reason = panic_message(payload.as_ref());
      let mut segments = Segments::new();
      segments.push(fallback_segment(event));
      Rendered {
        segments,
        degraded: Some(FormatError::Panicked(reason)),
      }
    });

    if let Some(error) = rendered.degraded {
      self.format_failures.fetch_add(1, Ordering::Relaxed);
      self.diagnostics.report(Diagnostic::Format {
        category: event.category.clone(),
        error,
      });
    }

    // Contains stream panics too.
    self.sink.write(&rendered.segments, settings.use_colors);
  }
}

/// Builder for [`ConsoleLoggerProvider`].
///
/// Defaults: default settings, stdout, [`StderrDiagnostics`],
/// [`ConsoleFormatter`].
pub struct ConsoleLoggerProviderBuilder {
  source: SettingsSource,
  stream: Option<Box<dyn Write + Send>>,
  diagnostics: Arc<dyn Diagnostics>,
  formatter: Box<dyn LogFormatter>,
}

impl Default for ConsoleLoggerProviderBuilder {
  fn default() -> Self {
    Self {
      source: SettingsSource::Default,
      stream: None,
      diagnostics: Arc::new(StderrDiagnostics),
      formatter: Box::new(ConsoleFormatter),
    }
  }
}

impl ConsoleLoggerProviderBuilder {
  pub fn settings(mut self, source: impl Into<SettingsSource>) -> Self {
    self.source = source.into();
    self
  }

  /// Output stream; the provider takes exclusive ownership of it.
  pub fn stream<W: Write + Send + 'static>(mut self, stream: W) -> Self {
    self.stream = Some(Box::new(stream));
    self
  }

  pub fn stderr(self) -> Self {
    self.stream(io::stderr())
  }

  pub fn diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
    self.diagnostics = diagnostics;
    self
  }

  pub fn formatter<F: LogFormatter + 'static>(mut self, formatter: F) -> Self {
    self.formatter = Box::new(formatter);
    self
  }

  /// Resolves the settings source once and, for a dynamic source,
  /// subscribes to its changes.
  pub fn build(self) -> ConsoleLoggerProvider {
    let initial = SettingsResolver::resolve(&self.source, self.diagnostics.as_ref());
    let settings = Arc::new(SettingsHolder::new(initial));
    SettingsResolver::subscribe(&self.source, &settings, Arc::clone(&self.diagnostics));

    let sink = match self.stream {
      Some(stream) => ConsoleSink::new(stream, Arc::clone(&self.diagnostics)),
      None => ConsoleSink::stdout(Arc::clone(&self.diagnostics)),
    };

    ConsoleLoggerProvider {
      shared: Arc::new(Shared {
        settings,
        sink,
        formatter: self.formatter,
        diagnostics: self.diagnostics,
        format_failures: AtomicU64::new(0),
      }),
      loggers: DashMap::new(),
      disposed: AtomicBool::new(false),
    }
  }
}

/// Owner of the console sink and the settings snapshot.
pub struct ConsoleLoggerProvider {
  shared: Arc<Shared>,
  loggers: DashMap<String, Logger>,
  disposed: AtomicBool,
}

impl std::fmt::Debug for ConsoleLoggerProvider {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ConsoleLoggerProvider")
      .field("loggers", &self.loggers.len())
      .field("sink", &self.shared.sink)
      .field("disposed", &self.is_disposed())
      .finish()
  }
}

impl ConsoleLoggerProvider {
  /// Provider writing to stdout, reporting to stderr.
  pub fn new(source: impl Into<SettingsSource>) -> Self {
    Self::builder().settings(source).build()
  }

  pub fn builder() -> ConsoleLoggerProviderBuilder {
    ConsoleLoggerProviderBuilder::default()
  }

  /// Handle for `category`. Every call with the same category returns a
  /// handle to the same cached logger.
  pub fn get_logger(&self, category: &str) -> Logger {
    if let Some(logger) = self.loggers.get(category) {
      return logger.value().clone();
    }
    self
      .loggers
      .entry(category.to_string())
      .or_insert_with(|| Logger {
        category: Arc::from(category),
        shared: Arc::clone(&self.shared),
      })
      .value()
      .clone()
  }

  /// Number of distinct categories handed out so far.
  pub fn logger_count(&self) -> usize {
    self.loggers.len()
  }

  /// Replaces the settings snapshot. Invalid settings are reported and the
  /// defaults installed instead. A dynamic source overrides this on its next
  /// change.
  pub fn reload(&self, settings: Settings) {
    let resolved = SettingsResolver::resolve(
      &SettingsSource::Explicit(settings),
      self.shared.diagnostics.as_ref(),
    );
    self.shared.settings.store(resolved);
  }

  /// Current settings snapshot.
  pub fn settings(&self) -> Arc<Settings> {
    self.shared.settings.snapshot()
  }

  pub fn is_enabled(&self, category: &str, level: LogLevel) -> bool {
    self.shared.settings.load().is_enabled(category, level)
  }

  /// Writes a fully built event, subject to the category thresholds.
  pub fn log_event(&self, event: &LogEvent) {
    let settings = self.shared.settings.load();
    if settings.is_enabled(&event.category, event.level) {
      self.shared.emit(event, &settings);
    }
  }

  /// Flushes and releases the output stream. Safe to call repeatedly;
  /// loggers used afterwards count their events as dropped.
  pub fn dispose(&self) {
    if !self.disposed.swap(true, Ordering::AcqRel) {
      self.shared.sink.close();
    }
  }

  pub fn is_disposed(&self) -> bool {
    self.disposed.load(Ordering::Acquire)
  }

  pub fn flush(&self) {
    self.shared.sink.flush();
  }

  pub fn dropped_events(&self) -> u64 {
    self.shared.sink.dropped_events()
  }

  pub fn format_failures(&self) -> u64 {
    self.shared.format_failures.load(Ordering::Relaxed)
  }
}

impl Drop for ConsoleLoggerProvider {
  fn drop(&mut self) {
    self.dispose();
  }
}

/// Per-category logging handle. Cheap to clone and `Send + Sync`.
#[derive(Clone)]
pub struct Logger {
  category: Arc<str>,
  shared: Arc<Shared>,
}

impl std::fmt::Debug for Logger {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Logger")
      .field("category", &self.category)
      .finish()
  }
}

impl Logger {
  pub fn category(&self) -> &str {
    &self.category
  }

  pub fn is_enabled(&self, level: LogLevel) -> bool {
    self.shared.settings.load().is_enabled(&self.category, level)
  }

  /// Logs one event. Disabled events return before anything is allocated.
  ///
  /// `scopes` are appended after this thread's ambient scopes.
  pub fn log(
    &self,
    level: LogLevel,
    event_id: i32,
    message: &str,
    exception: Option<&ExceptionRecord>,
    scopes: &[&str],
  ) {
    self.log_with(level, event_id, message, scopes, || exception.cloned());
  }

  /// Logs `message` with `err` and its source chain attached.
  pub fn log_error<E: Error + 'static>(&self, level: LogLevel, message: &str, err: &E) {
    self.log_with(level, 0, message, &[], || Some(ExceptionRecord::from_error(err)));
  }

  fn log_with<F>(&self, level: LogLevel, event_id: i32, message: &str, scopes: &[&str], exception: F)
  where
    F: FnOnce() -> Option<ExceptionRecord>,
  {
    let settings = self.shared.settings.load();
    if !settings.is_enabled(&self.category, level) {
      return;
    }

    let mut event = LogEvent::new(level, &*self.category, message).with_event_id(event_id);
    event.exception = exception();
    if settings.include_scopes {
      event.scopes = scope::current_scopes();
      event.scopes.extend(scopes.iter().map(|s| s.to_string()));
    }

    self.shared.emit(&event, &settings);
  }

  pub fn trace(&self, message: &str) {
    self.log(LogLevel::Trace, 0, message, None, &[]);
  }

  pub fn debug(&self, message: &str) {
    self.log(LogLevel::Debug, 0, message, None, &[]);
  }

  pub fn info(&self, message: &str) {
    self.log(LogLevel::Info, 0, message, None, &[]);
  }

  pub fn warn(&self, message: &str) {
    self.log(LogLevel::Warn, 0, message, None, &[]);
  }

  pub fn error(&self, message: &str) {
    self.log(LogLevel::Error, 0, message, None, &[]);
  }

  pub fn critical(&self, message: &str) {
    self.log(LogLevel::Critical, 0, message, None, &[]);
  }

  /// Starts an ambient scope on the current thread; see [`crate::scope`].
  pub fn begin_scope(&self, label: impl Into<String>) -> ScopeGuard {
    scope::push_scope(label)
  }
}
