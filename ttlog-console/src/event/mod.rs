
use std::error::Error;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Severity of a log event, ordered from the most detailed to the most severe:
/// `Trace < Debug < Info < Warn < Error < Critical < None`.
///
/// `None` is never emitted. As a threshold it switches a category off entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LogLevel {
  /// Very detailed information, mostly useful for debugging
  Trace = 0,
  /// Debug-level information, used for development or troubleshooting
  Debug = 1,
  /// General informational messages, typically useful in production
  Info = 2,
  /// Warning messages that indicate potential issues
  Warn = 3,
  /// Failures of the current operation
  Error = 4,
  /// Failures that require immediate attention
  Critical = 5,
  /// Not a severity; disables logging when used as a threshold
  None = 6,
}

impl LogLevel {
  pub const ALL: [LogLevel; 7] = [
    LogLevel::Trace,
    LogLevel::Debug,
    LogLevel::Info,
    LogLevel::Warn,
    LogLevel::Error,
    LogLevel::Critical,
    LogLevel::None,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      LogLevel::Trace => "TRACE",
      LogLevel::Debug => "DEBUG",
      LogLevel::Info => "INFO",
      LogLevel::Warn => "WARN",
      LogLevel::Error => "ERROR",
      LogLevel::Critical => "CRITICAL",
      LogLevel::None => "NONE",
    }
  }

  /// Parses a level name, case-insensitively.
  ///
  /// Accepts the short names (`info`, `warn`) as well as the long forms
  /// common in configuration files (`Information`, `Warning`).
  pub fn from_name(name: &str) -> Option<Self> {
    match name.trim().to_ascii_lowercase().as_str() {
      "trace" => Some(LogLevel::Trace),
      "debug" => Some(LogLevel::Debug),
      "info" | "information" => Some(LogLevel::Info),
      "warn" | "warning" => Some(LogLevel::Warn),
      "error" => Some(LogLevel::Error),
      "critical" | "fatal" => Some(LogLevel::Critical),
      "none" | "off" => Some(LogLevel::None),
      _ => None,
    }
  }

  pub fn from_index(index: i64) -> Option<Self> {
    usize::try_from(index)
      .ok()
      .and_then(|i| Self::ALL.get(i).copied())
  }
}

impl fmt::Display for LogLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl From<&tracing::Level> for LogLevel {
  fn from(level: &tracing::Level) -> Self {
    match *level {
      tracing::Level::ERROR => LogLevel::Error,
      tracing::Level::WARN => LogLevel::Warn,
      tracing::Level::INFO => LogLevel::Info,
      tracing::Level::DEBUG => LogLevel::Debug,
      _ => LogLevel::Trace,
    }
  }
}

/// The error attached to a log event, detached from the live error value so
/// it can be rendered after the fact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRecord {
  /// Short type name of the error, may be empty.
  pub kind: String,
  pub message: String,
  /// Stack frames or other detail lines, innermost first.
  pub frames: Vec<String>,
  /// The error that caused this one.
  pub source: Option<Box<ExceptionRecord>>,
}

impl ExceptionRecord {
  pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      message: message.into(),
      frames: Vec::new(),
      source: None,
    }
  }

  /// Captures an error and its whole `source()` chain.
  ///
  /// The outer record gets the short type name of `E`; sources only carry
  /// their messages since their concrete types are erased.
  pub fn from_error<E: Error + 'static>(err: &E) -> Self {
    let kind = std::any::type_name::<E>()
      .rsplit("::")
      .next()
      .unwrap_or_default()
      .to_string();
    let mut record = Self::new(kind, err.to_string());
    record.source = err.source().map(|s| Box::new(Self::from_dyn(s)));
    record
  }

  fn from_dyn(err: &(dyn Error + 'static)) -> Self {
    let mut record = Self::new("", err.to_string());
    record.source = err.source().map(|s| Box::new(Self::from_dyn(s)));
    record
  }

  pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
    self.frames.push(frame.into());
    self
  }

  pub fn with_source(mut self, source: ExceptionRecord) -> Self {
    self.source = Some(Box::new(source));
    self
  }

  pub fn is_empty(&self) -> bool {
    self.kind.is_empty() && self.message.is_empty() && self.frames.is_empty()
  }
}

/// Scope labels in effect for one event, outermost first.
pub type ScopeStack = SmallVec<[String; 4]>;

/// One log call, fully resolved. Built per call and dropped after the write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
  pub timestamp: DateTime<Utc>,
  pub level: LogLevel,
  /// Logger category, usually a dotted or `::` separated module path.
  pub category: String,
  pub event_id: i32,
  pub message: String,
  pub exception: Option<ExceptionRecord>,
  pub scopes: ScopeStack,
}

impl LogEvent {
  pub fn new(level: LogLevel, category: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      timestamp: Utc::now(),
      level,
      category: category.into(),
      event_id: 0,
      message: message.into(),
      exception: None,
      scopes: ScopeStack::new(),
    }
  }

  pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
    self.timestamp = timestamp;
    self
  }

  pub fn with_event_id(mut self, event_id: i32) -> Self {
    self.event_id = event_id;
    self
  }

  pub fn with_exception(mut self, exception: ExceptionRecord) -> Self {
    self.exception = Some(exception);
    self
  }

  pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.scopes.extend(scopes.into_iter().map(Into::into));
    self
  }
}

impl fmt::Display for LogEvent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}] {}: {}", self.level, self.category, self.message)
  }
}
