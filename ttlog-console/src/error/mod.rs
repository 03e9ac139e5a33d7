
use std::any::Any;
use std::io;

use thiserror::Error;

/// A malformed value coming out of a settings source.
///
/// Never raised into the logging hot path: the resolver reports it on the
/// diagnostic channel and installs default settings instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
  #[error("invalid boolean for `{key}`: {value:?}")]
  InvalidBool { key: String, value: String },

  #[error("unknown time zone for `{key}`: {value:?}")]
  InvalidTimeZone { key: String, value: String },

  #[error("invalid log level for `{key}`: {value:?}")]
  InvalidLevel { key: String, value: String },

  #[error("negative log level for `{key}`: {value}")]
  NegativeLevel { key: String, value: i64 },

  #[error("invalid timestamp format {format:?}")]
  InvalidTimestampFormat { format: String },

  #[error("failed to load configuration: {0}")]
  Load(String),
}

/// An event that could not be rendered in full.
///
/// Recovered by writing the raw message only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
  #[error("timestamp format {format:?} could not be rendered")]
  Timestamp { format: String },

  #[error("exception record has no kind, message or frames")]
  EmptyException,

  #[error("formatter panicked: {0}")]
  Panicked(String),
}

/// The output stream refused a write.
///
/// Counted as a dropped event; the stream is never reopened.
#[derive(Debug, Error)]
pub enum SinkWriteError {
  #[error("output stream write failed: {0}")]
  Io(#[from] io::Error),

  #[error("output stream already closed")]
  Closed,

  #[error("output stream panicked: {0}")]
  Panicked(String),
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
  payload
    .downcast_ref::<&str>()
    .map(|s| s.to_string())
    .or_else(|| payload.downcast_ref::<String>().cloned())
    .unwrap_or_else(|| "unknown panic".to_string())
}
