//! # Formatter
//!
//! Turns a [`LogEvent`] into styled [`Segment`]s. Formatting is a pure
//! function of the event and a settings snapshot, so it runs on the caller's
//! thread without any synchronization.
//!
//! ## Layout
//!
//! ```text
//! [2024-03-01 08:30:00.000] [ERROR] App.Service[42] => request 7 => order 9: save failed
//! SaveFailed: could not save order
//!    at orders::save
//!  ---> disk full
//! ```
//!
//! The first line is one segment colored by level. The exception block, when
//! present, is a second segment colored red.

mod __test__;

use std::fmt::Write;

use chrono::format::StrftimeItems;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::FormatError;
use crate::event::{ExceptionRecord, LogEvent, LogLevel};
use crate::settings::Settings;

/// Foreground colors the console renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsoleColor {
  Red,
  Yellow,
  Gray,
}

impl ConsoleColor {
  /// Color used for every exception block.
  pub const EXCEPTION: ConsoleColor = ConsoleColor::Red;

  /// Fixed color table by level. `Info` keeps the terminal default.
  pub fn for_level(level: LogLevel) -> Option<ConsoleColor> {
    match level {
      LogLevel::Error | LogLevel::Critical => Some(ConsoleColor::Red),
      LogLevel::Warn => Some(ConsoleColor::Yellow),
      LogLevel::Debug | LogLevel::Trace => Some(ConsoleColor::Gray),
      LogLevel::Info | LogLevel::None => None,
    }
  }
}

impl From<ConsoleColor> for colored::Color {
  fn from(color: ConsoleColor) -> Self {
    match color {
      ConsoleColor::Red => colored::Color::Red,
      ConsoleColor::Yellow => colored::Color::Yellow,
      ConsoleColor::Gray => colored::Color::BrightBlack,
    }
  }
}

/// A run of text with an optional color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
  pub text: String,
  pub color: Option<ConsoleColor>,
}

impl Segment {
  pub fn new(text: impl Into<String>, color: Option<ConsoleColor>) -> Self {
    Self {
      text: text.into(),
      color,
    }
  }

  pub fn plain(text: impl Into<String>) -> Self {
    Self::new(text, None)
  }
}

/// Segments of one event. Almost always one or two.
pub type Segments = SmallVec<[Segment; 2]>;

/// Output of [`render`]: the segments to write, and the error that forced
/// the fallback layout if there was one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
  pub segments: Segments,
  pub degraded: Option<FormatError>,
}

/// Renders events to segments.
pub trait LogFormatter: Send + Sync {
  /// Full rendering of `event`. Suppressed events give an empty sequence;
  /// an `Err` means the event could not be rendered as configured.
  fn format(&self, event: &LogEvent, settings: &Settings) -> Result<Segments, FormatError>;
}

/// The standard console layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleFormatter;

impl LogFormatter for ConsoleFormatter {
  fn format(&self, event: &LogEvent, settings: &Settings) -> Result<Segments, FormatError> {
    let mut segments = Segments::new();
    if !settings.is_enabled(&event.category, event.level) {
      return Ok(segments);
    }

    let exception = match &event.exception {
      Some(record) if record.is_empty() => return Err(FormatError::EmptyException),
      other => other.as_ref(),
    };

    let mut line = String::with_capacity(64 + event.category.len() + event.message.len());
    line.push('[');
    let format = settings.timestamp_format();
    settings
      .time_zone
      .write_timestamp(&mut line, &event.timestamp, StrftimeItems::new(format))
      .map_err(|_| FormatError::Timestamp {
        format: format.to_string(),
      })?;
    let _ = write!(line, "] [{}] {}", event.level, event.category);

    if settings.include_event_id {
      let _ = write!(line, "[{}]", event.event_id);
    }
    if settings.include_scopes {
      for scope in &event.scopes {
        line.push_str(" => ");
        line.push_str(scope);
      }
    }
    line.push_str(": ");
    line.push_str(&event.message);
    line.push('\n');

    segments.push(Segment::new(line, ConsoleColor::for_level(event.level)));

    if let Some(record) = exception {
      segments.push(Segment::new(
        render_exception(record),
        Some(ConsoleColor::EXCEPTION),
      ));
    }

    Ok(segments)
  }
}

/// Multi-line rendering of an exception and its causes, newline terminated.
pub fn render_exception(record: &ExceptionRecord) -> String {
  let mut out = String::new();
  let mut current = Some(record);
  let mut depth = 0;

  while let Some(record) = current {
    if depth > 0 {
      out.push_str(" ---> ");
    }
    if record.kind.is_empty() {
      out.push_str(&record.message);
    } else if record.message.is_empty() {
      out.push_str(&record.kind);
    } else {
      let _ = write!(out, "{}: {}", record.kind, record.message);
    }
    out.push('\n');
    for frame in &record.frames {
      let _ = writeln!(out, "   at {}", frame);
    }
    current = record.source.as_deref();
    depth += 1;
  }

  out
}

/// Segment written in place of an event that failed to format: the raw
/// message on one line.
pub fn fallback_segment(event: &LogEvent) -> Segment {
  let mut text = String::with_capacity(event.message.len() + 1);
  text.push_str(&event.message);
  text.push('\n');
  Segment::new(text, ConsoleColor::for_level(event.level))
}

/// Formats with `formatter`, falling back to [`fallback_segment`] on error.
///
/// Suppression is checked before the fallback so a suppressed event stays
/// suppressed even when it is malformed.
pub fn render(formatter: &dyn LogFormatter, event: &LogEvent, settings: &Settings) -> Rendered {
  match formatter.format(event, settings) {
    Ok(segments) => Rendered {
      segments,
      degraded: None,
    },
    Err(error) => {
      let mut segments = Segments::new();
      if settings.is_enabled(&event.category, event.level) {
        segments.push(fallback_segment(event));
      }
      Rendered {
        segments,
        degraded: Some(error),
      }
    },
  }
}
