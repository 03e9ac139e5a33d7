//! # Console Sink
//!
//! Owns the output stream and serializes writes to it.
//!
//! Each event is rendered into a thread-local buffer first, then written with
//! a single `write_all` while the stream mutex is held, so concurrent events
//! never interleave and the critical section only covers the I/O itself.
//!
//! A failing or panicking stream never reaches the caller: the event is
//! counted as dropped and reported on the diagnostic channel. A flush that
//! fails after a complete write is only reported. A closed sink stays closed.

mod __test__;

use std::cell::RefCell;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{panic_message, SinkWriteError};
use crate::formatter::Segment;

const ANSI_RESET: &str = "\x1b[0m";

thread_local! {
  static RENDER_BUFFER: RefCell<String> = RefCell::new(String::with_capacity(256));
}

/// Appends `segments` to `out`, wrapping colored segments in ANSI SGR codes
/// when `use_colors` is set. A trailing newline stays outside the color.
pub fn render_segments(segments: &[Segment], use_colors: bool, out: &mut String) {
  for segment in segments {
    match segment.color {
      Some(color) if use_colors => {
        let (body, newline) = match segment.text.strip_suffix('\n') {
          Some(body) => (body, "\n"),
          None => (segment.text.as_str(), ""),
        };
        let fg = colored::Color::from(color);
        let _ = write!(out, "\x1b[{}m{}{}{}", fg.to_fg_str(), body, ANSI_RESET, newline);
      },
      _ => out.push_str(&segment.text),
    }
  }
}

type Stream = Box<dyn Write + Send>;

/// Serialized writer over one output stream.
pub struct ConsoleSink {
  stream: Mutex<Option<Stream>>,
  dropped: AtomicU64,
  diagnostics: Arc<dyn Diagnostics>,
}

impl std::fmt::Debug for ConsoleSink {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ConsoleSink")
      .field("closed", &self.is_closed())
      .field("dropped", &self.dropped_events())
      .finish()
  }
}

impl ConsoleSink {
  pub fn new<W>(stream: W, diagnostics: Arc<dyn Diagnostics>) -> Self
  where
    W: Write + Send + 'static,
  {
    Self {
      stream: Mutex::new(Some(Box::new(stream))),
      dropped: AtomicU64::new(0),
      diagnostics,
    }
  }

  pub fn stdout(diagnostics: Arc<dyn Diagnostics>) -> Self {
    Self::new(io::stdout(), diagnostics)
  }

  pub fn stderr(diagnostics: Arc<dyn Diagnostics>) -> Self {
    Self::new(io::stderr(), diagnostics)
  }

  /// Writes one event. Never fails; a refused write is counted as dropped.
  pub fn write(&self, segments: &[Segment], use_colors: bool) {
    if segments.is_empty() {
      return;
    }
    let result = panic::catch_unwind(AssertUnwindSafe(|| self.try_write(segments, use_colors)))
      .unwrap_or_else(|payload| Err(SinkWriteError::Panicked(panic_message(payload.as_ref()))));
    if let Err(error) = result {
      let total_dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
      self.diagnostics.report(Diagnostic::DroppedEvent {
        error,
        total_dropped,
      });
    }
  }

  /// Writes one event and returns the failure instead of counting it.
  pub fn try_write(&self, segments: &[Segment], use_colors: bool) -> Result<(), SinkWriteError> {
    RENDER_BUFFER.with(|cell| match cell.try_borrow_mut() {
      Ok(mut buf) => {
        buf.clear();
        render_segments(segments, use_colors, &mut buf);
        self.write_bytes(buf.as_bytes())
      },
      Err(_) => {
        let mut buf = String::new();
        render_segments(segments, use_colors, &mut buf);
        self.write_bytes(buf.as_bytes())
      },
    })
  }

  fn write_bytes(&self, bytes: &[u8]) -> Result<(), SinkWriteError> {
    let flushed = {
      let mut guard = self.lock();
      let stream = guard.as_mut().ok_or(SinkWriteError::Closed)?;
      stream.write_all(bytes)?;
      stream.flush()
    };
    if let Err(error) = flushed {
      self
        .diagnostics
        .report(Diagnostic::FlushFailed(SinkWriteError::Io(error)));
    }
    Ok(())
  }

  /// Flushes the stream; errors are ignored.
  pub fn flush(&self) {
    if let Some(stream) = self.lock().as_mut() {
      let _ = stream.flush();
    }
  }

  /// Flushes and releases the stream. Later writes count as dropped.
  pub fn close(&self) {
    if let Some(mut stream) = self.lock().take() {
      let _ = stream.flush();
    }
  }

  pub fn is_closed(&self) -> bool {
    self.lock().is_none()
  }

  pub fn dropped_events(&self) -> u64 {
    self.dropped.load(Ordering::Relaxed)
  }

  fn lock(&self) -> MutexGuard<'_, Option<Stream>> {
    self.stream.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

/// In-memory stream recording every `write` call separately.
///
/// Clones share the same storage, so one clone can be handed to a sink while
/// another inspects what arrived. [`MemoryStream::close`] makes later writes
/// fail with `BrokenPipe`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStream {
  writes: Arc<Mutex<Vec<Vec<u8>>>>,
  flushes: Arc<AtomicUsize>,
  closed: Arc<AtomicBool>,
}

impl MemoryStream {
  pub fn new() -> Self {
    Self::default()
  }

  /// Each recorded write, lossily decoded.
  pub fn writes(&self) -> Vec<String> {
    self
      .lock()
      .iter()
      .map(|w| String::from_utf8_lossy(w).into_owned())
      .collect()
  }

  pub fn write_count(&self) -> usize {
    self.lock().len()
  }

  /// Everything written so far, concatenated.
  pub fn contents(&self) -> String {
    self.writes().concat()
  }

  pub fn flush_count(&self) -> usize {
    self.flushes.load(Ordering::SeqCst)
  }

  pub fn close(&self) {
    self.closed.store(true, Ordering::SeqCst);
  }

  fn lock(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
    self.writes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl Write for MemoryStream {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    if self.closed.load(Ordering::SeqCst) {
      return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream closed"));
    }
    self.lock().push(buf.to_vec());
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    if self.closed.load(Ordering::SeqCst) {
      return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream closed"));
    }
    self.flushes.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}
