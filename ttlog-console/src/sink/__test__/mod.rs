#[cfg(test)]
mod __test__ {
  use std::io::{self, Write};
  use std::sync::Arc;
  use std::thread;

  use crate::diagnostics::{CollectingDiagnostics, Diagnostic, NullDiagnostics};
  use crate::error::SinkWriteError;
  use crate::formatter::{ConsoleColor, Segment};
  use crate::sink::{render_segments, ConsoleSink, MemoryStream};

  struct BrokenStream;

  impl Write for BrokenStream {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
      Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
    }

    fn flush(&mut self) -> io::Result<()> {
      Ok(())
    }
  }

  /// Accepts every byte, then refuses to flush.
  #[derive(Clone, Default)]
  struct UnflushableStream {
    inner: MemoryStream,
  }

  impl Write for UnflushableStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
      self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
      Err(io::Error::new(io::ErrorKind::Other, "device busy"))
    }
  }

  struct PanickingStream;

  impl Write for PanickingStream {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
      panic!("stream exploded");
    }

    fn flush(&mut self) -> io::Result<()> {
      Ok(())
    }
  }

  fn red_event() -> Vec<Segment> {
    vec![
      Segment::new("[t] [ERROR] App: failed\n", Some(ConsoleColor::Red)),
      Segment::new("Boom: bad\n   at main\n", Some(ConsoleColor::Red)),
    ]
  }

  fn render(segments: &[Segment], use_colors: bool) -> String {
    let mut out = String::new();
    render_segments(segments, use_colors, &mut out);
    out
  }

  #[test]
  fn colors_wrap_text_but_not_the_newline() {
    let out = render(&[Segment::new("warned\n", Some(ConsoleColor::Yellow))], true);
    assert_eq!(out, "\x1b[33mwarned\x1b[0m\n");

    let gray = render(&[Segment::new("quiet", Some(ConsoleColor::Gray))], true);
    assert_eq!(gray, "\x1b[90mquiet\x1b[0m");
  }

  #[test]
  fn no_escape_codes_without_colors() {
    let out = render(&red_event(), false);
    assert_eq!(out, "[t] [ERROR] App: failed\nBoom: bad\n   at main\n");
    assert!(!out.contains('\x1b'));
  }

  #[test]
  fn stripping_colors_matches_plain_rendering() {
    let segments = vec![
      Segment::plain("[t] [INFO] App: plain\n"),
      Segment::new("line one\nline two\n", Some(ConsoleColor::Red)),
      Segment::new("no newline", Some(ConsoleColor::Gray)),
    ];
    let colored = render(&segments, true);
    let stripped = strip_ansi_escapes::strip(colored.as_bytes());
    assert_eq!(String::from_utf8(stripped).unwrap(), render(&segments, false));
  }

  #[test]
  fn one_write_per_event() {
    let stream = MemoryStream::new();
    let sink = ConsoleSink::new(stream.clone(), Arc::new(NullDiagnostics));

    sink.write(&red_event(), false);
    sink.write(&[Segment::plain("second\n")], false);

    assert_eq!(
      stream.writes(),
      ["[t] [ERROR] App: failed\nBoom: bad\n   at main\n", "second\n"]
    );
    assert_eq!(stream.flush_count(), 2);
  }

  #[test]
  fn empty_event_writes_nothing() {
    let stream = MemoryStream::new();
    let sink = ConsoleSink::new(stream.clone(), Arc::new(NullDiagnostics));
    sink.write(&[], true);
    assert_eq!(stream.write_count(), 0);
    assert_eq!(sink.dropped_events(), 0);
  }

  #[test]
  fn broken_stream_counts_drops() {
    let diagnostics = Arc::new(CollectingDiagnostics::new());
    let sink = ConsoleSink::new(BrokenStream, diagnostics.clone());

    sink.write(&red_event(), true);
    sink.write(&red_event(), true);

    assert_eq!(sink.dropped_events(), 2);
    let reports = diagnostics.take();
    assert_eq!(reports.len(), 2);
    assert!(matches!(
      reports[1],
      Diagnostic::DroppedEvent {
        error: SinkWriteError::Io(_),
        total_dropped: 2
      }
    ));
  }

  #[test]
  fn try_write_surfaces_error() {
    let sink = ConsoleSink::new(BrokenStream, Arc::new(NullDiagnostics));
    assert!(sink.try_write(&red_event(), false).is_err());
    assert_eq!(sink.dropped_events(), 0);
  }

  #[test]
  fn closed_sink_drops_and_releases_stream() {
    let stream = MemoryStream::new();
    let sink = ConsoleSink::new(stream.clone(), Arc::new(NullDiagnostics));

    sink.write(&[Segment::plain("before\n")], false);
    sink.close();
    sink.close();
    assert!(sink.is_closed());

    sink.write(&[Segment::plain("after\n")], false);
    assert_eq!(stream.writes(), ["before\n"]);
    assert_eq!(sink.dropped_events(), 1);
  }

  #[test]
  fn stream_closed_mid_run() {
    let stream = MemoryStream::new();
    let sink = ConsoleSink::new(stream.clone(), Arc::new(NullDiagnostics));

    sink.write(&[Segment::plain("one\n")], false);
    stream.close();
    sink.write(&[Segment::plain("two\n")], false);

    assert_eq!(stream.writes(), ["one\n"]);
    assert_eq!(sink.dropped_events(), 1);
    assert!(!sink.is_closed());
  }

  #[test]
  fn concurrent_writes_never_interleave() {
    const THREADS: usize = 8;
    const EVENTS: usize = 200;

    let stream = MemoryStream::new();
    let sink = Arc::new(ConsoleSink::new(stream.clone(), Arc::new(NullDiagnostics)));

    let handles: Vec<_> = (0..THREADS)
      .map(|t| {
        let sink = Arc::clone(&sink);
        thread::spawn(move || {
          for i in 0..EVENTS {
            let segments = [
              Segment::new(format!("head {} {}\n", t, i), Some(ConsoleColor::Yellow)),
              Segment::new(format!("tail {} {}\n", t, i), Some(ConsoleColor::Red)),
            ];
            sink.write(&segments, false);
          }
        })
      })
      .collect();
    for handle in handles {
      handle.join().unwrap();
    }

    let writes = stream.writes();
    assert_eq!(writes.len(), THREADS * EVENTS);
    for write in writes {
      let lines: Vec<&str> = write.lines().collect();
      assert_eq!(lines.len(), 2);
      let head = lines[0].strip_prefix("head ").unwrap();
      let tail = lines[1].strip_prefix("tail ").unwrap();
      assert_eq!(head, tail);
    }
  }

  #[test]
  fn failed_flush_is_reported_not_dropped() {
    let stream = UnflushableStream::default();
    let diagnostics = Arc::new(CollectingDiagnostics::new());
    let sink = ConsoleSink::new(stream.clone(), diagnostics.clone());

    sink.write(&[Segment::plain("kept\n")], false);

    assert_eq!(stream.inner.writes(), ["kept\n"]);
    assert_eq!(sink.dropped_events(), 0);
    assert!(matches!(
      diagnostics.take().as_slice(),
      [Diagnostic::FlushFailed(SinkWriteError::Io(_))]
    ));
  }

  #[test]
  fn panicking_stream_counts_as_dropped() {
    let diagnostics = Arc::new(CollectingDiagnostics::new());
    let sink = ConsoleSink::new(PanickingStream, diagnostics.clone());

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
      sink.write(&[Segment::plain("lost\n")], false);
      sink.write(&[Segment::plain("lost too\n")], false);
    }));

    assert!(result.is_ok());
    assert_eq!(sink.dropped_events(), 2);
    assert!(!sink.is_closed());
    let reports = diagnostics.take();
    assert!(matches!(
      reports[0],
      Diagnostic::DroppedEvent {
        error: SinkWriteError::Panicked(ref reason),
        total_dropped: 1,
      } if reason == "stream exploded"
    ));
  }
}
