#[cfg(test)]
mod __test__ {
  use chrono::{TimeZone, Utc};
  use chrono_tz::Asia::Tokyo;

  use crate::error::FormatError;
  use crate::event::{ExceptionRecord, LogEvent, LogLevel};
  use crate::formatter::{
    render, render_exception, ConsoleColor, ConsoleFormatter, LogFormatter, Segment,
  };
  use crate::settings::{Settings, TimeZoneSetting};

  fn utc_settings() -> Settings {
    Settings::default().with_time_zone(TimeZoneSetting::Utc)
  }

  fn event(level: LogLevel, category: &str, message: &str) -> LogEvent {
    LogEvent::new(level, category, message).at(Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap())
  }

  #[test]
  fn primary_line_layout() {
    let segments = ConsoleFormatter
      .format(&event(LogLevel::Info, "App", "started"), &utc_settings())
      .unwrap();

    assert_eq!(segments.len(), 1);
    assert_eq!(
      segments[0],
      Segment::plain("[2024-03-01 08:30:00.000] [INFO] App: started\n")
    );
  }

  #[test]
  fn suppressed_below_threshold() {
    let settings = utc_settings().with_threshold("App.Service", LogLevel::Info);
    let segments = ConsoleFormatter
      .format(&event(LogLevel::Debug, "App.Service", "noise"), &settings)
      .unwrap();
    assert!(segments.is_empty());
  }

  #[test]
  fn suppression_law_for_every_level_pair() {
    for threshold in LogLevel::ALL {
      let settings = utc_settings().with_threshold("Cat", threshold);
      for level in LogLevel::ALL {
        let segments = ConsoleFormatter
          .format(&event(level, "Cat.Sub", "m"), &settings)
          .unwrap();
        let expect_written = level != LogLevel::None && level >= threshold;
        assert_eq!(
          !segments.is_empty(),
          expect_written,
          "level {:?} threshold {:?}",
          level,
          threshold
        );
      }
    }
  }

  #[test]
  fn error_with_exception_gives_two_red_segments() {
    let ev = event(LogLevel::Error, "App.Orders", "save failed").with_exception(
      ExceptionRecord::new("SaveFailed", "could not save order")
        .with_frame("orders::save")
        .with_source(ExceptionRecord::new("", "disk full")),
    );
    let segments = ConsoleFormatter.format(&ev, &utc_settings()).unwrap();

    assert_eq!(segments.len(), 2);
    assert_eq!(
      segments[0],
      Segment::new(
        "[2024-03-01 08:30:00.000] [ERROR] App.Orders: save failed\n",
        Some(ConsoleColor::Red)
      )
    );
    assert_eq!(
      segments[1],
      Segment::new(
        "SaveFailed: could not save order\n   at orders::save\n ---> disk full\n",
        Some(ConsoleColor::Red)
      )
    );
  }

  #[test]
  fn scopes_and_event_id() {
    let ev = event(LogLevel::Warn, "Http", "slow")
      .with_event_id(42)
      .with_scopes(["request 7", "order 9"]);

    let with = ConsoleFormatter
      .format(&ev, &utc_settings().with_event_id(true))
      .unwrap();
    assert_eq!(
      with[0].text,
      "[2024-03-01 08:30:00.000] [WARN] Http[42] => request 7 => order 9: slow\n"
    );
    assert_eq!(with[0].color, Some(ConsoleColor::Yellow));

    let without = ConsoleFormatter
      .format(&ev, &utc_settings().with_scopes(false))
      .unwrap();
    assert_eq!(without[0].text, "[2024-03-01 08:30:00.000] [WARN] Http: slow\n");
  }

  #[test]
  fn timestamp_format_and_zone() {
    let settings = Settings::default()
      .with_time_zone(TimeZoneSetting::Named(Tokyo))
      .with_timestamp_format("%H:%M %Z");
    let segments = ConsoleFormatter
      .format(&event(LogLevel::Debug, "App", "tick"), &settings)
      .unwrap();
    assert_eq!(segments[0].text, "[17:30 JST] [DEBUG] App: tick\n");
    assert_eq!(segments[0].color, Some(ConsoleColor::Gray));
  }

  #[test]
  fn color_table() {
    assert_eq!(ConsoleColor::for_level(LogLevel::Critical), Some(ConsoleColor::Red));
    assert_eq!(ConsoleColor::for_level(LogLevel::Error), Some(ConsoleColor::Red));
    assert_eq!(ConsoleColor::for_level(LogLevel::Warn), Some(ConsoleColor::Yellow));
    assert_eq!(ConsoleColor::for_level(LogLevel::Info), None);
    assert_eq!(ConsoleColor::for_level(LogLevel::Debug), Some(ConsoleColor::Gray));
    assert_eq!(ConsoleColor::for_level(LogLevel::Trace), Some(ConsoleColor::Gray));
  }

  #[test]
  fn invalid_timestamp_format_falls_back_to_message() {
    // Explicit settings can bypass validation when built by hand.
    let settings = utc_settings().with_timestamp_format("%Y-%Q");
    let ev = event(LogLevel::Error, "App", "raw text");

    assert!(matches!(
      ConsoleFormatter.format(&ev, &settings),
      Err(FormatError::Timestamp { .. })
    ));

    let rendered = render(&ConsoleFormatter, &ev, &settings);
    assert!(matches!(rendered.degraded, Some(FormatError::Timestamp { .. })));
    assert_eq!(
      rendered.segments.as_slice(),
      [Segment::new("raw text\n", Some(ConsoleColor::Red))]
    );
  }

  #[test]
  fn empty_exception_falls_back() {
    let ev = event(LogLevel::Info, "App", "odd").with_exception(ExceptionRecord::default());
    let rendered = render(&ConsoleFormatter, &ev, &utc_settings());
    assert_eq!(rendered.degraded, Some(FormatError::EmptyException));
    assert_eq!(rendered.segments.as_slice(), [Segment::plain("odd\n")]);
  }

  #[test]
  fn suppressed_event_stays_suppressed_when_malformed() {
    let settings = utc_settings().with_threshold("", LogLevel::Error);
    let ev = event(LogLevel::Info, "App", "odd").with_exception(ExceptionRecord::default());
    let rendered = render(&ConsoleFormatter, &ev, &settings);
    assert!(rendered.segments.is_empty());
    assert!(rendered.degraded.is_none());
  }

  #[test]
  fn exception_kind_only() {
    assert_eq!(
      render_exception(&ExceptionRecord::new("Timeout", "")),
      "Timeout\n"
    );
  }
}
