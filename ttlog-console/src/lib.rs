//! # ttlog-console
//!
//! A structured console log sink: per-category loggers, level thresholds by
//! category prefix, colored output, scopes, and settings that can be swapped
//! while other threads keep logging.
//!
//! ```rust
//! use ttlog_console::prelude::*;
//!
//! let provider = ConsoleLoggerProvider::new(Settings::default().with_threshold("", LogLevel::Info));
//! let log = provider.get_logger("App.Service");
//! log.info("service started");
//! log.debug("not shown");
//! provider.dispose();
//! ```

pub mod config_source;
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod formatter;
pub mod provider;
pub mod scope;
pub mod settings;
pub mod sink;
pub mod trace_layer;

pub mod prelude {
  pub use crate::config_source::{ConfigurationSource, JsonConfiguration, MemoryConfiguration};
  pub use crate::diagnostics::{Diagnostics, StderrDiagnostics, TracingDiagnostics};
  pub use crate::event::{ExceptionRecord, LogEvent, LogLevel};
  pub use crate::provider::{ConsoleLoggerProvider, Logger};
  pub use crate::settings::{Settings, SettingsSource, TimeZoneSetting};
  pub use crate::trace_layer::ConsoleLayer;
}
