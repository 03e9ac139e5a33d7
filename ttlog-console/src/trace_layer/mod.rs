
use std::fmt::Write;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event as TracingEvent, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{Layer, Registry};

use crate::diagnostics::DIAGNOSTICS_TARGET;
use crate::event::{LogEvent, LogLevel, ScopeStack};
use crate::provider::ConsoleLoggerProvider;

/// Routes `tracing` events into a [`ConsoleLoggerProvider`].
///
/// The event target becomes the category and the names of the entered spans,
/// root first, become the scope chain. Events on [`DIAGNOSTICS_TARGET`] are
/// skipped so diagnostics never loop back into the console.
#[derive(Debug, Clone)]
pub struct ConsoleLayer {
  provider: Arc<ConsoleLoggerProvider>,
}

impl ConsoleLayer {
  pub fn new(provider: Arc<ConsoleLoggerProvider>) -> Self {
    Self { provider }
  }

  /// Installs a registry with this layer as the global default subscriber.
  pub fn install(
    provider: Arc<ConsoleLoggerProvider>,
  ) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let subscriber = Registry::default().with(Self::new(provider));
    tracing::subscriber::set_global_default(subscriber)
  }
}

impl<S> Layer<S> for ConsoleLayer
where
  S: Subscriber + for<'a> LookupSpan<'a>,
{
  fn on_event(&self, event: &TracingEvent<'_>, ctx: Context<'_, S>) {
    let metadata = event.metadata();
    let target = metadata.target();
    if target.starts_with(DIAGNOSTICS_TARGET) {
      return;
    }

    let level = LogLevel::from(metadata.level());
    if !self.provider.is_enabled(target, level) {
      return;
    }

    let mut visitor = MessageVisitor::default();
    event.record(&mut visitor);

    let scopes: ScopeStack = ctx
      .event_scope(event)
      .map(|scope| scope.from_root().map(|span| span.name().to_string()).collect())
      .unwrap_or_default();

    let mut log_event = LogEvent::new(level, target, visitor.finish());
    log_event.scopes = scopes;
    self.provider.log_event(&log_event);
  }
}

/// Collects the `message` field plus every other field as `key=value`.
#[derive(Default)]
struct MessageVisitor {
  message: Option<String>,
  fields: String,
}

impl MessageVisitor {
  fn finish(self) -> String {
    match self.message {
      Some(mut message) if !self.fields.is_empty() => {
        message.push(' ');
        message.push_str(&self.fields);
        message
      },
      Some(message) => message,
      None => self.fields,
    }
  }

  fn push_field(&mut self, field: &Field, value: std::fmt::Arguments<'_>) {
    if !self.fields.is_empty() {
      self.fields.push(' ');
    }
    let _ = write!(self.fields, "{}={}", field.name(), value);
  }
}

impl Visit for MessageVisitor {
  fn record_str(&mut self, field: &Field, value: &str) {
    if field.name() == "message" {
      self.message = Some(value.to_string());
    } else {
      self.push_field(field, format_args!("{:?}", value));
    }
  }

  fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
    if field.name() == "message" {
      self.message = Some(format!("{:?}", value));
    } else {
      self.push_field(field, format_args!("{:?}", value));
    }
  }
}
