use std::sync::Arc;
use std::thread;

use ttlog_console::prelude::*;
use ttlog_console::scope::push_scope;

const CONFIG: &str = r#"{
  "Logging": {
    "Console": {
      "UseColors": true,
      "TimeZone": "UTC",
      "IncludeEventId": true,
      "LogLevel": {
        "Default": "Debug",
        "demo::noisy": "Warning"
      }
    }
  }
}"#;

#[derive(Debug)]
struct PaymentDeclined;

impl std::fmt::Display for PaymentDeclined {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "card issuer declined the charge")
  }
}

impl std::error::Error for PaymentDeclined {}

fn main() {
  println!("ttlog-console examples");
  println!("======================");

  let config = match JsonConfiguration::from_str(CONFIG) {
    Ok(config) => Arc::new(config.with_section("Logging:Console")),
    Err(e) => {
      eprintln!("bad demo configuration: {}", e);
      return;
    },
  };

  let provider = Arc::new(ConsoleLoggerProvider::new(SettingsSource::Dynamic(
    config.clone(),
  )));

  example_basic(&provider);
  example_scopes_and_errors(&provider);
  example_multithreaded(&provider);
  example_live_reload(&provider, &config);
  example_tracing_bridge(&provider);

  provider.dispose();
  println!(
    "\ndropped events: {}, format failures: {}",
    provider.dropped_events(),
    provider.format_failures()
  );
}

fn example_basic(provider: &ConsoleLoggerProvider) {
  println!("\n--- basic ---");
  let log = provider.get_logger("demo::orders");
  log.trace("hidden by the Default threshold");
  log.debug("loading order book");
  log.info("order book ready");
  log.warn("order book is 80% full");

  let noisy = provider.get_logger("demo::noisy::poller");
  noisy.info("hidden by the demo::noisy threshold");
  noisy.warn("poller fell behind");
}

fn example_scopes_and_errors(provider: &ConsoleLoggerProvider) {
  println!("\n--- scopes and errors ---");
  let log = provider.get_logger("demo::payments");
  let _request = log.begin_scope("request 7");
  let _user = push_scope("user 42");

  log.log(LogLevel::Info, 1001, "charging card", None, &["attempt 1"]);
  log.log_error(LogLevel::Error, "charge failed", &PaymentDeclined);
}

fn example_multithreaded(provider: &Arc<ConsoleLoggerProvider>) {
  println!("\n--- multithreaded ---");
  let handles: Vec<_> = (0..4)
    .map(|worker| {
      let provider = Arc::clone(provider);
      thread::spawn(move || {
        let log = provider.get_logger(&format!("demo::worker{}", worker));
        for job in 0..3 {
          log.log(LogLevel::Info, job, &format!("job {} done", job), None, &[]);
        }
      })
    })
    .collect();
  for handle in handles {
    let _ = handle.join();
  }
}

fn example_live_reload(provider: &ConsoleLoggerProvider, config: &JsonConfiguration) {
  println!("\n--- live reload ---");
  let log = provider.get_logger("demo::orders");
  log.debug("visible before reload");

  let reloaded = r#"{ "Logging": { "Console": {
    "UseColors": false,
    "TimeZone": "Europe/Berlin",
    "TimestampFormat": "%H:%M:%S %Z",
    "LogLevel": { "Default": "Information" }
  } } }"#;
  if let Err(e) = config.reload_from_str(reloaded) {
    eprintln!("reload failed: {}", e);
  }

  log.debug("hidden after reload");
  log.info("plain text, Berlin time");
}

fn example_tracing_bridge(provider: &Arc<ConsoleLoggerProvider>) {
  println!("\n--- tracing bridge ---");
  use tracing_subscriber::layer::SubscriberExt;

  let subscriber = tracing_subscriber::Registry::default().with(ConsoleLayer::new(Arc::clone(provider)));
  tracing::subscriber::with_default(subscriber, || {
    let span = tracing::info_span!("checkout");
    let _entered = span.enter();
    tracing::info!(target: "demo::tracing", items = 3, "cart submitted");
    tracing::warn!(target: "demo::tracing", "inventory low");
  });
}
