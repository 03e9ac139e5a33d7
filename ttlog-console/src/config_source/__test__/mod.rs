#[cfg(test)]
mod __test__ {
  use std::io::Write;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  use crate::config_source::{ConfigurationSource, JsonConfiguration, MemoryConfiguration};

  fn counter(source: &dyn ConfigurationSource) -> Arc<AtomicUsize> {
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_cb = Arc::clone(&hits);
    source.on_change(Arc::new(move || {
      hits_cb.fetch_add(1, Ordering::SeqCst);
    }));
    hits
  }

  #[test]
  fn memory_get_and_keys() {
    let source = MemoryConfiguration::from_pairs([("UseColors", "false"), ("TimeZone", "UTC")]);
    assert_eq!(source.get_value("UseColors").as_deref(), Some("false"));
    assert_eq!(source.get_value("Missing"), None);

    let mut keys = source.keys();
    keys.sort();
    assert_eq!(keys, ["TimeZone", "UseColors"]);
  }

  #[test]
  fn memory_set_notifies() {
    let source = MemoryConfiguration::new();
    let hits = counter(&source);

    source.set("UseColors", "true");
    source.set_many([("TimeZone", "UTC"), ("IncludeScopes", "false")]);
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    assert_eq!(source.remove("TimeZone").as_deref(), Some("UTC"));
    assert_eq!(source.remove("TimeZone"), None);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn json_flattens_nested_objects() {
    let source = JsonConfiguration::from_str(
      r#"{
        "UseColors": false,
        "LogLevel": { "Default": "Warning", "App.Service": "Information" },
        "Tags": ["a", "b"],
        "Ignored": null
      }"#,
    )
    .unwrap();

    assert_eq!(source.get_value("UseColors").as_deref(), Some("false"));
    assert_eq!(source.get_value("LogLevel:Default").as_deref(), Some("Warning"));
    assert_eq!(
      source.get_value("LogLevel:App.Service").as_deref(),
      Some("Information")
    );
    assert_eq!(source.get_value("Tags:1").as_deref(), Some("b"));
    assert_eq!(source.get_value("Ignored"), None);
  }

  #[test]
  fn json_section_strips_prefix() {
    let source = JsonConfiguration::from_str(
      r#"{ "Logging": { "Console": { "TimeZone": "UTC" } }, "Other": 1 }"#,
    )
    .unwrap()
    .with_section("Logging:Console");

    assert_eq!(source.get_value("TimeZone").as_deref(), Some("UTC"));
    assert_eq!(source.keys(), ["TimeZone"]);
  }

  #[test]
  fn json_rejects_non_object_root() {
    assert!(JsonConfiguration::from_str("[1, 2]").is_err());
    assert!(JsonConfiguration::from_str("{ not json").is_err());
  }

  #[test]
  fn json_reload_keeps_old_document_on_error() {
    let source = JsonConfiguration::from_str(r#"{ "UseColors": true }"#).unwrap();
    let hits = counter(&source);

    assert!(source.reload_from_str("{ broken").is_err());
    assert_eq!(source.get_value("UseColors").as_deref(), Some("true"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    source.reload_from_str(r#"{ "UseColors": false }"#).unwrap();
    assert_eq!(source.get_value("UseColors").as_deref(), Some("false"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn json_file_reload() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "TimeZone": "UTC" }}"#).unwrap();
    file.flush().unwrap();

    let source = JsonConfiguration::from_file(file.path()).unwrap();
    let hits = counter(&source);
    assert_eq!(source.get_value("TimeZone").as_deref(), Some("UTC"));

    std::fs::write(file.path(), r#"{ "TimeZone": "Europe/Berlin" }"#).unwrap();
    source.reload_from_file().unwrap();
    assert_eq!(source.get_value("TimeZone").as_deref(), Some("Europe/Berlin"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn json_reload_from_file_without_path_fails() {
    let source = JsonConfiguration::from_str("{}").unwrap();
    assert!(source.reload_from_file().is_err());
  }
}
