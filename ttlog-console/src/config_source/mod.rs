//! # Configuration Sources
//!
//! Dynamic settings come from a [`ConfigurationSource`]: a flat key/value view
//! over some configuration section that can tell its subscribers when it
//! changed. Keys use `:` as the section separator (`LogLevel:App.Service`).
//!
//! Two sources ship with the crate:
//! - [`MemoryConfiguration`], set programmatically
//! - [`JsonConfiguration`], loaded from a JSON document or file

mod __test__;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use serde_json::Value;

use crate::error::ConfigurationError;

/// Callback run after a source changed.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Read access to a configuration section plus change notification.
pub trait ConfigurationSource: Send + Sync {
  /// Value stored under `key`, if any.
  fn get_value(&self, key: &str) -> Option<String>;

  /// Every key currently present. Sources that cannot enumerate return
  /// nothing; per-category thresholds are then unavailable.
  fn keys(&self) -> Vec<String> {
    Vec::new()
  }

  /// Registers `callback` to run after every change.
  fn on_change(&self, callback: ChangeCallback);
}

/// Subscriber list shared by the bundled sources.
#[derive(Default)]
pub(crate) struct ChangeNotifier {
  callbacks: Mutex<Vec<ChangeCallback>>,
}

impl ChangeNotifier {
  pub(crate) fn subscribe(&self, callback: ChangeCallback) {
    self
      .callbacks
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .push(callback);
  }

  /// Runs every callback. The list is cloned first so a callback may
  /// subscribe again without deadlocking.
  pub(crate) fn notify(&self) {
    let callbacks = self
      .callbacks
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .clone();
    for callback in callbacks {
      callback();
    }
  }
}

impl std::fmt::Debug for ChangeNotifier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let count = self.callbacks.lock().map(|c| c.len()).unwrap_or_default();
    f.debug_struct("ChangeNotifier").field("subscribers", &count).finish()
  }
}

/// In-memory source. Every mutation notifies subscribers once.
#[derive(Debug, Default)]
pub struct MemoryConfiguration {
  values: DashMap<String, String>,
  notifier: ChangeNotifier,
}

impl MemoryConfiguration {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_pairs<I, K, V>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    let source = Self::new();
    for (k, v) in pairs {
      source.values.insert(k.into(), v.into());
    }
    source
  }

  pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
    self.values.insert(key.into(), value.into());
    self.notifier.notify();
  }

  /// Applies several values and notifies once afterwards.
  pub fn set_many<I, K, V>(&self, pairs: I)
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    for (k, v) in pairs {
      self.values.insert(k.into(), v.into());
    }
    self.notifier.notify();
  }

  pub fn remove(&self, key: &str) -> Option<String> {
    let removed = self.values.remove(key).map(|(_, v)| v);
    if removed.is_some() {
      self.notifier.notify();
    }
    removed
  }
}

impl ConfigurationSource for MemoryConfiguration {
  fn get_value(&self, key: &str) -> Option<String> {
    self.values.get(key).map(|v| v.value().clone())
  }

  fn keys(&self) -> Vec<String> {
    self.values.iter().map(|e| e.key().clone()).collect()
  }

  fn on_change(&self, callback: ChangeCallback) {
    self.notifier.subscribe(callback);
  }
}

/// Source backed by a JSON document.
///
/// Nested objects are flattened into `parent:child` keys, array items into
/// `parent:0`, `parent:1`. With a section set, only keys below it are
/// visible and the section prefix is stripped.
#[derive(Debug, Default)]
pub struct JsonConfiguration {
  values: RwLock<BTreeMap<String, String>>,
  section: Option<String>,
  path: Option<PathBuf>,
  notifier: ChangeNotifier,
}

impl JsonConfiguration {
  pub fn from_str(json: &str) -> Result<Self, ConfigurationError> {
    let values = Self::parse(json)?;
    Ok(Self {
      values: RwLock::new(values),
      ..Self::default()
    })
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
    let path = path.as_ref();
    let values = Self::parse(&Self::read(path)?)?;
    Ok(Self {
      values: RwLock::new(values),
      path: Some(path.to_path_buf()),
      ..Self::default()
    })
  }

  /// Restricts the view to keys below `section` (e.g. `Logging:Console`).
  pub fn with_section(mut self, section: impl Into<String>) -> Self {
    self.section = Some(section.into());
    self
  }

  /// Replaces the whole document and notifies subscribers. On a parse
  /// error the previous document stays in place.
  pub fn reload_from_str(&self, json: &str) -> Result<(), ConfigurationError> {
    let values = Self::parse(json)?;
    *self.values.write().unwrap_or_else(|p| p.into_inner()) = values;
    self.notifier.notify();
    Ok(())
  }

  /// Re-reads the file this source was loaded from.
  pub fn reload_from_file(&self) -> Result<(), ConfigurationError> {
    let path = self
      .path
      .as_deref()
      .ok_or_else(|| ConfigurationError::Load("source was not loaded from a file".to_string()))?;
    self.reload_from_str(&Self::read(path)?)
  }

  fn read(path: &Path) -> Result<String, ConfigurationError> {
    std::fs::read_to_string(path)
      .map_err(|e| ConfigurationError::Load(format!("{}: {}", path.display(), e)))
  }

  fn parse(json: &str) -> Result<BTreeMap<String, String>, ConfigurationError> {
    let root: Value =
      serde_json::from_str(json).map_err(|e| ConfigurationError::Load(e.to_string()))?;
    if !root.is_object() {
      return Err(ConfigurationError::Load(
        "configuration root must be a JSON object".to_string(),
      ));
    }
    let mut values = BTreeMap::new();
    flatten(None, &root, &mut values);
    Ok(values)
  }

  fn full_key(&self, key: &str) -> String {
    match &self.section {
      Some(section) => format!("{}:{}", section, key),
      None => key.to_string(),
    }
  }
}

fn flatten(prefix: Option<&str>, value: &Value, out: &mut BTreeMap<String, String>) {
  let join = |key: &str| match prefix {
    Some(p) => format!("{}:{}", p, key),
    None => key.to_string(),
  };

  match value {
    Value::Object(map) => {
      for (k, v) in map {
        flatten(Some(&join(k)), v, out);
      }
    },
    Value::Array(items) => {
      for (i, v) in items.iter().enumerate() {
        flatten(Some(&join(&i.to_string())), v, out);
      }
    },
    Value::Null => {},
    Value::String(s) => {
      if let Some(p) = prefix {
        out.insert(p.to_string(), s.clone());
      }
    },
    other => {
      if let Some(p) = prefix {
        out.insert(p.to_string(), other.to_string());
      }
    },
  }
}

impl ConfigurationSource for JsonConfiguration {
  fn get_value(&self, key: &str) -> Option<String> {
    let values = self.values.read().unwrap_or_else(|p| p.into_inner());
    values.get(&self.full_key(key)).cloned()
  }

  fn keys(&self) -> Vec<String> {
    let values = self.values.read().unwrap_or_else(|p| p.into_inner());
    match &self.section {
      Some(section) => {
        let prefix = format!("{}:", section);
        values
          .keys()
          .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
          .collect()
      },
      None => values.keys().cloned().collect(),
    }
  }

  fn on_change(&self, callback: ChangeCallback) {
    self.notifier.subscribe(callback);
  }
}
