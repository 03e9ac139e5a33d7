//! # Settings
//!
//! Immutable configuration snapshots and the resolver that produces them.
//!
//! A [`Settings`] value is never mutated after it is published. Reloading
//! builds a complete new snapshot and swaps it into the [`SettingsHolder`],
//! so a log call that loaded the old snapshot finishes with the old one and
//! every later call sees only the new one.
//!
//! ## Sources
//!
//! ```rust
//! use std::sync::Arc;
//! use ttlog_console::config_source::MemoryConfiguration;
//! use ttlog_console::settings::{Settings, SettingsResolver, SettingsSource};
//!
//! let source = Arc::new(MemoryConfiguration::from_pairs([
//!   ("UseColors", "false"),
//!   ("LogLevel:Default", "Warning"),
//! ]));
//! let settings = SettingsResolver::try_resolve(&SettingsSource::Dynamic(source)).unwrap();
//! assert!(!settings.use_colors);
//! ```


use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use arc_swap::{ArcSwap, Guard};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config_source::ConfigurationSource;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::ConfigurationError;
use crate::event::LogLevel;

/// `yyyy-MM-dd HH:mm:ss.fff`
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const LOG_LEVEL_SECTION: &str = "LogLevel";
const DEFAULT_PREFIX_KEY: &str = "Default";

/// Zone timestamps are rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeZoneSetting {
  /// The host's local zone.
  #[default]
  Local,
  Utc,
  /// An IANA zone such as `Europe/Berlin`.
  Named(Tz),
}

impl TimeZoneSetting {
  pub fn parse(value: &str) -> Option<Self> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("local") {
      Some(TimeZoneSetting::Local)
    } else if value.eq_ignore_ascii_case("utc") || value.eq_ignore_ascii_case("z") {
      Some(TimeZoneSetting::Utc)
    } else {
      value.parse::<Tz>().ok().map(TimeZoneSetting::Named)
    }
  }

  /// Renders `timestamp` in this zone using pre-parsed strftime `items`.
  pub(crate) fn write_timestamp<'a, I>(
    &self,
    out: &mut String,
    timestamp: &DateTime<Utc>,
    items: I,
  ) -> fmt::Result
  where
    I: Iterator<Item = Item<'a>> + Clone,
  {
    use std::fmt::Write;
    match self {
      TimeZoneSetting::Local => write!(
        out,
        "{}",
        timestamp.with_timezone(&Local).format_with_items(items)
      ),
      TimeZoneSetting::Utc => write!(out, "{}", timestamp.format_with_items(items)),
      TimeZoneSetting::Named(tz) => {
        write!(out, "{}", timestamp.with_timezone(tz).format_with_items(items))
      },
    }
  }
}

impl TryFrom<String> for TimeZoneSetting {
  type Error = ConfigurationError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::parse(&value).ok_or(ConfigurationError::InvalidTimeZone {
      key: "TimeZone".to_string(),
      value,
    })
  }
}

impl From<TimeZoneSetting> for String {
  fn from(tz: TimeZoneSetting) -> String {
    match tz {
      TimeZoneSetting::Local => "Local".to_string(),
      TimeZoneSetting::Utc => "UTC".to_string(),
      TimeZoneSetting::Named(tz) => tz.name().to_string(),
    }
  }
}

/// Effective console configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// Emit ANSI color codes.
  pub use_colors: bool,
  /// chrono strftime pattern, [`DEFAULT_TIMESTAMP_FORMAT`] when unset.
  pub timestamp_format: Option<String>,
  pub time_zone: TimeZoneSetting,
  /// Minimum level per category prefix. The longest matching prefix wins;
  /// the empty prefix applies to every category. `Default` is stored as the
  /// empty prefix.
  #[serde(deserialize_with = "deserialize_thresholds")]
  pub level_thresholds: BTreeMap<String, LogLevel>,
  /// Render the scope chain between category and message.
  pub include_scopes: bool,
  /// Render `[event_id]` after the category.
  pub include_event_id: bool,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      use_colors: true,
      timestamp_format: None,
      time_zone: TimeZoneSetting::Local,
      level_thresholds: BTreeMap::new(),
      include_scopes: true,
      include_event_id: false,
    }
  }
}

impl Settings {
  pub fn with_colors(mut self, use_colors: bool) -> Self {
    self.use_colors = use_colors;
    self
  }

  pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
    self.timestamp_format = Some(format.into());
    self
  }

  pub fn with_time_zone(mut self, time_zone: TimeZoneSetting) -> Self {
    self.time_zone = time_zone;
    self
  }

  /// Sets the threshold for a category prefix; `Default` means every category.
  pub fn with_threshold(mut self, prefix: impl Into<String>, level: LogLevel) -> Self {
    self
      .level_thresholds
      .insert(normalize_prefix(prefix.into()), level);
    self
  }

  pub fn with_scopes(mut self, include_scopes: bool) -> Self {
    self.include_scopes = include_scopes;
    self
  }

  pub fn with_event_id(mut self, include_event_id: bool) -> Self {
    self.include_event_id = include_event_id;
    self
  }

  pub fn timestamp_format(&self) -> &str {
    self
      .timestamp_format
      .as_deref()
      .unwrap_or(DEFAULT_TIMESTAMP_FORMAT)
  }

  /// Threshold of the longest prefix of `category` that has one.
  pub fn threshold_for(&self, category: &str) -> Option<LogLevel> {
    self
      .level_thresholds
      .iter()
      .filter(|(prefix, _)| category.starts_with(prefix.as_str()))
      .max_by_key(|(prefix, _)| prefix.len())
      .map(|(_, level)| *level)
  }

  /// Whether an event of `level` in `category` gets written.
  pub fn is_enabled(&self, category: &str, level: LogLevel) -> bool {
    if level == LogLevel::None {
      return false;
    }
    match self.threshold_for(category) {
      Some(threshold) => level >= threshold,
      None => true,
    }
  }

  /// Checks the values a caller could have set by hand.
  pub fn validate(&self) -> Result<(), ConfigurationError> {
    if let Some(format) = &self.timestamp_format {
      validate_timestamp_format(format)?;
    }
    Ok(())
  }
}

/// Maps the `Default` key to the empty prefix.
fn normalize_prefix(prefix: String) -> String {
  if prefix.eq_ignore_ascii_case(DEFAULT_PREFIX_KEY) {
    String::new()
  } else {
    prefix
  }
}

fn normalize_thresholds(thresholds: &BTreeMap<String, LogLevel>) -> BTreeMap<String, LogLevel> {
  thresholds
    .iter()
    .map(|(prefix, level)| (normalize_prefix(prefix.clone()), *level))
    .collect()
}

fn deserialize_thresholds<'de, D>(deserializer: D) -> Result<BTreeMap<String, LogLevel>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = BTreeMap::<String, LogLevel>::deserialize(deserializer)?;
  Ok(normalize_thresholds(&raw))
}

fn validate_timestamp_format(format: &str) -> Result<(), ConfigurationError> {
  if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
    return Err(ConfigurationError::InvalidTimestampFormat {
      format: format.to_string(),
    });
  }
  Ok(())
}

/// Where a provider gets its settings from.
#[derive(Clone, Default)]
pub enum SettingsSource {
  /// [`Settings::default()`]
  #[default]
  Default,
  Explicit(Settings),
  /// Resolved from the source and re-resolved whenever it reports a change.
  Dynamic(Arc<dyn ConfigurationSource>),
}

impl fmt::Debug for SettingsSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SettingsSource::Default => f.write_str("Default"),
      SettingsSource::Explicit(s) => f.debug_tuple("Explicit").field(s).finish(),
      SettingsSource::Dynamic(_) => f.write_str("Dynamic(..)"),
    }
  }
}

impl From<Settings> for SettingsSource {
  fn from(settings: Settings) -> Self {
    SettingsSource::Explicit(settings)
  }
}

/// Turns a [`SettingsSource`] into a [`Settings`] snapshot.
pub struct SettingsResolver;

impl SettingsResolver {
  /// Resolves `source`, failing on the first malformed value.
  pub fn try_resolve(source: &SettingsSource) -> Result<Settings, ConfigurationError> {
    match source {
      SettingsSource::Default => Ok(Settings::default()),
      SettingsSource::Explicit(settings) => {
        settings.validate()?;
        let mut settings = settings.clone();
        settings.level_thresholds = normalize_thresholds(&settings.level_thresholds);
        Ok(settings)
      },
      SettingsSource::Dynamic(config) => Self::from_configuration(config.as_ref()),
    }
  }

  /// Resolves `source`; on failure reports to `diagnostics` and returns the
  /// defaults.
  pub fn resolve(source: &SettingsSource, diagnostics: &dyn Diagnostics) -> Settings {
    match Self::try_resolve(source) {
      Ok(settings) => settings,
      Err(e) => {
        diagnostics.report(Diagnostic::Configuration(e));
        Settings::default()
      },
    }
  }

  /// Re-resolves a dynamic `source` into `holder` after every change.
  ///
  /// Only weak references are kept, so the subscription does not keep the
  /// holder or the source alive. Other sources never change and are ignored.
  ///
  /// Concurrent notifications re-resolve one at a time, so the snapshot
  /// stored last was also read last.
  pub fn subscribe(
    source: &SettingsSource,
    holder: &Arc<SettingsHolder>,
    diagnostics: Arc<dyn Diagnostics>,
  ) {
    let SettingsSource::Dynamic(config) = source else {
      return;
    };
    let weak_config: Weak<dyn ConfigurationSource> = Arc::downgrade(config);
    let weak_holder = Arc::downgrade(holder);
    let reloading = Mutex::new(());

    config.on_change(Arc::new(move || {
      let (Some(config), Some(holder)) = (weak_config.upgrade(), weak_holder.upgrade()) else {
        return;
      };
      let _reload = reloading.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
      let settings = Self::resolve(&SettingsSource::Dynamic(config), diagnostics.as_ref());
      holder.store(settings);
    }));
  }

  fn from_configuration(config: &dyn ConfigurationSource) -> Result<Settings, ConfigurationError> {
    let keys = config.keys();
    let lookup = |name: &str| -> Option<(String, String)> {
      if let Some(value) = config.get_value(name) {
        return Some((name.to_string(), value));
      }
      let key = keys.iter().find(|k| k.eq_ignore_ascii_case(name))?;
      config.get_value(key).map(|v| (key.clone(), v))
    };

    let mut settings = Settings::default();

    if let Some((key, value)) = lookup("UseColors") {
      settings.use_colors = parse_bool(&key, &value)?;
    }
    if let Some((key, value)) = lookup("IncludeScopes") {
      settings.include_scopes = parse_bool(&key, &value)?;
    }
    if let Some((key, value)) = lookup("IncludeEventId") {
      settings.include_event_id = parse_bool(&key, &value)?;
    }
    if let Some((key, value)) = lookup("TimeZone") {
      settings.time_zone = TimeZoneSetting::parse(&value)
        .ok_or(ConfigurationError::InvalidTimeZone { key, value })?;
    }
    if let Some((_, value)) = lookup("TimestampFormat") {
      let value = value.trim();
      if !value.is_empty() {
        validate_timestamp_format(value)?;
        settings.timestamp_format = Some(value.to_string());
      }
    }

    for key in &keys {
      let Some(prefix) = threshold_prefix(key) else {
        continue;
      };
      let Some(value) = config.get_value(key) else {
        continue;
      };
      settings
        .level_thresholds
        .insert(prefix, parse_level(key, &value)?);
    }

    Ok(settings)
  }
}

/// Category prefix named by a `LogLevel:<prefix>` key.
fn threshold_prefix(key: &str) -> Option<String> {
  let (section, prefix) = key.split_once(':')?;
  if !section.eq_ignore_ascii_case(LOG_LEVEL_SECTION) {
    return None;
  }
  Some(normalize_prefix(prefix.to_string()))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigurationError> {
  match value.trim().to_ascii_lowercase().as_str() {
    "true" | "1" | "yes" | "on" => Ok(true),
    "false" | "0" | "no" | "off" => Ok(false),
    _ => Err(ConfigurationError::InvalidBool {
      key: key.to_string(),
      value: value.to_string(),
    }),
  }
}

fn parse_level(key: &str, value: &str) -> Result<LogLevel, ConfigurationError> {
  let trimmed = value.trim();
  if let Ok(index) = trimmed.parse::<i64>() {
    if index < 0 {
      return Err(ConfigurationError::NegativeLevel {
        key: key.to_string(),
        value: index,
      });
    }
    return LogLevel::from_index(index).ok_or_else(|| ConfigurationError::InvalidLevel {
      key: key.to_string(),
      value: value.to_string(),
    });
  }
  LogLevel::from_name(trimmed).ok_or_else(|| ConfigurationError::InvalidLevel {
    key: key.to_string(),
    value: value.to_string(),
  })
}

/// Shared, atomically replaceable settings snapshot.
///
/// Reads are lock-free; a store replaces the whole snapshot at once.
#[derive(Debug)]
pub struct SettingsHolder {
  current: ArcSwap<Settings>,
}

impl SettingsHolder {
  pub fn new(settings: Settings) -> Self {
    Self {
      current: ArcSwap::from_pointee(settings),
    }
  }

  /// Cheap guard to the current snapshot, for the hot path.
  pub fn load(&self) -> Guard<Arc<Settings>> {
    self.current.load()
  }

  /// Owned handle to the current snapshot.
  pub fn snapshot(&self) -> Arc<Settings> {
    self.current.load_full()
  }

  pub fn store(&self, settings: Settings) {
    self.current.store(Arc::new(settings));
  }
}
