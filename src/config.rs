//! CEL configuration: the typed config object, the `[general]` key=value
//! text format, and the atomically swappable store the engine reads from.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{EventSet, EventType, ALL_EVENTS_NAME};

/// Sections reserved for sibling subsystems; skipped without error.
const SKIPPED_SECTIONS: [&str; 2] = ["manager", "radius"];

/// Operator policy for Channel Event Logging.
///
/// Invariant (checked by [`CelConfig::validate`]): when `apps` is
/// non-empty, at least one of APP_START / APP_END must be in `events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CelConfig {
    /// Whether event reporting is enabled at all
    pub enabled: bool,
    /// strftime-style format for rendering event times; empty means the
    /// numeric `"<sec>.<usec>"` form
    pub date_format: String,
    /// The set of event kinds to report
    pub events: EventSet,
    /// Application names to track for APP_START / APP_END, stored
    /// lower-cased; comparisons are case-insensitive
    pub apps: HashSet<String>,
}

impl Default for CelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            date_format: String::new(),
            events: EventSet::EMPTY,
            apps: HashSet::new(),
        }
    }
}

impl CelConfig {
    /// Create a configuration with the built-in defaults (disabled,
    /// nothing tracked).
    pub fn new() -> CelConfig {
        CelConfig::default()
    }

    /// Parse and validate configuration text in the `[general]`
    /// key=value format.
    ///
    /// Reserved sibling sections are skipped; any other section, unknown
    /// option, or unknown event name rejects the whole load.
    pub fn load(source: &str) -> Result<CelConfig, ConfigError> {
        let config = CelConfig::parse(source)?;
        config.validate()?;
        Ok(config)
    }

    fn parse(source: &str) -> Result<CelConfig, ConfigError> {
        let mut config = CelConfig::default();
        // Section we are currently inside; None before any header
        let mut section: Option<String> = None;

        for (index, raw_line) in source.lines().enumerate() {
            let line_number = index + 1;
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    return Err(ConfigError::Malformed {
                        line: line_number,
                        message: "unterminated section header".to_string(),
                    });
                };
                let name = name.trim();
                if name != "general" && !SKIPPED_SECTIONS.contains(&name) {
                    return Err(ConfigError::UnknownSection(name.to_string()));
                }
                section = Some(name.to_string());
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Malformed {
                    line: line_number,
                    message: "expected key=value".to_string(),
                });
            };
            let key = key.trim();
            let value = value.trim();

            match section.as_deref() {
                Some("general") => config.apply_option(key, value)?,
                Some(_) => {} // reserved sibling section
                None => {
                    return Err(ConfigError::Malformed {
                        line: line_number,
                        message: format!("option '{}' outside any section", key),
                    });
                }
            }
        }

        Ok(config)
    }

    fn apply_option(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "enable" => self.enabled = parse_bool(value),
            "dateformat" => self.date_format = value.to_string(),
            "apps" => self.apps = parse_apps(value),
            "events" => self.events = parse_events(value)?,
            other => return Err(ConfigError::UnknownOption(other.to_string())),
        }
        Ok(())
    }

    /// Check the apps/events invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.apps.is_empty() {
            return Ok(());
        }
        if self.events.contains(EventType::AppStart) || self.events.contains(EventType::AppEnd) {
            return Ok(());
        }
        Err(ConfigError::AppsWithoutAppEvents)
    }

    /// Whether `event_type` is in the tracked set.
    pub fn tracks(&self, event_type: EventType) -> bool {
        self.events.contains(event_type)
    }

    /// Whether `app` is tracked. Comparison is case-insensitive.
    pub fn tracks_app(&self, app: &str) -> bool {
        !app.is_empty() && self.apps.contains(&app.to_lowercase())
    }
}

/// Parse a comma-separated, case-sensitive list of event names.
///
/// The literal `ALL` sets every bit; an unrecognized name is an error.
pub fn parse_events(list: &str) -> Result<EventSet, ConfigError> {
    let mut events = EventSet::EMPTY;

    for raw_name in list.split(',') {
        let name = raw_name.trim();
        if name.is_empty() {
            continue;
        }
        if name == ALL_EVENTS_NAME {
            events = EventSet::ALL;
        } else if let Some(event_type) = EventType::from_name(name) {
            events.insert(event_type);
        } else {
            return Err(ConfigError::UnknownEvent(name.to_string()));
        }
    }

    Ok(events)
}

/// Parse a comma-separated list of application names, lower-casing and
/// trimming each entry.
pub fn parse_apps(list: &str) -> HashSet<String> {
    list.split(',')
        .map(|app| app.trim().to_lowercase())
        .filter(|app| !app.is_empty())
        .collect()
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "yes" | "true" | "on" | "1"
    )
}

fn strip_comment(line: &str) -> &str {
    line.split_once(';').map(|(before, _)| before).unwrap_or(line)
}

/// Holds the engine's current configuration.
///
/// Readers take an `Arc` to the current immutable configuration and keep
/// using it without further synchronization; a reload builds a new
/// configuration and swaps the whole object.
#[derive(Debug)]
pub struct ConfigStore {
    current: RwLock<Arc<CelConfig>>,
}

impl ConfigStore {
    /// Create a store holding `config`.
    pub fn new(config: CelConfig) -> ConfigStore {
        ConfigStore {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Get a reference to the current configuration.
    pub fn current(&self) -> Arc<CelConfig> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Validate `config` and make it current. On error the previous
    /// configuration is retained.
    pub fn swap(&self, config: CelConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(config);
        Ok(())
    }
}
