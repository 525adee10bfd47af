//! Named configuration options with built-in defaults.
//!
//! `Config` never snapshots its store: every accessor performs a fresh
//! lookup of `CSP_REPORTS_<OPTION>` and falls back to the default table.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::config::settings::{MapSettings, SettingsStore};
use crate::report::convert::{value_to_bool, value_to_string_list};

/// Prefix of every setting name.
pub const SETTINGS_PREFIX: &str = "CSP_REPORTS_";

/// Options recognized by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigOption {
    EmailAdmins,
    Log,
    LogLevel,
    Save,
    AdditionalHandlers,
    IgnoreBrowserExtensions,
    LoggerName,
    IsolateSinkFailures,
}

impl ConfigOption {
    pub const ALL: [ConfigOption; 8] = [
        ConfigOption::EmailAdmins,
        ConfigOption::Log,
        ConfigOption::LogLevel,
        ConfigOption::Save,
        ConfigOption::AdditionalHandlers,
        ConfigOption::IgnoreBrowserExtensions,
        ConfigOption::LoggerName,
        ConfigOption::IsolateSinkFailures,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ConfigOption::EmailAdmins => "EMAIL_ADMINS",
            ConfigOption::Log => "LOG",
            ConfigOption::LogLevel => "LOG_LEVEL",
            ConfigOption::Save => "SAVE",
            ConfigOption::AdditionalHandlers => "ADDITIONAL_HANDLERS",
            ConfigOption::IgnoreBrowserExtensions => "IGNORE_BROWSER_EXTENSIONS",
            ConfigOption::LoggerName => "LOGGER_NAME",
            ConfigOption::IsolateSinkFailures => "ISOLATE_SINK_FAILURES",
        }
    }

    /// Full name under which the option is looked up in a settings store.
    pub fn setting_name(&self) -> String {
        format!("{}{}", SETTINGS_PREFIX, self.name())
    }

    pub fn default_value(&self) -> Value {
        match self {
            ConfigOption::EmailAdmins => Value::Bool(true),
            ConfigOption::Log => Value::Bool(true),
            ConfigOption::LogLevel => Value::from("warning"),
            ConfigOption::Save => Value::Bool(true),
            ConfigOption::AdditionalHandlers => Value::Array(Vec::new()),
            ConfigOption::IgnoreBrowserExtensions => Value::Bool(false),
            ConfigOption::LoggerName => Value::from("CSP Reports"),
            ConfigOption::IsolateSinkFailures => Value::Bool(false),
        }
    }
}

impl fmt::Display for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Live view over a settings store.
#[derive(Clone)]
pub struct Config {
    store: Arc<dyn SettingsStore>,
}

impl Config {
    pub fn new(store: impl SettingsStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// A config with no overrides: every option has its default.
    pub fn defaults() -> Self {
        Self::new(MapSettings::new())
    }

    /// The override for `option`, or its default.
    pub fn get(&self, option: ConfigOption) -> Value {
        self.store
            .lookup(&option.setting_name())
            .unwrap_or_else(|| option.default_value())
    }

    /// Whether the store overrides `option`.
    pub fn is_overridden(&self, option: ConfigOption) -> bool {
        self.store.lookup(&option.setting_name()).is_some()
    }

    pub fn email_admins(&self) -> bool {
        self.get_bool(ConfigOption::EmailAdmins)
    }

    pub fn log(&self) -> bool {
        self.get_bool(ConfigOption::Log)
    }

    /// Raw level name; interpreted by the log sink.
    pub fn log_level(&self) -> String {
        self.get_string(ConfigOption::LogLevel)
    }

    pub fn save(&self) -> bool {
        self.get_bool(ConfigOption::Save)
    }

    /// Dotted handler names, in configuration order.
    pub fn additional_handlers(&self) -> Vec<String> {
        let value = self.get(ConfigOption::AdditionalHandlers);
        value_to_string_list(&value).unwrap_or_else(|| {
            warn_fallback(ConfigOption::AdditionalHandlers, &value);
            Vec::new()
        })
    }

    pub fn ignore_browser_extensions(&self) -> bool {
        self.get_bool(ConfigOption::IgnoreBrowserExtensions)
    }

    pub fn logger_name(&self) -> String {
        self.get_string(ConfigOption::LoggerName)
    }

    pub fn isolate_sink_failures(&self) -> bool {
        self.get_bool(ConfigOption::IsolateSinkFailures)
    }

    fn get_bool(&self, option: ConfigOption) -> bool {
        let value = self.get(option);
        value_to_bool(&value).unwrap_or_else(|| {
            warn_fallback(option, &value);
            value_to_bool(&option.default_value()).unwrap_or(false)
        })
    }

    fn get_string(&self, option: ConfigOption) -> String {
        match self.get(option) {
            Value::String(s) => s,
            other => {
                warn_fallback(option, &other);
                option
                    .default_value()
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_default()
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for option in ConfigOption::ALL {
            map.entry(&option.name(), &self.get(option));
        }
        map.finish()
    }
}

fn warn_fallback(option: ConfigOption, value: &Value) {
    log::warn!(
        "CONFIG_VALUE_IGNORED setting={} value={} reason=wrong_type using=default",
        option.setting_name(),
        value
    );
}
