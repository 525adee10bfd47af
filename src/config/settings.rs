//! Settings stores.
//!
//! A settings store answers lookups by full setting name (for example
//! `CSP_REPORTS_LOG_LEVEL`). Stores are consulted on every option access,
//! so a store whose contents change at runtime reconfigures the pipeline
//! without a restart.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use figment::providers::{Env, Format, Json};
use figment::Figment;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::config::options::SETTINGS_PREFIX;
use crate::error::{Error, Result};

/// Source of setting overrides.
pub trait SettingsStore: Send + Sync {
    /// The value stored under `name`, or `None` when the setting is absent.
    fn lookup(&self, name: &str) -> Option<Value>;
}

impl<S: SettingsStore + ?Sized> SettingsStore for Arc<S> {
    fn lookup(&self, name: &str) -> Option<Value> {
        (**self).lookup(name)
    }
}

/// In-memory settings, mutable at runtime.
#[derive(Debug, Default)]
pub struct MapSettings {
    values: RwLock<HashMap<String, Value>>,
}

impl MapSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a JSON object document.
    pub fn from_json_str(document: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(document)? {
            Value::Object(map) => Ok(Self {
                values: RwLock::new(map.into_iter().collect()),
            }),
            _ => Err(Error::SettingsNotAnObject),
        }
    }

    /// Builder-style `set`.
    pub fn with(self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) {
        self.values.write().insert(name.to_string(), value.into());
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.values.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl SettingsStore for MapSettings {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.values.read().get(name).cloned()
    }
}

/// Settings from an optional JSON file overlaid with `CSP_REPORTS_*`
/// environment variables.
///
/// Keys are option names without the prefix, lower-cased: a file holds
/// `{"log_level": "info"}` and the environment `CSP_REPORTS_LOG_LEVEL=info`.
/// Sources are read when the store is built and again on [`reload`].
///
/// [`reload`]: FigmentSettings::reload
pub struct FigmentSettings {
    file: Option<PathBuf>,
    figment: RwLock<Figment>,
}

impl FigmentSettings {
    /// Environment variables only.
    pub fn from_env() -> Result<Self> {
        Self::build(None)
    }

    /// A JSON settings file with environment variables taking precedence.
    /// A missing file contributes nothing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(Some(path.as_ref().to_path_buf()))
    }

    fn build(file: Option<PathBuf>) -> Result<Self> {
        let figment = Self::figment(file.as_deref())?;
        Ok(Self {
            file,
            figment: RwLock::new(figment),
        })
    }

    fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::new();
        if let Some(path) = file {
            figment = figment.merge(Json::file(path));
        }
        figment = figment.merge(Env::prefixed(SETTINGS_PREFIX));

        // Malformed sources fail here instead of reading as absent settings.
        let keys = figment.extract::<Map<String, Value>>()?.len();
        log::info!(
            "SETTINGS_LOADED file={:?} keys={}",
            file.map(|p| p.display().to_string()),
            keys
        );
        Ok(figment)
    }

    /// Re-read the file and the environment. On error the previous
    /// settings stay in effect.
    pub fn reload(&self) -> Result<()> {
        let figment = Self::figment(self.file.as_deref())?;
        *self.figment.write() = figment;
        Ok(())
    }
}

impl fmt::Debug for FigmentSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FigmentSettings")
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

impl SettingsStore for FigmentSettings {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.figment
            .read()
            .extract_inner::<Value>(&figment_key(name))
            .ok()
    }
}

/// `CSP_REPORTS_LOG_LEVEL` -> `log_level`.
fn figment_key(name: &str) -> String {
    name.strip_prefix(SETTINGS_PREFIX)
        .unwrap_or(name)
        .to_ascii_lowercase()
}
