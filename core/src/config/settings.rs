//! Settings loading and scope resolution
//!
//! Sources, lowest precedence first:
//! 1. the embedded `defaults.ini`
//! 2. overlay INI files, in the order they were added
//! 3. `HOSTLENS_*` environment variables (`HOSTLENS_AIX__READ_TIMEOUT_XL`
//!    targets the `aix` scope)
//!
//! Within the merged result, a scope chain such as `["aix", "unix"]` is
//! walked first to last and the first scope defining a key wins over the
//! top-level value.

use crate::error::Result;
use config::{Config, Environment, File, FileFormat, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "HOSTLENS";

const DEFAULTS: &str = include_str!("defaults.ini");

/// A resolved, flat key-value snapshot for one flavor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    /// Resolve the embedded defaults only
    pub fn embedded(chain: &[&str]) -> Result<Self> {
        SettingsLoader::new().without_environment().load(chain)
    }

    /// Build a snapshot from explicit pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Get a numeric value; unparseable values are logged and ignored
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        let raw = self.get_str(key)?;
        match raw.trim().parse::<u64>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(key, value = raw, "ignoring non-numeric setting");
                None
            }
        }
    }

    /// Get a millisecond value as a duration
    pub fn get_duration_ms(&self, key: &str) -> Option<Duration> {
        self.get_u64(key).map(Duration::from_millis)
    }

    /// Local directory for relayed copies, with `~` expanded
    pub fn workspace(&self) -> Option<PathBuf> {
        self.get_str("workspace")
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| PathBuf::from(shellexpand::tilde(raw.trim()).into_owned()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Builder for the layered settings sources
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    overlays: Vec<(PathBuf, bool)>,
    inline: Vec<String>,
    use_environment: bool,
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self {
            overlays: Vec::new(),
            inline: Vec::new(),
            use_environment: true,
        }
    }

    /// Default per-user overlay: `$XDG_CONFIG_HOME/hostlens/session.ini`
    pub fn default_overlay_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hostlens").join("session.ini"))
    }

    /// Add a required overlay file
    pub fn with_overlay<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.overlays.push((path.as_ref().to_path_buf(), true));
        self
    }

    /// Add the per-user overlay if it exists
    pub fn with_default_overlay(mut self) -> Self {
        if let Some(path) = Self::default_overlay_path() {
            self.overlays.push((path, false));
        }
        self
    }

    /// Add an overlay from INI text
    pub fn with_overlay_str<S: Into<String>>(mut self, ini: S) -> Self {
        self.inline.push(ini.into());
        self
    }

    /// Skip `HOSTLENS_*` environment overrides
    pub fn without_environment(mut self) -> Self {
        self.use_environment = false;
        self
    }

    /// Merge all sources and resolve them for a scope chain
    pub fn load(&self, chain: &[&str]) -> Result<Settings> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULTS, FileFormat::Ini));

        for (path, required) in &self.overlays {
            debug!(path = %path.display(), required, "adding settings overlay");
            builder = builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Ini)
                    .required(*required),
            );
        }

        for text in &self.inline {
            builder = builder.add_source(File::from_str(text, FileFormat::Ini));
        }

        if self.use_environment {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        let merged: HashMap<String, Value> = builder.build()?.try_deserialize()?;
        Ok(resolve(merged, chain))
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten merged sources: top-level scalars, then scopes from the
/// least specific to the most specific
fn resolve(merged: HashMap<String, Value>, chain: &[&str]) -> Settings {
    let mut scopes: HashMap<String, HashMap<String, Value>> = HashMap::new();
    let mut values = HashMap::new();

    for (key, value) in merged {
        match value.clone().into_table() {
            Ok(table) => {
                scopes.insert(key, table);
            }
            Err(_) => {
                if let Ok(text) = value.into_string() {
                    values.insert(key, text);
                }
            }
        }
    }

    for scope in chain.iter().rev() {
        let Some(table) = scopes.get(*scope) else {
            continue;
        };
        for (key, value) in table {
            if let Ok(text) = value.clone().into_string() {
                debug!(scope, key = %key, value = %text, "scoped setting");
                values.insert(key.clone(), text);
            }
        }
    }

    Settings { values }
}
