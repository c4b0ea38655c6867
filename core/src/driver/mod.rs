//! Flavor drivers: compile queries to native commands, parse their output

pub mod shell;
pub mod unix;
pub mod windows;

pub use shell::{shell_quote, Shell};
pub use unix::{Dialect, UnixDriver};
pub use windows::WindowsDriver;

use crate::error::{ParseError, Result};
use crate::io::{Metadata, Mount};
use crate::search::{Condition, Query};
use std::fmt;
use std::sync::Arc;

/// A platform dialect requiring its own compilation rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    Aix,
    Solaris,
    Linux,
    MacOs,
    Windows,
}

impl Flavor {
    /// Map `uname -s` output to a Unix flavor
    pub fn from_uname(uname: &str) -> Option<Self> {
        match uname.trim() {
            "AIX" => Some(Flavor::Aix),
            "SunOS" => Some(Flavor::Solaris),
            "Linux" => Some(Flavor::Linux),
            "Darwin" => Some(Flavor::MacOs),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Flavor::Aix => "aix",
            Flavor::Solaris => "solaris",
            Flavor::Linux => "linux",
            Flavor::MacOs => "macos",
            Flavor::Windows => "windows",
        }
    }

    /// Settings scopes for this flavor, most specific first
    pub fn config_chain(&self) -> Vec<&'static str> {
        match self {
            Flavor::Windows => vec!["windows"],
            other => vec![other.as_str(), "unix"],
        }
    }

    pub fn is_unix(&self) -> bool {
        !matches!(self, Flavor::Windows)
    }

    /// The driver for this flavor; chosen once per session
    pub fn driver(&self) -> Arc<dyn FlavorDriver> {
        match self {
            Flavor::Aix => Arc::new(UnixDriver::new(Dialect::AIX)),
            Flavor::Solaris => Arc::new(UnixDriver::new(Dialect::SOLARIS)),
            Flavor::Linux => Arc::new(UnixDriver::new(Dialect::LINUX)),
            Flavor::MacOs => Arc::new(UnixDriver::new(Dialect::MACOS)),
            Flavor::Windows => Arc::new(WindowsDriver::new()),
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform-native command text plus its cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompiledQuery {
    pub command: String,
    pub cache_key: String,
}

impl CompiledQuery {
    /// Wrap a command, folding the key when the shell ignores case
    pub fn new(command: String, fold_case: bool) -> Self {
        let cache_key = if fold_case {
            command.to_uppercase()
        } else {
            command.clone()
        };
        Self { command, cache_key }
    }
}

/// Translator between queries and one flavor's command language
pub trait FlavorDriver: Send + Sync {
    /// Get the flavor this driver speaks
    fn flavor(&self) -> Flavor;

    /// Get the shell family of the compiled commands
    fn shell(&self) -> Shell;

    /// Path delimiter of the flavor's filesystem
    fn delimiter(&self) -> char;

    /// Compile an extracted query into a command
    fn compile_query(&self, query: &Query) -> Result<CompiledQuery>;

    /// Compile a condition list; order does not affect the result
    fn compile(&self, conditions: &[Condition]) -> Result<CompiledQuery> {
        let query = Query::from_conditions(conditions)?;
        self.compile_query(&query)
    }

    /// Consume lines for one record; `None` at end of stream
    fn parse_record(
        &self,
        lines: &mut dyn Iterator<Item = String>,
    ) -> Option<std::result::Result<Metadata, ParseError>>;

    /// Helper module as (name, source) that compiled commands call into
    fn helper_module(&self) -> Option<(&'static str, &'static str)> {
        None
    }

    /// Command printing one record for `path`
    fn stat_command(&self, path: &str) -> String;

    /// Command listing the mount table
    fn mount_command(&self) -> String;

    /// Parse the mount command's output
    fn parse_mounts(&self, output: &str) -> Vec<Mount>;

    /// Whether a search rooted at `from` can find anything on `fs_type`
    fn admits_fs_type(&self, mounts: &[Mount], from: &str, fs_type: &str) -> bool {
        let delimiter = self.delimiter();
        mounts.iter().filter(|m| m.fs_type == fs_type).any(|m| {
            crate::io::is_within(&m.path, from, delimiter, false)
                || crate::io::is_within(from, &m.path, delimiter, false)
        })
    }
}
