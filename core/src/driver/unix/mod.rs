//! Unix family driver
//!
//! One driver serves every Unix flavor; a [`Dialect`] table carries the
//! differences in `find` capabilities, `ls` output and mount listing.

mod command;
mod ls;

pub use command::{build_find_command, DepthFilter};
pub use ls::{parse_ls_line, parse_mounts, DateStyle, MountFormat};

use super::{CompiledQuery, Flavor, FlavorDriver, Shell};
use crate::error::{ParseError, Result};
use crate::io::{Metadata, Mount};
use crate::search::Query;
use chrono::Utc;
use tracing::debug;

/// Per-flavor facts about the Unix toolset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub flavor: Flavor,
    /// `find` understands `-maxdepth`
    pub native_depth: bool,
    /// Stat-equivalent command, invoked with a single path argument
    pub stat: &'static str,
    pub date_style: DateStyle,
    pub mount_command: &'static str,
    pub mount_format: MountFormat,
}

impl Dialect {
    pub const AIX: Dialect = Dialect {
        flavor: Flavor::Aix,
        native_depth: false,
        stat: "ls -dn",
        date_style: DateStyle::Abbreviated,
        mount_command: "mount",
        mount_format: MountFormat::AixMount,
    };

    pub const SOLARIS: Dialect = Dialect {
        flavor: Flavor::Solaris,
        native_depth: false,
        stat: "ls -dn",
        date_style: DateStyle::Abbreviated,
        mount_command: "cat /etc/mnttab",
        mount_format: MountFormat::Mnttab,
    };

    pub const LINUX: Dialect = Dialect {
        flavor: Flavor::Linux,
        native_depth: true,
        stat: "ls -dn --full-time",
        date_style: DateStyle::FullIso,
        mount_command: "cat /proc/mounts",
        mount_format: MountFormat::ProcMounts,
    };

    pub const MACOS: Dialect = Dialect {
        flavor: Flavor::MacOs,
        native_depth: true,
        stat: "ls -dnT",
        date_style: DateStyle::Seconds,
        mount_command: "mount",
        mount_format: MountFormat::BsdMount,
    };
}

/// Driver for `find`/`ls` based Unix flavors
#[derive(Debug, Clone)]
pub struct UnixDriver {
    dialect: Dialect,
}

impl UnixDriver {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }
}

impl FlavorDriver for UnixDriver {
    fn flavor(&self) -> Flavor {
        self.dialect.flavor
    }

    fn shell(&self) -> Shell {
        Shell::Posix
    }

    fn delimiter(&self) -> char {
        '/'
    }

    fn compile_query(&self, query: &Query) -> Result<CompiledQuery> {
        let command = build_find_command(&self.dialect, query)?;
        debug!(flavor = %self.dialect.flavor, command = %command, "compiled find command");
        Ok(CompiledQuery::new(command, false))
    }

    fn parse_record(
        &self,
        lines: &mut dyn Iterator<Item = String>,
    ) -> Option<std::result::Result<Metadata, ParseError>> {
        while let Some(line) = lines.next() {
            if !line.trim().is_empty() {
                return Some(parse_ls_line(&line, self.dialect.date_style, Utc::now()));
            }
        }
        None
    }

    fn stat_command(&self, path: &str) -> String {
        format!("{} {}", self.dialect.stat, super::shell_quote(path))
    }

    fn mount_command(&self) -> String {
        self.dialect.mount_command.to_string()
    }

    fn parse_mounts(&self, output: &str) -> Vec<Mount> {
        parse_mounts(self.dialect.mount_format, output)
    }
}
