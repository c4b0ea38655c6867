//! PowerShell driver
//!
//! Searches compile to calls into the helper module in
//! `FileSearcher.psm1`, which the session loads once before searching.

use super::{CompiledQuery, Flavor, FlavorDriver, Shell};
use crate::error::{Error, ParseError, Result};
use crate::io::{Attributes, FileType, Metadata, Mount};
use crate::search::{Branch, Depth, PathFilter, Query, TypeFilter};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// Name the helper module is loaded under
pub const HELPER_MODULE_NAME: &str = "FileSearcher";

/// Source of the helper module
pub const HELPER_MODULE: &str = include_str!("FileSearcher.psm1");

/// Seconds between 1601-01-01 and 1970-01-01
const FILETIME_EPOCH_OFFSET: i64 = 11_644_473_600;

#[derive(Debug, Clone, Default)]
pub struct WindowsDriver;

impl WindowsDriver {
    pub fn new() -> Self {
        Self
    }

    fn quote(&self, text: &str) -> String {
        Shell::PowerShell.quote(text)
    }
}

impl FlavorDriver for WindowsDriver {
    fn flavor(&self) -> Flavor {
        Flavor::Windows
    }

    fn shell(&self) -> Shell {
        Shell::PowerShell
    }

    fn delimiter(&self) -> char {
        '\\'
    }

    fn compile_query(&self, query: &Query) -> Result<CompiledQuery> {
        let unsupported = |what: &str| Error::unsupported(Flavor::Windows.as_str(), what);
        if query.follow_links {
            return Err(unsupported("following links"));
        }
        if query.file_type == TypeFilter::Link {
            return Err(unsupported("link file type"));
        }

        let from = self.quote(&query.normalized_from('\\'));
        let depth = match query.depth {
            Depth::Unlimited => -1,
            Depth::Limited(depth) => i64::from(depth),
        };

        let mut cmd = match (query.branch(), query.file_type) {
            (Branch::Path(filter), TypeFilter::Directory) => format!(
                "Find-Directories -Path {} -Pattern {}",
                from,
                self.quote(&path_pattern(filter))
            ),
            (Branch::Path(filter), _) => format!(
                "Find-Files -Path {} -Pattern {}",
                from,
                self.quote(&path_pattern(filter))
            ),
            (Branch::Dirname(filter), TypeFilter::Directory) => format!(
                "Find-Directories -Path {} -Pattern {}",
                from,
                self.quote(&filter.pattern_source())
            ),
            (Branch::Dirname(filter), _) => {
                // The trailing -Depth binds to Find-Files, once per piped directory
                let mut cmd = format!(
                    "Find-Directories -Path {} -Pattern {} -Depth -1 | Find-Files",
                    from,
                    self.quote(&filter.pattern_source())
                );
                push_basename(self, &mut cmd, query);
                cmd
            }
            (Branch::Basename(_), TypeFilter::Directory) => {
                format!("Find-Directories -Path {}", from)
            }
            (Branch::Basename(_), _) => {
                let mut cmd = format!("Find-Files -Path {}", from);
                push_basename(self, &mut cmd, query);
                cmd
            }
        };

        cmd.push_str(&format!(" -Depth {} | Print-FileInfo", depth));
        debug!(command = %cmd, "compiled helper call");
        Ok(CompiledQuery::new(cmd, true))
    }

    fn parse_record(
        &self,
        lines: &mut dyn Iterator<Item = String>,
    ) -> Option<std::result::Result<Metadata, ParseError>> {
        loop {
            let line = lines.next()?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line != "{" {
                return Some(Err(ParseError::Malformed {
                    line: line.to_string(),
                    reason: "expected '{'".to_string(),
                }));
            }
            return Some(parse_block(lines));
        }
    }

    fn helper_module(&self) -> Option<(&'static str, &'static str)> {
        Some((HELPER_MODULE_NAME, HELPER_MODULE))
    }

    fn stat_command(&self, path: &str) -> String {
        format!(
            "Get-Item -LiteralPath {} -Force | Print-FileInfo",
            self.quote(path)
        )
    }

    fn mount_command(&self) -> String {
        r#"Get-WmiObject -Class Win32_LogicalDisk | ForEach-Object { "{0}\ {1}" -f $_.DeviceID, $_.DriveType }"#
            .to_string()
    }

    fn parse_mounts(&self, output: &str) -> Vec<Mount> {
        output
            .lines()
            .filter_map(|line| {
                let (path, kind) = line.trim().rsplit_once(' ')?;
                let fs_type = match kind.trim() {
                    "2" => "removable",
                    "3" => "fixed",
                    "4" => "remote",
                    "5" => "cdrom",
                    "6" => "ramdisk",
                    _ => "unknown",
                };
                Some(Mount::new(path.trim(), fs_type))
            })
            .collect()
    }

    fn admits_fs_type(&self, mounts: &[Mount], from: &str, fs_type: &str) -> bool {
        let from = from.to_uppercase();
        mounts.iter().any(|mount| {
            mount.fs_type.eq_ignore_ascii_case(fs_type)
                && from.starts_with(&mount.path.to_uppercase())
        })
    }
}

fn path_pattern(filter: &PathFilter) -> String {
    match filter {
        PathFilter::Literal(path) => format!("^{}$", regex::escape(path)),
        PathFilter::Pattern(pattern) => pattern.as_str().to_string(),
    }
}

fn push_basename(driver: &WindowsDriver, cmd: &mut String, query: &Query) {
    let basename = &query.basename;
    if let Some(name) = &basename.equals {
        cmd.push_str(" -LiteralFilename ");
        cmd.push_str(&driver.quote(name));
    }
    let filename = match (&basename.not_equals, &basename.pattern) {
        (Some(anti), Some(pattern)) => Some(format!(
            "(?!^{}$){}",
            regex::escape(anti),
            pattern.as_str()
        )),
        (Some(anti), None) => Some(format!("(?!^{}$)(^.*$)", regex::escape(anti))),
        (None, Some(pattern)) => Some(pattern.as_str().to_string()),
        (None, None) => None,
    };
    if let Some(filename) = filename {
        cmd.push_str(" -Filename ");
        cmd.push_str(&driver.quote(&filename));
    }
}

fn parse_block(
    lines: &mut dyn Iterator<Item = String>,
) -> std::result::Result<Metadata, ParseError> {
    let mut fields = BTreeMap::new();
    loop {
        let Some(line) = lines.next() else {
            return Err(ParseError::Truncated {
                reason: "end of stream inside a record".to_string(),
            });
        };
        let line = line.trim();
        if line == "}" {
            break;
        }
        if line.is_empty() {
            continue;
        }
        match line.split_once(':') {
            Some((key, value)) => {
                fields.insert(key.trim().to_string(), value.trim().to_string());
            }
            None => {
                return Err(ParseError::Malformed {
                    line: line.to_string(),
                    reason: "expected 'Key: value'".to_string(),
                })
            }
        }
    }
    record_from_fields(fields)
}

fn record_from_fields(
    mut fields: BTreeMap<String, String>,
) -> std::result::Result<Metadata, ParseError> {
    let malformed = |line: &str, reason: &str| ParseError::Malformed {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let encoded = fields
        .remove("Path")
        .ok_or_else(|| malformed("", "record without a path"))?;
    let path = decode(&encoded).ok_or_else(|| malformed(&encoded, "path is not base64 text"))?;

    let link_target = match fields.remove("LinkTarget") {
        Some(encoded) => Some(
            decode(&encoded).ok_or_else(|| malformed(&encoded, "link target is not base64 text"))?,
        ),
        None => None,
    };

    let kind = fields.remove("Type").unwrap_or_default();
    let file_type = match (kind.as_str(), &link_target) {
        (_, Some(_)) => FileType::Link,
        ("File", None) => FileType::File,
        ("Directory", None) => FileType::Directory,
        (other, None) => return Err(malformed(other, "unknown record type")),
    };

    let size = match fields.remove("Length") {
        Some(text) => text
            .parse::<u64>()
            .map_err(|_| malformed(&text, "bad length"))?,
        None => 0,
    };
    let mut time = |key: &str| fields.remove(key).and_then(|text| from_filetime(&text));
    let created = time("Ctime");
    let modified = time("Mtime");
    let accessed = time("Atime");

    let extended = fields
        .into_iter()
        .map(|(key, value)| (key.to_lowercase(), value))
        .collect();

    Ok(Metadata::new(file_type, path, link_target, '\\')?
        .with_size(size)
        .with_times(created, modified, accessed)
        .with_attributes(Attributes {
            unix: None,
            extended,
        }))
}

fn decode(encoded: &str) -> Option<String> {
    let bytes = STANDARD.decode(encoded.trim()).ok()?;
    String::from_utf8(bytes).ok()
}

/// Convert a FILETIME tick count; zero means "not recorded"
fn from_filetime(text: &str) -> Option<DateTime<Utc>> {
    let ticks = text.trim().parse::<i64>().ok().filter(|ticks| *ticks > 0)?;
    let secs = ticks / 10_000_000 - FILETIME_EPOCH_OFFSET;
    let nanos = (ticks % 10_000_000) as u32 * 100;
    DateTime::from_timestamp(secs, nanos)
}
