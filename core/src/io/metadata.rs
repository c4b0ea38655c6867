//! Typed file metadata parsed from remote output

use crate::error::ParseError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of filesystem object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    File,
    Directory,
    Link,
    Fifo,
    Block,
    Char,
    Socket,
}

impl FileType {
    /// Map the leading character of an `ls -l` style mode string
    pub fn from_unix_char(c: char) -> Option<Self> {
        match c {
            '-' => Some(FileType::File),
            'd' => Some(FileType::Directory),
            'l' => Some(FileType::Link),
            'p' => Some(FileType::Fifo),
            'b' => Some(FileType::Block),
            'c' => Some(FileType::Char),
            's' => Some(FileType::Socket),
            _ => None,
        }
    }
}

/// The nine `rwx` permission characters of a Unix mode string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions([u8; 9]);

impl Permissions {
    /// Parse exactly nine ASCII mode characters
    pub fn parse(text: &str) -> Option<Self> {
        let bytes: [u8; 9] = text.as_bytes().try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn user_read(&self) -> bool {
        self.0[0] == b'r'
    }

    pub fn user_write(&self) -> bool {
        self.0[1] == b'w'
    }

    pub fn user_exec(&self) -> bool {
        self.0[2] != b'-'
    }

    pub fn setuid(&self) -> bool {
        matches!(self.0[2], b's' | b'S')
    }

    pub fn group_read(&self) -> bool {
        self.0[3] == b'r'
    }

    pub fn group_write(&self) -> bool {
        self.0[4] == b'w'
    }

    pub fn group_exec(&self) -> bool {
        self.0[5] != b'-'
    }

    pub fn setgid(&self) -> bool {
        matches!(self.0[5], b's' | b'S')
    }

    pub fn other_read(&self) -> bool {
        self.0[6] == b'r'
    }

    pub fn other_write(&self) -> bool {
        self.0[7] == b'w'
    }

    pub fn other_exec(&self) -> bool {
        self.0[8] != b'-'
    }

    pub fn sticky(&self) -> bool {
        matches!(self.0[8], b't' | b'T')
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("---------")
    }
}

/// Unix-specific attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnixAttributes {
    pub permissions: Permissions,
    /// `None` when the remote id did not fit (e.g. an illegal "nobody")
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    /// `None` when the platform does not report ACL presence
    pub has_acl: Option<bool>,
    pub link_count: Option<u64>,
    /// Major and minor numbers of block and character devices
    pub device: Option<(u32, u32)>,
}

/// Platform-specific attribute bag
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attributes {
    pub unix: Option<UnixAttributes>,
    pub extended: BTreeMap<String, String>,
}

/// One parsed record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    file_type: FileType,
    path: String,
    size: u64,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
    accessed: Option<DateTime<Utc>>,
    link_target: Option<String>,
    canonical_path: String,
    attributes: Attributes,
}

impl Metadata {
    /// Create a record; a link must carry a target and only a link may
    pub fn new(
        file_type: FileType,
        path: String,
        link_target: Option<String>,
        delimiter: char,
    ) -> Result<Self, ParseError> {
        match (file_type, &link_target) {
            (FileType::Link, None) => {
                return Err(ParseError::Malformed {
                    line: path,
                    reason: "link without a target".to_string(),
                })
            }
            (FileType::Link, Some(_)) | (_, None) => {}
            (_, Some(_)) => {
                return Err(ParseError::Malformed {
                    line: path,
                    reason: "link target on a non-link".to_string(),
                })
            }
        }

        let canonical_path = match &link_target {
            Some(target) => resolve_link_target(&path, target, delimiter),
            None => path.clone(),
        };

        Ok(Self {
            file_type,
            path,
            size: 0,
            created: None,
            modified: None,
            accessed: None,
            link_target,
            canonical_path,
            attributes: Attributes::default(),
        })
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_times(
        mut self,
        created: Option<DateTime<Utc>>,
        modified: Option<DateTime<Utc>>,
        accessed: Option<DateTime<Utc>>,
    ) -> Self {
        self.created = created;
        self.modified = modified;
        self.accessed = accessed;
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    pub fn accessed(&self) -> Option<DateTime<Utc>> {
        self.accessed
    }

    /// Raw link target as reported by the host
    pub fn link_target(&self) -> Option<&str> {
        self.link_target.as_deref()
    }

    /// Path with the link target resolved; the path itself for non-links
    pub fn canonical_path(&self) -> &str {
        &self.canonical_path
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn unix(&self) -> Option<&UnixAttributes> {
        self.attributes.unix.as_ref()
    }

    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_link(&self) -> bool {
        self.file_type == FileType::Link
    }
}

/// Whether `path` is absolute under `delimiter`'s conventions
pub fn is_absolute(path: &str, delimiter: char) -> bool {
    if path.starts_with(delimiter) {
        return true;
    }
    let bytes = path.as_bytes();
    delimiter == '\\' && bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Resolve a link target against the link's own path.
///
/// Absolute targets come back unchanged. Relative targets are applied to
/// the link's parent; `..` never climbs above the root.
pub fn resolve_link_target(path: &str, target: &str, delimiter: char) -> String {
    if is_absolute(target, delimiter) {
        return target.to_string();
    }

    let mut stack: Vec<&str> = path.split(delimiter).filter(|s| !s.is_empty()).collect();
    stack.pop();

    // A drive prefix such as "C:" is the root and is never popped
    let floor = usize::from(
        delimiter == '\\' && stack.first().is_some_and(|first| first.ends_with(':')),
    );

    for segment in target.split(delimiter) {
        match segment {
            "" | "." => {}
            ".." => {
                if stack.len() > floor {
                    stack.pop();
                }
            }
            name => stack.push(name),
        }
    }

    if floor == 1 {
        let mut resolved = stack.join(&delimiter.to_string());
        if stack.len() == 1 {
            resolved.push(delimiter);
        }
        return resolved;
    }

    let mut resolved = String::new();
    for segment in &stack {
        resolved.push(delimiter);
        resolved.push_str(segment);
    }
    if resolved.is_empty() {
        resolved.push(delimiter);
    }
    resolved
}
