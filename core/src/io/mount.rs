//! Filesystem mount points

use serde::{Deserialize, Serialize};

/// A mount point and its platform-dependent type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mount {
    pub path: String,
    pub fs_type: String,
}

impl Mount {
    pub fn new<P: Into<String>, T: Into<String>>(path: P, fs_type: T) -> Self {
        Self {
            path: path.into(),
            fs_type: fs_type.into(),
        }
    }
}

/// Whether `path` equals `root` or lies beneath it
pub fn is_within(path: &str, root: &str, delimiter: char, ignore_case: bool) -> bool {
    let (path, root) = if ignore_case {
        (path.to_uppercase(), root.to_uppercase())
    } else {
        (path.to_string(), root.to_string())
    };
    let root = root.trim_end_matches(delimiter);
    if root.is_empty() {
        return path.starts_with(delimiter);
    }
    match path.strip_prefix(root) {
        Some("") => true,
        Some(rest) => rest.starts_with(delimiter),
        None => false,
    }
}
