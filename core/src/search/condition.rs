//! Predicate model: portable search conditions

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;

/// Condition value for a regular file
pub const FILETYPE_FILE: &str = "f";
/// Condition value for a directory
pub const FILETYPE_DIR: &str = "d";
/// Condition value for a symbolic link
pub const FILETYPE_LINK: &str = "l";
/// Depth value meaning "no limit"
pub const DEPTH_UNLIMITED: i64 = -1;

/// What a condition constrains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    FileType,
    Path,
    Dirname,
    Basename,
    FsType,
    From,
    Depth,
    FollowLinks,
    Xdev,
}

/// How a condition compares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Comparison {
    Equality,
    Inequality,
    Pattern,
}

/// Typed condition value
#[derive(Debug, Clone)]
pub enum ConditionValue {
    Text(String),
    Pattern(Regex),
    Integer(i64),
    Flag(bool),
}

impl ConditionValue {
    fn kind(&self) -> &'static str {
        match self {
            ConditionValue::Text(_) => "text",
            ConditionValue::Pattern(_) => "pattern",
            ConditionValue::Integer(_) => "integer",
            ConditionValue::Flag(_) => "boolean",
        }
    }
}

impl PartialEq for ConditionValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConditionValue::Text(a), ConditionValue::Text(b)) => a == b,
            (ConditionValue::Pattern(a), ConditionValue::Pattern(b)) => a.as_str() == b.as_str(),
            (ConditionValue::Integer(a), ConditionValue::Integer(b)) => a == b,
            (ConditionValue::Flag(a), ConditionValue::Flag(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConditionValue {}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionValue::Text(text) => write!(f, "'{}'", text),
            ConditionValue::Pattern(pattern) => write!(f, "/{}/", pattern.as_str()),
            ConditionValue::Integer(value) => write!(f, "{}", value),
            ConditionValue::Flag(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        ConditionValue::Text(value.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        ConditionValue::Text(value)
    }
}

impl From<Regex> for ConditionValue {
    fn from(value: Regex) -> Self {
        ConditionValue::Pattern(value)
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        ConditionValue::Integer(value)
    }
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        ConditionValue::Flag(value)
    }
}

/// One immutable search predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    field: Field,
    comparison: Comparison,
    value: ConditionValue,
}

/// Construct a condition, checking the value against the field
pub fn condition<V: Into<ConditionValue>>(
    field: Field,
    comparison: Comparison,
    value: V,
) -> Result<Condition> {
    Condition::new(field, comparison, value)
}

impl Condition {
    pub fn new<V: Into<ConditionValue>>(
        field: Field,
        comparison: Comparison,
        value: V,
    ) -> Result<Self> {
        let value = value.into();
        check(field, comparison, &value)?;
        Ok(Self {
            field,
            comparison,
            value,
        })
    }

    /// Search root
    pub fn from_root<S: Into<String>>(path: S) -> Self {
        Self {
            field: Field::From,
            comparison: Comparison::Equality,
            value: ConditionValue::Text(path.into()),
        }
    }

    /// Depth limit; [`DEPTH_UNLIMITED`] for none
    pub fn depth(depth: i64) -> Result<Self> {
        Self::new(Field::Depth, Comparison::Equality, depth)
    }

    /// Match directories only
    pub fn directories() -> Self {
        Self {
            field: Field::FileType,
            comparison: Comparison::Equality,
            value: ConditionValue::Text(FILETYPE_DIR.to_string()),
        }
    }

    pub fn basename_is<S: Into<String>>(name: S) -> Self {
        Self {
            field: Field::Basename,
            comparison: Comparison::Equality,
            value: ConditionValue::Text(name.into()),
        }
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    pub fn value(&self) -> &ConditionValue {
        &self.value
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?} {}", self.field, self.comparison, self.value)
    }
}

fn check(field: Field, comparison: Comparison, value: &ConditionValue) -> Result<()> {
    use Comparison::*;
    use ConditionValue as V;

    let ok = match (field, comparison, value) {
        (Field::FileType, Equality, V::Text(kind)) => {
            if ![FILETYPE_FILE, FILETYPE_DIR, FILETYPE_LINK].contains(&kind.as_str()) {
                return Err(Error::invalid_argument(format!(
                    "unknown file type '{}', expected f, d or l",
                    kind
                )));
            }
            true
        }
        (Field::Path | Field::Dirname, Equality, V::Text(_)) => true,
        (Field::Path | Field::Dirname, Pattern, V::Pattern(_)) => true,
        (Field::Basename, Equality | Inequality, V::Text(_)) => true,
        (Field::Basename, Pattern, V::Pattern(_)) => true,
        (Field::FsType | Field::From, Equality, V::Text(_)) => true,
        (Field::Depth, Equality, V::Integer(depth)) => {
            if *depth < DEPTH_UNLIMITED {
                return Err(Error::invalid_argument(format!(
                    "depth must be {} or non-negative, got {}",
                    DEPTH_UNLIMITED, depth
                )));
            }
            true
        }
        (Field::FollowLinks | Field::Xdev, Equality, V::Flag(_)) => true,
        _ => false,
    };

    if ok {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!(
            "{:?} with {:?} does not accept a {} value",
            field,
            comparison,
            value.kind()
        )))
    }
}

/// Guess the deepest literal directory an anchored path pattern lives in.
///
/// `^/etc/ssh/.*\.conf$` yields `/etc/ssh`. Returns `None` when the
/// pattern is unanchored or has no literal directory prefix.
pub fn guess_parent(pattern: &str, delimiter: char) -> Option<String> {
    let body = pattern.strip_prefix('^')?;
    let mut literal = String::new();
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) if !escaped.is_ascii_alphanumeric() => literal.push(escaped),
                _ => break,
            },
            '|' => return None,
            '.' | '[' | '(' | '$' | '+' => break,
            '*' | '?' | '{' => {
                literal.pop();
                break;
            }
            c => literal.push(c),
        }
    }

    let cut = literal.rfind(delimiter)?;
    let parent = &literal[..cut];
    if parent.is_empty() {
        Some(delimiter.to_string())
    } else if delimiter == '\\' && parent.ends_with(':') {
        Some(format!("{}{}", parent, delimiter))
    } else {
        Some(parent.to_string())
    }
}
