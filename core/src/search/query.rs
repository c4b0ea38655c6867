//! Order-insensitive extraction of a condition list

use super::condition::{
    Comparison, Condition, ConditionValue, Field, DEPTH_UNLIMITED, FILETYPE_DIR, FILETYPE_LINK,
};
use crate::error::{Error, Result};
use regex::Regex;

/// How deep below the search root to descend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Depth {
    #[default]
    Unlimited,
    Limited(u32),
}

/// Kind of object the search returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    File,
    Directory,
    Link,
}

/// Full-path constraint
#[derive(Debug, Clone)]
pub enum PathFilter {
    Literal(String),
    Pattern(Regex),
}

/// Directory-name constraint
#[derive(Debug, Clone)]
pub enum DirnameFilter {
    Literal(String),
    Pattern(Regex),
}

impl DirnameFilter {
    /// Anchored pattern source matching this constraint
    pub fn pattern_source(&self) -> String {
        match self {
            DirnameFilter::Literal(path) => format!("^{}$", regex::escape(path)),
            DirnameFilter::Pattern(pattern) => pattern.as_str().to_string(),
        }
    }
}

/// Base-name constraints; any combination may be present
#[derive(Debug, Clone, Default)]
pub struct BasenameFilter {
    pub equals: Option<String>,
    pub not_equals: Option<String>,
    pub pattern: Option<Regex>,
}

impl BasenameFilter {
    pub fn is_empty(&self) -> bool {
        self.equals.is_none() && self.not_equals.is_none() && self.pattern.is_none()
    }
}

/// The compilation branch a query takes
#[derive(Debug, Clone, Copy)]
pub enum Branch<'a> {
    Path(&'a PathFilter),
    Dirname(&'a DirnameFilter),
    /// Flat recursive search, optionally narrowed by base name
    Basename(&'a BasenameFilter),
}

/// A condition list reduced to one value per slot
#[derive(Debug, Clone)]
pub struct Query {
    pub from: String,
    pub depth: Depth,
    pub file_type: TypeFilter,
    pub path: Option<PathFilter>,
    pub dirname: Option<DirnameFilter>,
    pub basename: BasenameFilter,
    pub fs_type: Option<String>,
    pub follow_links: bool,
    pub xdev: bool,
}

impl Query {
    /// Reduce `conditions` to a query. The result does not depend on
    /// the order of the list.
    pub fn from_conditions(conditions: &[Condition]) -> Result<Self> {
        let mut from = None;
        let mut depth = None;
        let mut file_type = None;
        let mut path = None;
        let mut dirname = None;
        let mut basename_eq = None;
        let mut basename_ne = None;
        let mut basename_re = None;
        let mut fs_type = None;
        let mut follow_links = None;
        let mut xdev = None;

        for condition in conditions {
            let value = condition.value();
            match (condition.field(), condition.comparison()) {
                (Field::From, _) => fill(&mut from, condition, value.clone())?,
                (Field::Depth, _) => fill(&mut depth, condition, value.clone())?,
                (Field::FileType, _) => fill(&mut file_type, condition, value.clone())?,
                (Field::Path, _) => fill(&mut path, condition, value.clone())?,
                (Field::Dirname, _) => fill(&mut dirname, condition, value.clone())?,
                (Field::Basename, Comparison::Equality) => {
                    fill(&mut basename_eq, condition, value.clone())?
                }
                (Field::Basename, Comparison::Inequality) => {
                    fill(&mut basename_ne, condition, value.clone())?
                }
                (Field::Basename, Comparison::Pattern) => {
                    fill(&mut basename_re, condition, value.clone())?
                }
                (Field::FsType, _) => fill(&mut fs_type, condition, value.clone())?,
                (Field::FollowLinks, _) => fill(&mut follow_links, condition, value.clone())?,
                (Field::Xdev, _) => fill(&mut xdev, condition, value.clone())?,
            }
        }

        let from = match from {
            Some(ConditionValue::Text(root)) if !root.is_empty() => root,
            _ => return Err(Error::invalid_argument("a search root (From) is required")),
        };

        let depth = match depth {
            Some(ConditionValue::Integer(DEPTH_UNLIMITED)) | None => Depth::Unlimited,
            Some(ConditionValue::Integer(n)) => Depth::Limited(
                u32::try_from(n).map_err(|_| Error::invalid_argument(format!("depth {} out of range", n)))?,
            ),
            Some(other) => return Err(mismatch(Field::Depth, &other)),
        };

        let file_type = match file_type {
            None => TypeFilter::File,
            Some(ConditionValue::Text(kind)) if kind == FILETYPE_DIR => TypeFilter::Directory,
            Some(ConditionValue::Text(kind)) if kind == FILETYPE_LINK => TypeFilter::Link,
            Some(ConditionValue::Text(_)) => TypeFilter::File,
            Some(other) => return Err(mismatch(Field::FileType, &other)),
        };

        let path = match path {
            None => None,
            Some(ConditionValue::Text(literal)) => Some(PathFilter::Literal(literal)),
            Some(ConditionValue::Pattern(pattern)) => Some(PathFilter::Pattern(pattern)),
            Some(other) => return Err(mismatch(Field::Path, &other)),
        };

        let dirname = match dirname {
            None => None,
            Some(ConditionValue::Text(literal)) => Some(DirnameFilter::Literal(literal)),
            Some(ConditionValue::Pattern(pattern)) => Some(DirnameFilter::Pattern(pattern)),
            Some(other) => return Err(mismatch(Field::Dirname, &other)),
        };

        let basename = BasenameFilter {
            equals: text(Field::Basename, basename_eq)?,
            not_equals: text(Field::Basename, basename_ne)?,
            pattern: match basename_re {
                None => None,
                Some(ConditionValue::Pattern(pattern)) => Some(pattern),
                Some(other) => return Err(mismatch(Field::Basename, &other)),
            },
        };

        Ok(Self {
            from,
            depth,
            file_type,
            path,
            dirname,
            basename,
            fs_type: text(Field::FsType, fs_type)?,
            follow_links: flag(Field::FollowLinks, follow_links)?,
            xdev: flag(Field::Xdev, xdev)?,
        })
    }

    /// Path beats dirname, dirname beats basename
    pub fn branch(&self) -> Branch<'_> {
        if let Some(path) = &self.path {
            Branch::Path(path)
        } else if let Some(dirname) = &self.dirname {
            Branch::Dirname(dirname)
        } else {
            Branch::Basename(&self.basename)
        }
    }

    /// Search root without trailing delimiters; the root itself stays whole
    pub fn normalized_from(&self, delimiter: char) -> String {
        let trimmed = self.from.trim_end_matches(delimiter);
        if trimmed.is_empty() {
            delimiter.to_string()
        } else if delimiter == '\\' && trimmed.ends_with(':') {
            format!("{}{}", trimmed, delimiter)
        } else {
            trimmed.to_string()
        }
    }
}

fn fill(
    slot: &mut Option<ConditionValue>,
    condition: &Condition,
    value: ConditionValue,
) -> Result<()> {
    match slot {
        Some(existing) if *existing == value => Ok(()),
        Some(existing) => Err(Error::invalid_argument(format!(
            "conflicting {:?} conditions: {} and {}",
            condition.field(),
            existing,
            value
        ))),
        None => {
            *slot = Some(value);
            Ok(())
        }
    }
}

fn text(field: Field, value: Option<ConditionValue>) -> Result<Option<String>> {
    match value {
        None => Ok(None),
        Some(ConditionValue::Text(text)) => Ok(Some(text)),
        Some(other) => Err(mismatch(field, &other)),
    }
}

fn flag(field: Field, value: Option<ConditionValue>) -> Result<bool> {
    match value {
        None => Ok(false),
        Some(ConditionValue::Flag(flag)) => Ok(flag),
        Some(other) => Err(mismatch(field, &other)),
    }
}

fn mismatch(field: Field, value: &ConditionValue) -> Error {
    Error::invalid_argument(format!("{:?} cannot take {}", field, value))
}
