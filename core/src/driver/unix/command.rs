//! `find` pipeline construction

use super::Dialect;
use crate::driver::shell_quote;
use crate::error::Result;
use crate::search::{BasenameFilter, Branch, Depth, PathFilter, Query, TypeFilter};

/// Remote depth limit for dialects without `-maxdepth`.
///
/// Renders to an `awk` step that drops any path with more `/`-separated
/// fields than the root's plus the requested depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthFilter {
    max_fields: usize,
}

impl DepthFilter {
    pub fn new(from: &str, depth: u32) -> Self {
        let root_separators = if from == "/" {
            0
        } else {
            from.matches('/').count()
        };
        Self {
            max_fields: root_separators + 1 + depth as usize,
        }
    }

    pub fn max_fields(&self) -> usize {
        self.max_fields
    }

    /// The pipeline step
    pub fn render(&self) -> String {
        format!("awk -F/ 'NF <= {}'", self.max_fields)
    }

    /// Whether the rendered step lets `path` through
    pub fn admits(&self, path: &str) -> bool {
        path.split('/').count() <= self.max_fields
    }
}

/// Build the full search pipeline, ending in the dialect's stat command.
///
/// Paths travel between stages one per line and are read with
/// `read -r`, so quotes and backslashes in names pass through intact. A
/// name containing a newline is still split in two.
pub fn build_find_command(dialect: &Dialect, query: &Query) -> Result<String> {
    let from = query.normalized_from('/');
    let limit = match query.depth {
        Depth::Limited(depth) => Some(depth),
        Depth::Unlimited => None,
    };
    let (maxdepth, emulated) = match limit {
        Some(depth) if dialect.native_depth => (Some(depth), None),
        Some(depth) => (None, Some(DepthFilter::new(&from, depth))),
        None => (None, None),
    };

    let mut cmd = match query.branch() {
        Branch::Path(filter) => {
            let mut cmd = find_head(query, &shell_quote(&from), maxdepth);
            cmd.push_str(type_test(query.file_type));
            match filter {
                PathFilter::Literal(path) => {
                    cmd.push_str(" | grep -Fx ");
                    cmd.push_str(&shell_quote(path));
                }
                PathFilter::Pattern(pattern) => {
                    cmd.push_str(" | grep -E ");
                    cmd.push_str(&shell_quote(pattern.as_str()));
                }
            }
            push_filter(&mut cmd, emulated);
            cmd
        }
        Branch::Dirname(filter) if query.file_type == TypeFilter::Directory => {
            let mut cmd = find_head(query, &shell_quote(&from), maxdepth);
            cmd.push_str(" -type d | grep -E ");
            cmd.push_str(&shell_quote(&filter.pattern_source()));
            push_filter(&mut cmd, emulated);
            cmd
        }
        Branch::Dirname(filter) => {
            // Depth counts from each matched directory, not from the root
            let mut cmd = find_head(query, &shell_quote(&from), None);
            cmd.push_str(" -type d | grep -E ");
            cmd.push_str(&shell_quote(&filter.pattern_source()));
            cmd.push_str(" | while IFS= read -r d; do ");
            let inner_depth = if dialect.native_depth { limit } else { None };
            cmd.push_str(&find_head(query, "\"$d\"", inner_depth));
            cmd.push_str(type_test(query.file_type));
            push_names(&mut cmd, &query.basename);
            if let (Some(depth), false) = (limit, dialect.native_depth) {
                cmd.push_str(" | ");
                cmd.push_str(&relative_depth_filter(depth));
            }
            cmd.push_str("; done");
            push_pattern(&mut cmd, &query.basename);
            cmd
        }
        Branch::Basename(basename) => {
            let mut cmd = find_head(query, &shell_quote(&from), maxdepth);
            cmd.push_str(type_test(query.file_type));
            push_names(&mut cmd, basename);
            push_pattern(&mut cmd, basename);
            push_filter(&mut cmd, emulated);
            cmd
        }
    };

    cmd.push_str(" | while IFS= read -r f; do ");
    cmd.push_str(dialect.stat);
    cmd.push_str(" \"$f\"; done");
    Ok(cmd)
}

/// Depth filter relative to the directory held in the loop variable `$d`
fn relative_depth_filter(depth: u32) -> String {
    format!(
        "awk -F/ -v d=\"$d\" 'BEGIN {{ n = (d == \"/\") ? 1 : split(d, p, \"/\") }} NF <= n + {}'",
        depth
    )
}

fn find_head(query: &Query, root: &str, maxdepth: Option<u32>) -> String {
    let mut cmd = String::from("find");
    if query.follow_links {
        cmd.push_str(" -L");
    }
    cmd.push(' ');
    cmd.push_str(root);
    if let Some(depth) = maxdepth {
        cmd.push_str(&format!(" -maxdepth {}", depth));
    }
    if query.xdev {
        cmd.push_str(" -xdev");
    }
    if let Some(fs_type) = &query.fs_type {
        cmd.push_str(" -fstype ");
        cmd.push_str(&shell_quote(fs_type));
    }
    cmd
}

fn type_test(file_type: TypeFilter) -> &'static str {
    match file_type {
        TypeFilter::File => " -type f",
        TypeFilter::Directory => " -type d",
        TypeFilter::Link => " -type l",
    }
}

fn push_names(cmd: &mut String, basename: &BasenameFilter) {
    if let Some(name) = &basename.equals {
        cmd.push_str(" -name ");
        cmd.push_str(&shell_quote(&glob_escape(name)));
    }
    if let Some(name) = &basename.not_equals {
        cmd.push_str(" ! -name ");
        cmd.push_str(&shell_quote(&glob_escape(name)));
    }
}

fn push_pattern(cmd: &mut String, basename: &BasenameFilter) {
    if let Some(pattern) = &basename.pattern {
        cmd.push_str(" | awk -F/ ");
        cmd.push_str(&shell_quote(&format!(
            "$NF ~ /{}/",
            escape_slashes(pattern.as_str())
        )));
    }
}

fn push_filter(cmd: &mut String, filter: Option<DepthFilter>) {
    if let Some(filter) = filter {
        cmd.push_str(" | ");
        cmd.push_str(&filter.render());
    }
}

/// Make a literal name safe for `-name`
fn glob_escape(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Escape unescaped `/` for an awk regex literal
fn escape_slashes(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                escaped.push(c);
                if let Some(next) = chars.next() {
                    escaped.push(next);
                }
            }
            '/' => escaped.push_str("\\/"),
            c => escaped.push(c),
        }
    }
    escaped
}
