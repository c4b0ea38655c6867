//! Predicate model, query cache and the searcher

pub mod cache;
pub mod condition;
pub mod query;
pub mod searcher;

#[cfg(test)]
mod tests;

pub use cache::QueryCache;
pub use condition::{
    condition, guess_parent, Comparison, Condition, ConditionValue, Field, DEPTH_UNLIMITED,
    FILETYPE_DIR, FILETYPE_FILE, FILETYPE_LINK,
};
pub use query::{BasenameFilter, Branch, Depth, DirnameFilter, PathFilter, Query, TypeFilter};
pub use searcher::{SearchStats, Searcher, SearcherBuilder};
