//! # hostlens Core
//!
//! Core library for hostlens - portable file searches on remote hosts.
//!
//! A search is a list of [`Condition`]s. The [`Searcher`] compiles it
//! into a native command for the host's [`Flavor`], runs it over a
//! [`Session`], relays the output back through a compressed temp file and
//! parses every record into a [`ResourceHandle`]. Results are cached per
//! compiled command for the lifetime of the searcher.

// Core modules
pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod io;
pub mod relay;
pub mod search;
pub mod session;

// Re-export commonly used types
pub use channel::ExecutionChannel;
pub use config::{Settings, SettingsLoader};
pub use driver::{CompiledQuery, Flavor, FlavorDriver};
pub use error::{Error, Result};
pub use io::{FileType, Metadata, Mount, ResourceHandle};
pub use search::{condition, Comparison, Condition, Field, Searcher, SearcherBuilder};
pub use session::{AccessMode, LocalSession, Session, TimeoutTier, TimeoutTiers};

/// Current version of the hostlens-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for the library
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

/// Initialize tracing with a specific debug mode
pub fn init_tracing_with_debug(debug: bool) {
    let filter = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();
}
