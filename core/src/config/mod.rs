//! Layered session settings
//!
//! Settings are resolved once per flavor into a flat snapshot; nothing
//! re-walks the source layers after construction.

pub mod settings;

pub use settings::{Settings, SettingsLoader, ENV_PREFIX};
