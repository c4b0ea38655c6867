//! File metadata, mounts and resource handles

pub mod handle;
pub mod metadata;
pub mod mount;

pub use crate::session::AccessMode;
pub use handle::{HandleContext, ResourceHandle};
pub use metadata::{
    is_absolute, resolve_link_target, Attributes, FileType, Metadata, Permissions, UnixAttributes,
};
pub use mount::{is_within, Mount};
