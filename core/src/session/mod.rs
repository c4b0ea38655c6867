//! Session collaborator contract
//!
//! The core never opens or closes sessions. A transport (SSH, WinRM, a
//! local process) implements [`Session`] and the searcher drives it.

pub mod local;
pub mod timeout;

pub use local::LocalSession;
pub use timeout::{TimeoutTier, TimeoutTiers};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncRead;

/// Host identity of a session running on this machine
pub const LOCALHOST: &str = "localhost";

/// Outcome of one command execution
#[derive(Debug, Clone, Default)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    /// Set when the budget ran out; `stdout` then holds partial output
    pub timed_out: bool,
}

/// Access flags for remote file operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AccessMode {
    #[default]
    ReadOnly,
    ReadWrite,
    /// Read, bypassing any transport-side cache
    ReadVolatile,
    /// Never retain anything about the file
    NoCache,
}

impl AccessMode {
    pub fn is_writable(&self) -> bool {
        matches!(self, AccessMode::ReadWrite)
    }

    /// Whether metadata may be remembered between calls
    pub fn caches_metadata(&self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }
}

/// A live connection to a host
#[async_trait]
pub trait Session: Send + Sync {
    /// Host identity; [`LOCALHOST`] for the local machine
    fn hostname(&self) -> &str;

    /// Path delimiter of the host's filesystem
    fn delimiter(&self) -> char;

    fn is_local(&self) -> bool {
        self.hostname() == LOCALHOST
    }

    /// Local directory for relayed copies of remote files
    fn workspace(&self) -> Option<&Path> {
        None
    }

    /// Remote temp directory
    async fn temp_dir(&self) -> Result<String>;

    /// Make the PowerShell module `source` available, under `name`, to
    /// every later command on this session
    async fn load_module(&self, name: &str, source: &str) -> Result<()>;

    /// Run a command or script, giving up after `timeout`
    async fn execute(&self, command: &str, timeout: Duration) -> Result<CommandResult>;

    async fn exists(&self, path: &str, mode: AccessMode) -> Result<bool>;

    async fn length(&self, path: &str, mode: AccessMode) -> Result<u64>;

    async fn is_directory(&self, path: &str, mode: AccessMode) -> Result<bool>;

    /// Open a remote file for reading
    async fn open(&self, path: &str, mode: AccessMode) -> Result<Box<dyn AsyncRead + Send + Unpin>>;

    async fn delete(&self, path: &str) -> Result<()>;
}
