//! Caller-facing references to files on a host

use super::Metadata;
use crate::channel::ExecutionChannel;
use crate::driver::FlavorDriver;
use crate::error::{Error, Result, SearchError};
use crate::session::{AccessMode, Session, TimeoutTier};
use std::fmt;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// What a handle needs to reach its host
pub struct HandleContext {
    pub session: Arc<dyn Session>,
    pub driver: Arc<dyn FlavorDriver>,
    pub channel: ExecutionChannel,
    prepared: OnceCell<()>,
}

impl HandleContext {
    pub fn new(
        session: Arc<dyn Session>,
        driver: Arc<dyn FlavorDriver>,
        channel: ExecutionChannel,
    ) -> Self {
        Self {
            session,
            driver,
            channel,
            prepared: OnceCell::new(),
        }
    }

    /// Load the driver's helper module into the session. Runs once per
    /// context; a failed load is retried by the next caller.
    pub async fn prepare(&self) -> Result<()> {
        let (name, source) = match self.driver.helper_module() {
            Some(module) => module,
            None => return Ok(()),
        };
        self.prepared
            .get_or_try_init(|| async {
                self.session.load_module(name, source).await?;
                info!(module = name, host = self.session.hostname(), "helper module loaded");
                Ok::<_, Error>(())
            })
            .await?;
        Ok(())
    }
}

/// A file or directory on the session's host.
///
/// Handles produced by a search carry the parsed record. Handles made
/// from a path or rehydrated from the cache stat themselves on first
/// use; `ReadVolatile` and `NoCache` handles stat on every call.
#[derive(Clone)]
pub struct ResourceHandle {
    path: String,
    mode: AccessMode,
    context: Arc<HandleContext>,
    metadata: Arc<OnceCell<Metadata>>,
}

impl ResourceHandle {
    /// Handle without metadata
    pub fn new<P: Into<String>>(path: P, mode: AccessMode, context: Arc<HandleContext>) -> Self {
        Self {
            path: path.into(),
            mode,
            context,
            metadata: Arc::new(OnceCell::new()),
        }
    }

    /// Handle carrying an already parsed record
    pub fn with_metadata(metadata: Metadata, mode: AccessMode, context: Arc<HandleContext>) -> Self {
        Self {
            path: metadata.path().to_string(),
            mode,
            context,
            metadata: Arc::new(OnceCell::new_with(Some(metadata))),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// The attached record, without touching the host
    pub fn cached_metadata(&self) -> Option<&Metadata> {
        self.metadata.get()
    }

    /// The record for this path, fetched with a Short-tier stat if needed
    pub async fn metadata(&self) -> Result<Metadata> {
        if !self.mode.caches_metadata() {
            return self.stat().await;
        }
        self.metadata
            .get_or_try_init(|| self.stat())
            .await
            .cloned()
    }

    pub async fn exists(&self) -> Result<bool> {
        self.context.session.exists(&self.path, self.mode).await
    }

    pub async fn is_directory(&self) -> Result<bool> {
        self.context.session.is_directory(&self.path, self.mode).await
    }

    pub async fn length(&self) -> Result<u64> {
        self.context.session.length(&self.path, self.mode).await
    }

    pub async fn open(&self) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        self.context.session.open(&self.path, self.mode).await
    }

    /// Delete the file; only a `ReadWrite` handle may
    pub async fn delete(&self) -> Result<()> {
        if !self.mode.is_writable() {
            return Err(Error::invalid_argument(format!(
                "{} is not writable in {:?} mode",
                self.path, self.mode
            )));
        }
        self.context.session.delete(&self.path).await
    }

    async fn stat(&self) -> Result<Metadata> {
        let driver = &self.context.driver;
        self.context.prepare().await?;
        let command = driver.stat_command(&self.path);
        debug!(path = %self.path, "stat");
        let output = self.context.channel.run(&command, TimeoutTier::Short).await?;
        let mut lines = output.lines().map(String::from);
        match driver.parse_record(&mut lines) {
            Some(Ok(metadata)) => Ok(metadata),
            Some(Err(e)) => Err(e.into()),
            None => Err(SearchError::NotFound {
                key: self.path.clone(),
            }
            .into()),
        }
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("host", &self.context.session.hostname())
            .field("metadata", &self.metadata.get())
            .finish()
    }
}

impl PartialEq for ResourceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.context.session.hostname() == other.context.session.hostname()
    }
}
