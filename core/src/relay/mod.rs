//! Streaming result relay
//!
//! Large search output takes this path:
//! 1. the command writes into a uniquely named temp file on the host
//! 2. a [`Watchdog`] reports the file's growth while the command runs
//! 3. the file is gzipped in place; the raw file stays recorded until
//!    the `.gz` is seen on the host
//! 4. a local session reads the `.gz` directly; a remote one copies it
//!    into a local temp file first
//! 5. the stream is decompressed, its encoding detected, and handed out
//!    as a [`LineStream`]
//!
//! Steps 1 and 2 are [`Relay::run`]; the rest is [`Relay::fetch`]. Every
//! artifact is recorded in [`Artifacts`] as it comes into being so that
//! [`Relay::cleanup`] can remove whatever exists on any exit path.

pub mod lines;
pub mod watchdog;

pub use lines::{decode_lines, detect_encoding, gzip_lines, LineStream};
pub use watchdog::{WatchOutcome, Watchdog};

use crate::channel::ExecutionChannel;
use crate::config::Settings;
use crate::driver::Shell;
use crate::error::{Error, Result};
use crate::session::{AccessMode, TimeoutTier};
use chrono::Utc;
use parking_lot::{const_mutex, Mutex};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Last stamp handed out; stamps are strictly increasing process-wide
static LAST_STAMP: Mutex<u64> = const_mutex(0);

/// Millisecond stamp unique within this process
pub fn unique_stamp() -> u64 {
    let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    let mut last = LAST_STAMP.lock();
    let next = now.max(*last + 1);
    *last = next;
    next
}

/// Relay knobs resolved from settings
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub temp_prefix: String,
    pub watchdog_interval: Duration,
    pub watchdog_join_timeout: Duration,
    /// Local directory for copies of remote output
    pub workspace: Option<PathBuf>,
}

impl RelaySettings {
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        Self {
            temp_prefix: settings
                .get_str("temp_prefix")
                .filter(|prefix| !prefix.trim().is_empty())
                .map(|prefix| prefix.trim().to_string())
                .unwrap_or(defaults.temp_prefix),
            watchdog_interval: settings
                .get_duration_ms("watchdog_interval")
                .filter(|interval| !interval.is_zero())
                .unwrap_or(defaults.watchdog_interval),
            watchdog_join_timeout: settings
                .get_duration_ms("watchdog_join_timeout")
                .unwrap_or(defaults.watchdog_join_timeout),
            workspace: settings.workspace(),
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            temp_prefix: "find".to_string(),
            watchdog_interval: Duration::from_secs(15),
            watchdog_join_timeout: Duration::from_secs(2),
            workspace: None,
        }
    }
}

/// Temp files created for one search
#[derive(Debug, Default)]
pub struct Artifacts {
    raw: Option<String>,
    compressed: Option<String>,
    local: Option<NamedTempFile>,
}

impl Artifacts {
    /// Paths on the host that may still exist
    pub fn remote_paths(&self) -> Vec<&str> {
        self.raw
            .iter()
            .chain(self.compressed.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Moves command output from the host to a local line stream
#[derive(Clone)]
pub struct Relay {
    channel: ExecutionChannel,
    shell: Shell,
    settings: RelaySettings,
}

impl Relay {
    pub fn new(channel: ExecutionChannel, shell: Shell, settings: RelaySettings) -> Self {
        Self {
            channel,
            shell,
            settings,
        }
    }

    /// Run `command` with its output redirected into a fresh temp file on
    /// the host and return that file's path. The file is recorded in
    /// `artifacts` before the command starts.
    pub async fn run(&self, command: &str, artifacts: &mut Artifacts) -> Result<String> {
        let session = self.channel.session().clone();
        let delimiter = session.delimiter();

        let mut temp_dir = session.temp_dir().await?;
        if !temp_dir.ends_with(delimiter) {
            temp_dir.push(delimiter);
        }
        let raw = format!(
            "{}{}.{}.out",
            temp_dir,
            self.settings.temp_prefix,
            unique_stamp()
        );
        debug!(path = %raw, "search output file");
        artifacts.raw = Some(raw.clone());

        let watchdog = Watchdog::spawn(session.clone(), raw.clone(), self.settings.watchdog_interval);
        let ran = self
            .channel
            .run_to_file(self.shell, command, &raw, TimeoutTier::ExtraLong)
            .await;
        watchdog.stop(self.settings.watchdog_join_timeout).await;
        ran?;
        Ok(raw)
    }

    /// Compress the output written by [`Relay::run`] and open it locally
    pub async fn fetch(&self, raw: &str, artifacts: &mut Artifacts) -> Result<std::fs::File> {
        let session = self.channel.session().clone();
        let compressed = format!("{}.gz", raw);
        artifacts.compressed = Some(compressed.clone());
        self.channel
            .run(&self.shell.compress(raw), TimeoutTier::Medium)
            .await?;
        // gzip replaces the raw file only when it succeeds
        if !session.exists(&compressed, AccessMode::ReadVolatile).await? {
            return Err(Error::transport(
                self.shell.compress(raw),
                "compressed output missing",
            ));
        }
        artifacts.raw = None;

        if session.is_local() {
            let file = tokio::fs::File::open(&compressed)
                .await
                .map_err(|e| Error::transport(&compressed, e))?;
            return Ok(file.into_std().await);
        }

        let workspace = self
            .settings
            .workspace
            .clone()
            .or_else(|| session.workspace().map(PathBuf::from))
            .unwrap_or_else(std::env::temp_dir);
        let local = tempfile::Builder::new()
            .prefix("hostlens.")
            .suffix(".gz")
            .tempfile_in(&workspace)?;
        let local_path = local.path().to_path_buf();
        let writer = local.reopen()?;
        artifacts.local = Some(local);

        let mut reader = session.open(&compressed, AccessMode::ReadOnly).await?;
        let mut writer = tokio::fs::File::from_std(writer);
        let copied = tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(|e| Error::transport(&compressed, e))?;
        writer.flush().await?;
        debug!(from = %compressed, to = %local_path.display(), bytes = copied, "relayed output");

        Ok(std::fs::File::open(&local_path)?)
    }

    /// Remove every recorded artifact. Failures are logged, never raised.
    pub async fn cleanup(&self, artifacts: Artifacts) {
        let session = self.channel.session();
        for path in artifacts.remote_paths() {
            match session.exists(path, AccessMode::ReadVolatile).await {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => debug!(path, error = %e, "could not check temp file"),
            }
            match session.delete(path).await {
                Ok(()) => debug!(path, "deleted temp file"),
                Err(e) => warn!(path, error = %e, "failed to delete temp file"),
            }
        }
        if let Some(local) = artifacts.local {
            let path = local.path().to_path_buf();
            if let Err(e) = local.close() {
                warn!(path = %path.display(), error = %e, "failed to delete local copy");
            }
        }
    }
}
