//! Search orchestration

use super::cache::QueryCache;
use super::condition::Condition;
use super::query::Query;
use crate::channel::ExecutionChannel;
use crate::config::{Settings, SettingsLoader};
use crate::driver::{CompiledQuery, Flavor, FlavorDriver};
use crate::error::{Error, Result};
use crate::io::{HandleContext, Metadata, Mount, ResourceHandle};
use crate::relay::{gzip_lines, Artifacts, Relay, RelaySettings};
use crate::session::{AccessMode, Session, TimeoutTier, TimeoutTiers};
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Counters for one searcher
#[derive(Debug, Default)]
pub struct SearchStats {
    executions: AtomicU64,
    cache_hits: AtomicU64,
    cleanups: AtomicU64,
    skipped_records: AtomicU64,
}

impl SearchStats {
    /// Searches that reached the host
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Relay cleanups run; one per executed search
    pub fn cleanups(&self) -> u64 {
        self.cleanups.load(Ordering::Relaxed)
    }

    /// Records dropped as unparseable
    pub fn skipped_records(&self) -> u64 {
        self.skipped_records.load(Ordering::Relaxed)
    }
}

/// Records read from one search's output
struct Parsed {
    records: Vec<Metadata>,
    skipped: u64,
    /// Set when reading stopped early
    failure: Option<String>,
}

impl Parsed {
    fn failed(reason: String) -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
            failure: Some(reason),
        }
    }
}

/// Compiles, runs, parses and caches searches on one session
pub struct Searcher {
    context: Arc<HandleContext>,
    relay: Relay,
    cache: QueryCache,
    mounts: OnceCell<Vec<Mount>>,
    stats: SearchStats,
}

impl Searcher {
    pub fn builder(session: Arc<dyn Session>, flavor: Flavor) -> SearcherBuilder {
        SearcherBuilder::new(session, flavor)
    }

    pub fn flavor(&self) -> Flavor {
        self.context.driver.flavor()
    }

    pub fn driver(&self) -> &Arc<dyn FlavorDriver> {
        &self.context.driver
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.context.session
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Handle for a known path, with metadata fetched on demand
    pub fn file<P: Into<String>>(&self, path: P, mode: AccessMode) -> ResourceHandle {
        ResourceHandle::new(path, mode, self.context.clone())
    }

    /// The host's mount table, listed once per searcher
    pub async fn mounts(&self) -> Result<&[Mount]> {
        let mounts = self
            .mounts
            .get_or_try_init(|| async {
                let driver = &self.context.driver;
                let output = self
                    .context
                    .channel
                    .run(&driver.mount_command(), TimeoutTier::Short)
                    .await?;
                let mounts = driver.parse_mounts(&output);
                debug!(count = mounts.len(), "discovered mounts");
                Ok::<_, Error>(mounts)
            })
            .await?;
        Ok(mounts)
    }

    /// Mounts whose type matches (`include`) or does not match the pattern
    pub async fn mounts_filtered(&self, type_pattern: &Regex, include: bool) -> Result<Vec<Mount>> {
        Ok(self
            .mounts()
            .await?
            .iter()
            .filter(|mount| type_pattern.is_match(&mount.fs_type) == include)
            .cloned()
            .collect())
    }

    /// Find the resources matching `conditions`, in the order the host
    /// reported them.
    ///
    /// Repeating a search returns the cached paths without touching the
    /// host. A root that is not a directory finds nothing. Once the search
    /// command has run, a failure to compress, copy or read its output
    /// returns the records read so far and caches nothing.
    pub async fn search(&self, conditions: &[Condition]) -> Result<Vec<ResourceHandle>> {
        let query = Query::from_conditions(conditions)?;
        let driver = &self.context.driver;
        let from = query.normalized_from(driver.delimiter());

        if let Some(fs_type) = &query.fs_type {
            if !driver.admits_fs_type(self.mounts().await?, &from, fs_type) {
                debug!(fs_type = %fs_type, from = %from, "no mount of the requested type");
                return Ok(Vec::new());
            }
        }

        let compiled = driver.compile_query(&query)?;

        if let Some(paths) = self.cache.lookup(&compiled.cache_key) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(command = %compiled.command, results = paths.len(), "search cached");
            return Ok(paths
                .iter()
                .map(|path| self.file(path.clone(), AccessMode::ReadOnly))
                .collect());
        }

        if !self.context.session.is_directory(&from, AccessMode::ReadOnly).await? {
            debug!(from = %from, "search root is not a directory");
            return Ok(Vec::new());
        }
        self.context.prepare().await?;

        let mut artifacts = Artifacts::default();
        let outcome = self.execute(&compiled, &mut artifacts).await;
        self.relay.cleanup(artifacts).await;
        self.stats.cleanups.fetch_add(1, Ordering::Relaxed);
        let parsed = outcome?;

        if parsed.skipped > 0 {
            self.stats
                .skipped_records
                .fetch_add(parsed.skipped, Ordering::Relaxed);
        }

        let paths: Vec<String> = parsed
            .records
            .iter()
            .map(|record| record.path().to_string())
            .collect();

        match &parsed.failure {
            Some(reason) => warn!(
                command = %compiled.command,
                results = paths.len(),
                reason = %reason,
                "search output ended early; returning partial results"
            ),
            None => {
                self.cache.store(compiled.cache_key.clone(), paths);
            }
        }

        info!(
            command = %compiled.command,
            results = parsed.records.len(),
            skipped = parsed.skipped,
            "search complete"
        );

        Ok(parsed
            .records
            .into_iter()
            .map(|record| {
                ResourceHandle::with_metadata(record, AccessMode::ReadOnly, self.context.clone())
            })
            .collect())
    }

    async fn execute(&self, compiled: &CompiledQuery, artifacts: &mut Artifacts) -> Result<Parsed> {
        debug!(command = %compiled.command, "search start");
        self.stats.executions.fetch_add(1, Ordering::Relaxed);

        let raw = self.relay.run(&compiled.command, artifacts).await?;
        let file = match self.relay.fetch(&raw, artifacts).await {
            Ok(file) => file,
            Err(e) => return Ok(Parsed::failed(e.to_string())),
        };
        let driver = self.context.driver.clone();
        tokio::task::spawn_blocking(move || parse_output(driver.as_ref(), file))
            .await
            .map_err(|e| Error::Generic(format!("parse task failed: {}", e)))
    }
}

/// Parse every record of a relayed output file
fn parse_output(driver: &dyn FlavorDriver, file: std::fs::File) -> Parsed {
    let mut lines = match gzip_lines(file) {
        Ok(lines) => lines,
        Err(e) => return Parsed::failed(e.to_string()),
    };
    let mut parsed = Parsed {
        records: Vec::new(),
        skipped: 0,
        failure: None,
    };

    while let Some(record) = driver.parse_record(&mut lines) {
        match record {
            Ok(metadata) => {
                debug!(path = %metadata.path(), "match");
                parsed.records.push(metadata);
            }
            Err(e) => {
                warn!(error = %e, "skipping unparseable record");
                parsed.skipped += 1;
            }
        }
    }

    if let Some(e) = lines.take_error() {
        parsed.failure = Some(e.to_string());
    }
    debug!(
        lines = lines.lines_read(),
        records = parsed.records.len(),
        "output parsed"
    );
    parsed
}

/// Builder for [`Searcher`]
pub struct SearcherBuilder {
    session: Arc<dyn Session>,
    flavor: Flavor,
    driver: Option<Arc<dyn FlavorDriver>>,
    settings: Option<Settings>,
    tiers: Option<TimeoutTiers>,
    relay: Option<RelaySettings>,
    mounts: Option<Vec<Mount>>,
}

impl SearcherBuilder {
    pub fn new(session: Arc<dyn Session>, flavor: Flavor) -> Self {
        Self {
            session,
            flavor,
            driver: None,
            settings: None,
            tiers: None,
            relay: None,
            mounts: None,
        }
    }

    /// Use a custom driver instead of the flavor's own
    pub fn with_driver(mut self, driver: Arc<dyn FlavorDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Use an already resolved settings snapshot
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_timeouts(mut self, tiers: TimeoutTiers) -> Self {
        self.tiers = Some(tiers);
        self
    }

    pub fn with_relay_settings(mut self, relay: RelaySettings) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Supply the mount table instead of listing it from the host
    pub fn with_mounts(mut self, mounts: Vec<Mount>) -> Self {
        self.mounts = Some(mounts);
        self
    }

    /// Build the searcher. Without explicit settings, the embedded
    /// defaults, the per-user overlay and the environment are resolved
    /// for the flavor.
    pub fn build(self) -> Result<Searcher> {
        let settings = match self.settings {
            Some(settings) => settings,
            None => SettingsLoader::new()
                .with_default_overlay()
                .load(&self.flavor.config_chain())?,
        };
        let tiers = self
            .tiers
            .unwrap_or_else(|| TimeoutTiers::from_settings(&settings));
        let relay_settings = self
            .relay
            .unwrap_or_else(|| RelaySettings::from_settings(&settings));
        let driver = self.driver.unwrap_or_else(|| self.flavor.driver());

        let channel = ExecutionChannel::new(self.session.clone(), tiers);
        let relay = Relay::new(channel.clone(), driver.shell(), relay_settings);
        let mounts = match self.mounts {
            Some(mounts) => OnceCell::new_with(Some(mounts)),
            None => OnceCell::new(),
        };

        debug!(
            flavor = %driver.flavor(),
            host = self.session.hostname(),
            "searcher ready"
        );

        Ok(Searcher {
            context: Arc::new(HandleContext::new(self.session, driver, channel)),
            relay,
            cache: QueryCache::new(),
            mounts,
            stats: SearchStats::default(),
        })
    }
}
