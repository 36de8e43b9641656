//! FlagStore - the resolved flag table
//!
//! Loading walks the fallback chain remote → local JSON → hardcoded and installs
//! whatever the first working link returned as one immutable snapshot. Readers
//! clone the snapshot `Arc` and never see a half-built table.
//!
//! Concurrent `refresh()` calls share a single in-flight load: the second caller
//! awaits the first caller's result instead of issuing a duplicate fetch.
//!
//! Every load is tagged with the write generation it started under. A load that
//! started before a `set_flag` is never installed over one that started after it.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::defaults::hardcoded_defaults;
use super::source::{FlagRow, FlagSource, FlagSourceError};

/// Where the current flag table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagOrigin {
    Remote,
    Fallback,
    Hardcoded,
}

impl fmt::Display for FlagOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagOrigin::Remote => write!(f, "remote"),
            FlagOrigin::Fallback => write!(f, "fallback"),
            FlagOrigin::Hardcoded => write!(f, "hardcoded"),
        }
    }
}

/// A resolved flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flag {
    pub name: String,
    pub enabled: bool,
    pub description: String,
    pub source: FlagOrigin,
    pub last_updated: DateTime<Utc>,
}

impl Flag {
    fn from_row(row: FlagRow, source: FlagOrigin, at: DateTime<Utc>) -> Self {
        Self {
            name: row.name,
            enabled: row.enabled,
            description: row.description.unwrap_or_default(),
            source,
            last_updated: at,
        }
    }
}

/// Debug view of a single flag, including absent ones
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagDetails {
    pub exists: bool,
    pub name: String,
    pub flag: Option<Flag>,
}

/// Immutable flag table produced by one load
#[derive(Debug, Clone)]
pub struct FlagSnapshot {
    flags: HashMap<String, Flag>,
    origin: FlagOrigin,
    loaded_at: DateTime<Utc>,
    generation: u64,
}

impl FlagSnapshot {
    fn from_rows(
        rows: Vec<FlagRow>,
        origin: FlagOrigin,
        at: DateTime<Utc>,
        generation: u64,
    ) -> Self {
        let mut flags = HashMap::with_capacity(rows.len());
        for row in rows {
            let name = row.name.clone();
            if flags
                .insert(name.clone(), Flag::from_row(row, origin, at))
                .is_some()
            {
                warn!(flag = %name, origin = %origin, "Duplicate flag row; last one wins");
            }
        }
        Self {
            flags,
            origin,
            loaded_at: at,
            generation,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Flag> {
        self.flags.get(name)
    }

    pub fn origin(&self) -> FlagOrigin {
        self.origin
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Number of flag writes that preceded the load producing this snapshot
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Configuration for the flag store
#[derive(Debug, Clone)]
pub struct FlagStoreConfig {
    /// Per-source fetch timeout (default: 5 seconds)
    pub fetch_timeout: Duration,
}

impl Default for FlagStoreConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

type InflightLoad = Shared<BoxFuture<'static, FlagOrigin>>;

struct Inner {
    config: FlagStoreConfig,
    remote: Option<Arc<dyn FlagSource>>,
    fallback: Option<Arc<dyn FlagSource>>,
    snapshot: RwLock<Option<Arc<FlagSnapshot>>>,
    inflight: Mutex<Option<InflightLoad>>,
    loads: AtomicU64,
    writes: AtomicU64,
}

/// Thread-safe flag store. Cloning is cheap and shares state.
#[derive(Clone)]
pub struct FlagStore {
    inner: Arc<Inner>,
}

impl FlagStore {
    pub fn new(
        config: FlagStoreConfig,
        remote: Option<Arc<dyn FlagSource>>,
        fallback: Option<Arc<dyn FlagSource>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                remote,
                fallback,
                snapshot: RwLock::new(None),
                inflight: Mutex::new(None),
                loads: AtomicU64::new(0),
                writes: AtomicU64::new(0),
            }),
        }
    }

    /// Load the flag table. Never fails: the worst case is the hardcoded table.
    pub async fn load(&self) -> FlagOrigin {
        self.refresh().await
    }

    /// Reload the flag table, joining an in-flight load if one exists
    pub async fn refresh(&self) -> FlagOrigin {
        let load = {
            let mut inflight = self
                .inner
                .inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match inflight.as_ref() {
                Some(load) => {
                    debug!("Joining in-flight flag load");
                    load.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let load = async move {
                        let origin = inner.load_once().await;
                        inner
                            .inflight
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .take();
                        origin
                    }
                    .boxed()
                    .shared();
                    *inflight = Some(load.clone());
                    load
                }
            }
        };

        load.await
    }

    /// Read a flag. Returns `default` before the first load completes or when
    /// the name is unknown.
    pub fn get(&self, name: &str, default: bool) -> bool {
        let Some(snapshot) = self.snapshot() else {
            warn!(flag = %name, default, "Flags not loaded yet; using default");
            return default;
        };

        match snapshot.get(name) {
            Some(flag) => flag.enabled,
            None => {
                debug!(flag = %name, default, "Unknown flag; using default");
                default
            }
        }
    }

    /// Convenience for `get(name, false)`
    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name, false)
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Origin of the current table, if loaded
    pub fn origin(&self) -> Option<FlagOrigin> {
        self.snapshot().map(|s| s.origin())
    }

    /// Number of completed loads since construction
    pub fn load_count(&self) -> u64 {
        self.inner.loads.load(Ordering::Relaxed)
    }

    /// The current snapshot
    pub fn snapshot(&self) -> Option<Arc<FlagSnapshot>> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every flag with metadata, sorted by name
    pub fn all_flags(&self) -> BTreeMap<String, Flag> {
        self.snapshot()
            .map(|s| {
                s.flags
                    .iter()
                    .map(|(name, flag)| (name.clone(), flag.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn details(&self, name: &str) -> FlagDetails {
        let flag = self.snapshot().and_then(|s| s.get(name).cloned());
        FlagDetails {
            exists: flag.is_some(),
            name: name.to_string(),
            flag,
        }
    }

    /// Write a flag through the remote source, then reload the whole table.
    ///
    /// The local table only ever reflects one source: if the reload cannot reach
    /// the remote, the written value is not visible until a later refresh. Loads
    /// already in flight when the write lands are not installed over the reload.
    /// Returns the flag as it reads after the reload, or as written when the
    /// reloaded table lacks it.
    ///
    /// Authorization is the caller's job; see `HiContext::set_flag`.
    pub async fn set_flag(&self, row: FlagRow) -> Result<Flag, FlagSourceError> {
        let remote = self
            .inner
            .remote
            .as_ref()
            .ok_or_else(|| FlagSourceError::Unavailable("no remote flag source".to_string()))?;

        remote.upsert(&row).await?;
        let generation = self.inner.writes.fetch_add(1, Ordering::SeqCst) + 1;
        info!(flag = %row.name, enabled = row.enabled, "Flag written");

        // Joining a load that began before the write is not enough
        let snapshot = loop {
            self.refresh().await;
            if let Some(snapshot) = self.snapshot().filter(|s| s.generation >= generation) {
                break snapshot;
            }
        };

        if snapshot.origin() != FlagOrigin::Remote {
            warn!(
                flag = %row.name,
                origin = %snapshot.origin(),
                "Reload after flag write did not reach the remote"
            );
        }

        Ok(snapshot
            .get(&row.name)
            .cloned()
            .unwrap_or_else(|| Flag::from_row(row, FlagOrigin::Remote, Utc::now())))
    }
}

impl Inner {
    async fn load_once(&self) -> FlagOrigin {
        let generation = self.writes.load(Ordering::SeqCst);
        let (rows, origin) = match self.fetch(self.remote.as_ref()).await {
            Ok(rows) => (rows, FlagOrigin::Remote),
            Err(e) => {
                warn!(error = %e, "Remote flag load failed; using fallback");
                match self.fetch(self.fallback.as_ref()).await {
                    Ok(rows) => (rows, FlagOrigin::Fallback),
                    Err(e) => {
                        warn!(error = %e, "Local flag fallback unavailable; using hardcoded defaults");
                        (hardcoded_defaults(), FlagOrigin::Hardcoded)
                    }
                }
            }
        };

        let snapshot = FlagSnapshot::from_rows(rows, origin, Utc::now(), generation);
        let count = snapshot.len();
        {
            let mut current = self
                .snapshot
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if current.as_ref().is_some_and(|s| s.generation > generation) {
                debug!(origin = %origin, generation, "Discarding flag load older than the last write");
            } else {
                *current = Some(Arc::new(snapshot));
            }
        }
        self.loads.fetch_add(1, Ordering::Relaxed);

        info!(origin = %origin, count, "Flags loaded");
        origin
    }

    async fn fetch(
        &self,
        source: Option<&Arc<dyn FlagSource>>,
    ) -> Result<Vec<FlagRow>, FlagSourceError> {
        let source =
            source.ok_or_else(|| FlagSourceError::Unavailable("not configured".to_string()))?;

        let timeout = self.config.fetch_timeout;
        let rows = tokio::time::timeout(timeout, source.fetch_all())
            .await
            .map_err(|_| FlagSourceError::Timeout(timeout))??;

        if rows.is_empty() {
            return Err(FlagSourceError::Empty);
        }

        debug!(source = source.name(), count = rows.len(), "Fetched flag rows");
        Ok(rows)
    }
}
