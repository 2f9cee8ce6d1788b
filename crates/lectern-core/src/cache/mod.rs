//! Content-addressed compilation cache.
//!
//! [`Cache::get_or_compute`] returns a cached value when every file it was
//! computed from is unchanged, and otherwise recomputes it. Concurrent
//! requests for the same key share a single in-flight computation.
//!
//! # Lookup order
//!
//! ```text
//! force_fresh ───────────────────────────────────────────────┐
//!                                                             ▼
//! memory / store ──► trust mode? ──► TTL ──► fingerprints ──► compute (single-flight)
//!       │                 │           │            │              │
//!     miss              hit      expired        stale        store entry
//! ```
//!
//! Storage failures never surface to the caller: a failed load is a miss and
//! a failed save only loses persistence.

mod entry;
mod observer;
mod store;

pub use entry::{CacheEntry, next_created_time, now_millis};
pub use observer::{CacheEvent, CacheObserver, MissReason, TracingObserver};
pub use store::{CacheStore, JsonFileStore, PersistedEntry};

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use tokio::sync::OnceCell;

use crate::error::{Error, Result};
use crate::fingerprint::{FingerprintStore, Freshness, TrackedFile};
use crate::hash::ContentHash;
use crate::lock_recover;

/// Identity of a cached file: `file:<absolutePath>`, optionally suffixed
/// with `:<contentHash>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    path: PathBuf,
    content_hash: Option<ContentHash>,
}

impl CacheKey {
    /// Key addressed by path only.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            content_hash: None,
        }
    }

    /// Key addressed by path and the file's current content hash.
    pub async fn strict(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::read(&path, &e))?;
        Ok(Self {
            content_hash: Some(ContentHash::of(&bytes)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_hash(&self) -> Option<&ContentHash> {
        self.content_hash.as_ref()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file:{}", self.path.display())?;
        if let Some(hash) = &self.content_hash {
            write!(f, ":{}", hash)?;
        }
        Ok(())
    }
}

/// Per-call cache options.
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// Maximum age of an entry. `None` keeps entries until their files change.
    pub ttl: Option<Duration>,

    /// How long past its TTL an entry may still be served if recomputing fails.
    pub stale_while_revalidate: Duration,

    /// Skip every check and recompute.
    pub force_fresh: bool,
}

impl CacheOptions {
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_stale_while_revalidate(mut self, window: Duration) -> Self {
        self.stale_while_revalidate = window;
        self
    }

    pub fn with_force_fresh(mut self, force_fresh: bool) -> Self {
        self.force_fresh = force_fresh;
        self
    }
}

/// A freshly computed value and the extra files it was derived from.
///
/// The key's own file is always tracked; `dependencies` lists anything else
/// that was read (embedded excerpts, includes).
#[derive(Debug, Clone)]
pub struct Computed<V> {
    pub value: V,
    pub dependencies: Vec<TrackedFile>,
}

impl<V> Computed<V> {
    pub fn new(value: V) -> Self {
        Self {
            value,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<TrackedFile>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

type InFlight<V> = Arc<OnceCell<Result<V>>>;

/// Outcome of looking up a key before computing.
enum Lookup<V> {
    Hit(V),
    Miss {
        /// Value that may be served if the recompute fails.
        stale: Option<V>,
        /// Creation time of the entry that was rejected, if any.
        seen: Option<u64>,
    },
}

/// Get-or-compute cache keyed by file identity.
pub struct Cache<V> {
    entries: Mutex<FxHashMap<String, CacheEntry<V>>>,
    fingerprints: FingerprintStore,
    in_flight: Mutex<FxHashMap<String, InFlight<V>>>,

    /// Latest key stored for each file. A strict key replaces the entry
    /// stored under the file's previous content hash.
    current_keys: Mutex<FxHashMap<PathBuf, String>>,

    /// Serve any existing entry without checking files or TTL.
    trust_mode: bool,

    store: Option<Arc<dyn CacheStore<V>>>,
    observer: Arc<dyn CacheObserver>,
}

impl<V> Default for Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty in-memory cache.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
            fingerprints: FingerprintStore::new(),
            in_flight: Mutex::new(FxHashMap::default()),
            current_keys: Mutex::new(FxHashMap::default()),
            trust_mode: false,
            store: None,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Enable trust mode: existing entries are served without any
    /// staleness check. Only valid when source files never change.
    pub fn with_trust_mode(mut self, trust_mode: bool) -> Self {
        self.trust_mode = trust_mode;
        self
    }

    /// Back the cache with persistent storage.
    pub fn with_store(mut self, store: impl CacheStore<V> + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Replace the default tracing observer.
    pub fn with_observer(mut self, observer: impl CacheObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn trust_mode(&self) -> bool {
        self.trust_mode
    }

    /// The in-memory entry for a key, without validation.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        self.memory_entry(&key.to_string())
    }

    /// Number of in-memory entries.
    pub fn len(&self) -> usize {
        lock_recover(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop a key from memory and from persistent storage.
    pub async fn invalidate(&self, key: &CacheKey) {
        let key_str = key.to_string();
        {
            let mut current = lock_recover(&self.current_keys);
            if current.get(key.path()) == Some(&key_str) {
                current.remove(key.path());
            }
        }
        self.evict(&key_str).await;
    }

    /// Drop every in-memory entry. Persistent storage is left untouched.
    pub fn clear(&self) {
        lock_recover(&self.entries).clear();
        lock_recover(&self.current_keys).clear();
        self.fingerprints.clear();
    }

    /// Return the cached value for `key`, or compute, store and return it.
    ///
    /// At most one `compute` runs per key at a time; callers arriving while
    /// it runs receive its result.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &CacheKey,
        compute: F,
        options: &CacheOptions,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Computed<V>>>,
    {
        let key_str = key.to_string();

        let (stale, seen) = if options.force_fresh {
            self.emit(&key_str, CacheEvent::Miss(MissReason::ForceFresh));
            (None, None)
        } else {
            match self.lookup(&key_str).await {
                Lookup::Hit(value) => return Ok(value),
                Lookup::Miss { stale, seen } => (stale, seen),
            }
        };

        let (cell, joined) = {
            let mut flights = lock_recover(&self.in_flight);
            match flights.get(&key_str) {
                Some(cell) => (cell.clone(), true),
                None => {
                    let cell: InFlight<V> = Arc::new(OnceCell::new());
                    flights.insert(key_str.clone(), cell.clone());
                    (cell, false)
                }
            }
        };
        if joined {
            self.emit(&key_str, CacheEvent::Joined);
        }

        let result = cell
            .get_or_init(|| self.compute_and_store(key, &key_str, seen, compute, options))
            .await
            .clone();

        {
            let mut flights = lock_recover(&self.in_flight);
            if flights
                .get(&key_str)
                .is_some_and(|current| Arc::ptr_eq(current, &cell))
            {
                flights.remove(&key_str);
            }
        }

        match result {
            Ok(value) => Ok(value),
            Err(err) => match stale {
                Some(value) => {
                    self.emit(&key_str, CacheEvent::ServedStale);
                    Ok(value)
                }
                None => Err(err),
            },
        }
    }

    async fn lookup(&self, key_str: &str) -> Lookup<V> {
        let entry = match self.memory_entry(key_str) {
            Some(entry) => Some(entry),
            None => self.restore(key_str).await,
        };

        let Some(entry) = entry else {
            self.emit(key_str, CacheEvent::Miss(MissReason::NotCached));
            return Lookup::Miss {
                stale: None,
                seen: None,
            };
        };

        if self.trust_mode {
            self.emit(key_str, CacheEvent::TrustedHit);
            return Lookup::Hit(entry.value);
        }

        let seen = Some(entry.created_time_millis);
        let now = now_millis();
        if !entry.is_fresh_at(now) {
            self.emit(key_str, CacheEvent::Miss(MissReason::Expired));
            let stale = entry.is_servable_stale_at(now).then_some(entry.value);
            return Lookup::Miss { stale, seen };
        }

        match self.fingerprints.check(key_str).await {
            Freshness::Fresh => {
                self.emit(key_str, CacheEvent::Hit);
                Lookup::Hit(entry.value)
            }
            Freshness::Untracked => {
                self.emit(key_str, CacheEvent::Miss(MissReason::Untracked));
                Lookup::Miss { stale: None, seen }
            }
            Freshness::Stale(path) => {
                self.emit(key_str, CacheEvent::Miss(MissReason::Changed(path)));
                Lookup::Miss { stale: None, seen }
            }
        }
    }

    async fn compute_and_store<F, Fut>(
        &self,
        key: &CacheKey,
        key_str: &str,
        seen: Option<u64>,
        compute: F,
        options: &CacheOptions,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Computed<V>>>,
    {
        // Another caller may have stored a newer entry between our lookup
        // and taking the in-flight slot.
        if !options.force_fresh
            && let Some(entry) = self.memory_entry(key_str)
            && Some(entry.created_time_millis) != seen
            && entry.is_fresh_at(now_millis())
        {
            self.emit(key_str, CacheEvent::Hit);
            return Ok(entry.value);
        }

        let primary = TrackedFile::capture(key.path()).await.ok().map(|(t, _)| t);

        let started = Instant::now();
        let computed = match compute().await {
            Ok(computed) => computed,
            Err(err) => {
                self.emit(
                    key_str,
                    CacheEvent::ComputeFailed {
                        message: err.to_string(),
                    },
                );
                return Err(err);
            }
        };
        self.emit(
            key_str,
            CacheEvent::Computed {
                elapsed: started.elapsed(),
            },
        );

        let entry = {
            let mut entries = lock_recover(&self.entries);
            let created = next_created_time(entries.get(key_str).map(|e| e.created_time_millis));
            let entry = CacheEntry::new(
                computed.value.clone(),
                created,
                options.ttl,
                options.stale_while_revalidate,
            );
            entries.insert(key_str.to_string(), entry.clone());
            entry
        };

        // Fingerprints are replaced after the entry: a reader in between sees
        // the new value with old fingerprints and at worst recomputes.
        let tracked = match primary {
            Some(primary) => {
                let mut tracked = vec![primary];
                for dep in computed.dependencies {
                    if !tracked.iter().any(|t| t.path() == dep.path()) {
                        tracked.push(dep);
                    }
                }
                self.fingerprints.replace(key_str, tracked.clone());
                tracked
            }
            None => {
                self.fingerprints.remove(key_str);
                Vec::new()
            }
        };

        self.emit(
            key_str,
            CacheEvent::Stored {
                created_time_millis: entry.created_time_millis,
            },
        );

        self.persist(PersistedEntry {
            key: key_str.to_string(),
            entry,
            tracked,
        })
        .await;

        let superseded = lock_recover(&self.current_keys)
            .insert(key.path().to_path_buf(), key_str.to_string())
            .filter(|previous| previous != key_str);
        if let Some(previous) = superseded {
            self.evict(&previous).await;
            self.emit(
                &previous,
                CacheEvent::Superseded {
                    by: key_str.to_string(),
                },
            );
        }

        Ok(computed.value)
    }

    /// Remove a key from memory, fingerprints and persistent storage.
    async fn evict(&self, key_str: &str) {
        lock_recover(&self.entries).remove(key_str);
        self.fingerprints.remove(key_str);

        let Some(store) = self.store.clone() else {
            return;
        };
        let task_key = key_str.to_string();
        let result = tokio::task::spawn_blocking(move || store.remove(&task_key))
            .await
            .map_err(|e| Error::Task(e.to_string()))
            .and_then(|r| r);
        if let Err(e) = result {
            self.emit(key_str, CacheEvent::PersistFailed { message: e.to_string() });
        }
    }

    fn memory_entry(&self, key_str: &str) -> Option<CacheEntry<V>> {
        lock_recover(&self.entries).get(key_str).cloned()
    }

    async fn restore(&self, key_str: &str) -> Option<CacheEntry<V>> {
        let store = self.store.clone()?;
        let task_key = key_str.to_string();
        let loaded = tokio::task::spawn_blocking(move || store.load(&task_key))
            .await
            .map_err(|e| Error::Task(e.to_string()))
            .and_then(|r| r);

        match loaded {
            Ok(Some(persisted)) => {
                let entry = persisted.entry.clone();
                let inserted = {
                    let mut entries = lock_recover(&self.entries);
                    if entries.contains_key(key_str) {
                        false
                    } else {
                        entries.insert(key_str.to_string(), persisted.entry);
                        true
                    }
                };
                if inserted {
                    self.fingerprints.replace(key_str, persisted.tracked);
                    self.emit(key_str, CacheEvent::Restored);
                    Some(entry)
                } else {
                    self.memory_entry(key_str)
                }
            }
            Ok(None) => None,
            Err(e) => {
                self.emit(key_str, CacheEvent::LoadFailed { message: e.to_string() });
                None
            }
        }
    }

    async fn persist(&self, persisted: PersistedEntry<V>) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let key = persisted.key.clone();
        let result = tokio::task::spawn_blocking(move || store.save(&persisted))
            .await
            .map_err(|e| Error::Task(e.to_string()))
            .and_then(|r| r);
        if let Err(e) = result {
            self.emit(&key, CacheEvent::PersistFailed { message: e.to_string() });
        }
    }

    fn emit(&self, key: &str, event: CacheEvent) {
        self.observer.on_event(key, &event);
    }
}
