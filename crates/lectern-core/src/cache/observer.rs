//! Cache instrumentation.
//!
//! Observers see every decision the cache makes but cannot influence it.

use std::path::PathBuf;
use std::time::Duration;

/// Why a lookup did not return a cached value.
#[derive(Debug, Clone, PartialEq)]
pub enum MissReason {
    /// The caller asked for a fresh value.
    ForceFresh,
    /// No entry exists for the key.
    NotCached,
    /// The entry outlived its TTL.
    Expired,
    /// No fingerprints were recorded for the key.
    Untracked,
    /// A tracked file changed.
    Changed(PathBuf),
}

/// Something the cache did for a key.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    /// Served a validated entry.
    Hit,
    /// Served an entry without validation (trust mode).
    TrustedHit,
    /// The entry could not be served.
    Miss(MissReason),
    /// Joined a computation already in flight for the key.
    Joined,
    /// Ran the compute function.
    Computed { elapsed: Duration },
    /// The compute function failed.
    ComputeFailed { message: String },
    /// Served an expired entry because the fresh compute failed.
    ServedStale,
    /// Stored a new entry.
    Stored { created_time_millis: u64 },
    /// Dropped because a newer key for the same file was stored.
    Superseded { by: String },
    /// Restored an entry from persistent storage.
    Restored,
    /// Reading persistent storage failed (treated as a miss).
    LoadFailed { message: String },
    /// Writing persistent storage failed (the value is still served).
    PersistFailed { message: String },
}

/// Receives cache events.
pub trait CacheObserver: Send + Sync {
    fn on_event(&self, key: &str, event: &CacheEvent);
}

/// Observer that forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CacheObserver for TracingObserver {
    fn on_event(&self, key: &str, event: &CacheEvent) {
        match event {
            CacheEvent::LoadFailed { message } | CacheEvent::PersistFailed { message } => {
                tracing::warn!("Cache storage failure for {}: {}", key, message);
            }
            CacheEvent::ComputeFailed { message } => {
                tracing::debug!("Compute failed for {}: {}", key, message);
            }
            CacheEvent::Computed { elapsed } => {
                tracing::debug!("Computed {} in {:?}", key, elapsed);
            }
            other => tracing::trace!("Cache {}: {:?}", key, other),
        }
    }
}
