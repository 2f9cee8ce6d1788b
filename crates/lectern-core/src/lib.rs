//! Core building blocks for the Lectern content pipeline.
//!
//! This crate provides:
//! - Content hashing of source files
//! - File fingerprints (size + mtime) as a cheap staleness proxy
//! - A get-or-compute cache with single-flight de-duplication, TTLs,
//!   trust mode and optional JSON persistence

pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod hash;

pub use cache::{
    Cache, CacheEntry, CacheEvent, CacheKey, CacheObserver, CacheOptions, CacheStore, Computed,
    JsonFileStore, MissReason, PersistedEntry, TracingObserver,
};
pub use error::{Error, Result};
pub use fingerprint::{FileFingerprint, FingerprintStore, Freshness, TrackedFile};
pub use hash::ContentHash;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Every map guarded this way is only ever replaced entry-by-entry, so a
/// panic mid-update cannot leave a half-written value behind.
pub(crate) fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
