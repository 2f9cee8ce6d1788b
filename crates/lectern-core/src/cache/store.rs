//! Persistent backing for the compilation cache.
//!
//! Entries are written as one JSON document per key. Writes go to a temp
//! file first and are renamed into place so a crash never leaves a torn
//! entry behind.

use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::entry::CacheEntry;
use crate::error::{Error, Result};
use crate::fingerprint::TrackedFile;
use crate::hash::ContentHash;

/// A cache entry together with the file state it was computed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEntry<V> {
    pub key: String,
    pub entry: CacheEntry<V>,
    pub tracked: Vec<TrackedFile>,
}

/// Storage behind the in-memory cache map.
///
/// Implementations are called from blocking worker threads. Every error is
/// treated by the cache as a miss.
pub trait CacheStore<V>: Send + Sync {
    /// Load the entry for `key`, `Ok(None)` when nothing is stored.
    fn load(&self, key: &str) -> Result<Option<PersistedEntry<V>>>;

    /// Store (replace) the entry for its key.
    fn save(&self, entry: &PersistedEntry<V>) -> Result<()>;

    /// Remove the entry for `key` if present.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Stores entries as JSON files under a directory.
pub struct JsonFileStore<V> {
    dir: PathBuf,
    _value: PhantomData<fn() -> V>,
}

impl<V> JsonFileStore<V> {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            _value: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds the entry for `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", ContentHash::of(key)))
    }
}

impl<V> CacheStore<V> for JsonFileStore<V>
where
    V: Serialize + DeserializeOwned,
{
    fn load(&self, key: &str) -> Result<Option<PersistedEntry<V>>> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::cache_io(&path, &e)),
        };

        let persisted: PersistedEntry<V> = serde_json::from_slice(&bytes)?;

        // Two keys hashing to the same file name would be a bug, not a hit.
        if persisted.key != key {
            return Ok(None);
        }

        Ok(Some(persisted))
    }

    fn save(&self, entry: &PersistedEntry<V>) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::cache_io(&self.dir, &e))?;

        let bytes = serde_json::to_vec(entry)?;
        let path = self.entry_path(&entry.key);
        let temp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).map_err(|e| Error::cache_io(&temp_path, &e))?;
        file.write_all(&bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| Error::cache_io(&temp_path, &e))?;

        fs::rename(&temp_path, &path).map_err(|e| Error::cache_io(&path, &e))?;

        tracing::debug!("Persisted cache entry {} ({} bytes)", entry.key, bytes.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::cache_io(&path, &e)),
        }
    }
}
