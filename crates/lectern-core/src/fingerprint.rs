//! File fingerprints and change detection.
//!
//! A [`FileFingerprint`] (size + modification time) is a cheap proxy for file
//! content. It is checked on every cache access; the full [`ContentHash`] is
//! only recomputed when the fingerprint says the file may have changed.
//!
//! ```text
//! stat(path) ──► same size & mtime? ──yes──► Fresh
//!                      │ no
//!                      ▼
//!              hash(read(path)) ──► same hash? ──yes──► Fresh (fingerprint refreshed)
//!                                        │ no
//!                                        ▼
//!                                      Stale
//! ```

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::UNIX_EPOCH;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;
use crate::lock_recover;

/// Tolerance for modification-time comparison, absorbing float rounding
/// between clock sources.
pub const MTIME_EPSILON_MILLIS: f64 = 0.001;

/// Cheap staleness proxy for a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFingerprint {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified_time_millis: f64,
}

impl FileFingerprint {
    /// Build a fingerprint from already-fetched metadata.
    pub fn from_metadata(path: impl Into<PathBuf>, metadata: &Metadata) -> Self {
        let modified_time_millis = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0);

        Self {
            path: path.into(),
            size_bytes: metadata.len(),
            modified_time_millis,
        }
    }

    /// Stat a file.
    pub async fn read(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        Ok(Self::from_metadata(path, &metadata))
    }

    /// Whether two fingerprints describe the same file state.
    pub fn matches(&self, other: &FileFingerprint) -> bool {
        self.size_bytes == other.size_bytes
            && (self.modified_time_millis - other.modified_time_millis).abs()
                <= MTIME_EPSILON_MILLIS
    }
}

/// Last known state of one file a cache entry depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedFile {
    pub fingerprint: FileFingerprint,
    pub content_hash: ContentHash,

    /// The file did not exist or could not be stat'ed when captured; it
    /// stays fresh for as long as that remains true.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub missing: bool,
}

/// Outcome of re-checking a single tracked file.
#[derive(Debug, Clone, PartialEq)]
enum Probe {
    /// Fingerprint matches.
    Same,
    /// Fingerprint moved but the bytes hash the same.
    Touched(TrackedFile),
    /// Content differs or the file is gone.
    Changed,
}

impl TrackedFile {
    /// Pair a fingerprint with the bytes that were read under it.
    pub fn from_bytes(fingerprint: FileFingerprint, bytes: &[u8]) -> Self {
        Self {
            fingerprint,
            content_hash: ContentHash::of(bytes),
            missing: false,
        }
    }

    /// Track a file that does not currently exist.
    pub fn absent(path: impl Into<PathBuf>) -> Self {
        Self {
            fingerprint: FileFingerprint {
                path: path.into(),
                size_bytes: 0,
                modified_time_millis: 0.0,
            },
            content_hash: ContentHash::of(b""),
            missing: true,
        }
    }

    /// Stat and read a file, returning its tracked state and bytes.
    ///
    /// The stat happens before the read, so a write racing with the read
    /// leaves an older fingerprint behind and is caught on the next check.
    pub async fn capture(path: impl AsRef<Path>) -> io::Result<(Self, Vec<u8>)> {
        let path = path.as_ref();
        let fingerprint = FileFingerprint::read(path).await?;
        let bytes = tokio::fs::read(path).await?;
        Ok((Self::from_bytes(fingerprint, &bytes), bytes))
    }

    pub fn path(&self) -> &Path {
        &self.fingerprint.path
    }

    async fn probe(&self) -> Probe {
        let current = match FileFingerprint::read(self.path()).await {
            Ok(_) if self.missing => return Probe::Changed,
            Ok(fp) => fp,
            Err(_) if self.missing => return Probe::Same,
            Err(_) => return Probe::Changed,
        };

        if current.matches(&self.fingerprint) {
            return Probe::Same;
        }

        match tokio::fs::read(self.path()).await {
            Ok(bytes) if ContentHash::of(&bytes) == self.content_hash => {
                Probe::Touched(TrackedFile {
                    fingerprint: current,
                    content_hash: self.content_hash.clone(),
                    missing: false,
                })
            }
            _ => Probe::Changed,
        }
    }
}

/// Result of checking every file tracked for a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Freshness {
    /// All tracked files are unchanged.
    Fresh,
    /// Nothing is tracked for the key.
    Untracked,
    /// The given file changed, disappeared or became unreadable.
    Stale(PathBuf),
}

/// Per-key record of the files a cached value was computed from.
#[derive(Debug, Default)]
pub struct FingerprintStore {
    entries: Mutex<FxHashMap<String, Vec<TrackedFile>>>,
}

impl FingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracked files for a key.
    pub fn get(&self, key: &str) -> Option<Vec<TrackedFile>> {
        lock_recover(&self.entries).get(key).cloned()
    }

    /// Replace the tracked files for a key.
    pub fn replace(&self, key: &str, tracked: Vec<TrackedFile>) {
        lock_recover(&self.entries).insert(key.to_string(), tracked);
    }

    pub fn remove(&self, key: &str) {
        lock_recover(&self.entries).remove(key);
    }

    pub fn clear(&self) {
        lock_recover(&self.entries).clear();
    }

    /// Check every file tracked for `key`.
    ///
    /// Files whose fingerprint moved without a content change get their
    /// fingerprint refreshed so the next check is cheap again.
    pub async fn check(&self, key: &str) -> Freshness {
        let Some(tracked) = self.get(key) else {
            return Freshness::Untracked;
        };

        let mut refreshed = Vec::with_capacity(tracked.len());
        let mut touched = false;

        for file in &tracked {
            match file.probe().await {
                Probe::Same => refreshed.push(file.clone()),
                Probe::Touched(updated) => {
                    tracing::debug!(
                        "Fingerprint moved without content change: {}",
                        file.path().display()
                    );
                    touched = true;
                    refreshed.push(updated);
                }
                Probe::Changed => return Freshness::Stale(file.path().to_path_buf()),
            }
        }

        if touched {
            self.replace(key, refreshed);
        }

        Freshness::Fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn bump_mtime(path: &Path, secs: u64) {
        let file = fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(secs))
            .unwrap();
    }

    #[tokio::test]
    async fn test_fingerprint_matches_itself() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.ts");
        fs::write(&path, "export {}").unwrap();

        let a = FileFingerprint::read(&path).await.unwrap();
        let b = FileFingerprint::read(&path).await.unwrap();
        assert!(a.matches(&b));
        assert_eq!(a.size_bytes, 9);
    }

    #[test]
    fn test_fingerprint_epsilon() {
        let base = FileFingerprint {
            path: PathBuf::from("a"),
            size_bytes: 10,
            modified_time_millis: 1_000.0,
        };
        let jitter = FileFingerprint {
            modified_time_millis: 1_000.0005,
            ..base.clone()
        };
        let moved = FileFingerprint {
            modified_time_millis: 1_001.0,
            ..base.clone()
        };
        let resized = FileFingerprint {
            size_bytes: 11,
            ..base.clone()
        };

        assert!(base.matches(&jitter));
        assert!(!base.matches(&moved));
        assert!(!base.matches(&resized));
    }

    #[tokio::test]
    async fn test_store_untracked_key() {
        let store = FingerprintStore::new();
        assert_eq!(store.check("file:/nope").await, Freshness::Untracked);
    }

    #[tokio::test]
    async fn test_store_detects_modification() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lesson.mdx");
        fs::write(&path, "# One").unwrap();

        let store = FingerprintStore::new();
        let (tracked, _) = TrackedFile::capture(&path).await.unwrap();
        store.replace("k", vec![tracked]);
        assert_eq!(store.check("k").await, Freshness::Fresh);

        fs::write(&path, "# Two!").unwrap();
        assert_eq!(store.check("k").await, Freshness::Stale(path.clone()));
    }

    #[tokio::test]
    async fn test_store_touch_without_change_is_fresh() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lesson.mdx");
        fs::write(&path, "# Same").unwrap();

        let store = FingerprintStore::new();
        let (tracked, _) = TrackedFile::capture(&path).await.unwrap();
        store.replace("k", vec![tracked.clone()]);

        bump_mtime(&path, 5);
        assert_eq!(store.check("k").await, Freshness::Fresh);

        // The refreshed fingerprint is stored for the next check.
        let refreshed = store.get("k").unwrap();
        assert!(!refreshed[0].fingerprint.matches(&tracked.fingerprint));
        assert_eq!(refreshed[0].content_hash, tracked.content_hash);
    }

    #[tokio::test]
    async fn test_store_deleted_file_is_stale() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gone.ts");
        fs::write(&path, "x").unwrap();

        let store = FingerprintStore::new();
        let (tracked, _) = TrackedFile::capture(&path).await.unwrap();
        store.replace("k", vec![tracked]);

        fs::remove_file(&path).unwrap();
        assert!(matches!(store.check("k").await, Freshness::Stale(_)));
    }

    #[tokio::test]
    async fn test_absent_file_goes_stale_when_created() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("later.ts");

        let store = FingerprintStore::new();
        store.replace("k", vec![TrackedFile::absent(&path)]);
        assert_eq!(store.check("k").await, Freshness::Fresh);

        fs::write(&path, "now here").unwrap();
        assert_eq!(store.check("k").await, Freshness::Stale(path.clone()));
    }
}
