//! Per-compile arena of files referenced by embed directives.
//!
//! Every referenced file is read once, up front, before the synchronous
//! document transform runs. The arena is dropped with the compile, so no
//! file content outlives the result it was used for.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lectern_core::TrackedFile;
use rustc_hash::FxHashMap;

/// A source file read for embedding.
#[derive(Debug, Clone)]
pub struct SourceText {
    pub path: PathBuf,
    /// Content with `\r\n` normalized to `\n`
    pub text: String,
    pub tracked: TrackedFile,
}

impl SourceText {
    pub fn lines(&self) -> Vec<&str> {
        self.text.lines().collect()
    }

    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

/// Files loaded for one compile, keyed by resolved path.
#[derive(Debug, Default)]
pub struct SourceFiles {
    files: FxHashMap<PathBuf, Loaded>,
}

#[derive(Debug)]
enum Loaded {
    Ok(Arc<SourceText>),
    Failed { reason: String, tracked: TrackedFile },
}

impl SourceFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every path. Failures are recorded, not returned.
    pub async fn preload(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut files = Self::new();
        for path in paths {
            files.load(path).await;
        }
        files
    }

    /// Read one file into the arena if it isn't there yet.
    pub async fn load(&mut self, path: PathBuf) {
        if self.files.contains_key(&path) {
            return;
        }

        let loaded = match TrackedFile::capture(&path).await {
            Ok((tracked, bytes)) => match String::from_utf8(bytes) {
                Ok(text) => Loaded::Ok(Arc::new(SourceText {
                    path: path.clone(),
                    text: normalize_newlines(text),
                    tracked,
                })),
                Err(_) => Loaded::Failed {
                    reason: "file is not valid UTF-8".to_string(),
                    tracked,
                },
            },
            Err(e) => {
                tracing::debug!("Embedded file unreadable: {} ({})", path.display(), e);
                Loaded::Failed {
                    reason: e.to_string(),
                    tracked: TrackedFile::absent(&path),
                }
            }
        };

        self.files.insert(path, loaded);
    }

    /// Content of a loaded file, or the reason it could not be read.
    pub fn get(&self, path: &Path) -> Result<Arc<SourceText>, String> {
        match self.files.get(path) {
            Some(Loaded::Ok(source)) => Ok(Arc::clone(source)),
            Some(Loaded::Failed { reason, .. }) => Err(reason.clone()),
            None => Err("file was not loaded".to_string()),
        }
    }

    /// Tracked state of every file touched, readable or not.
    pub fn tracked(&self) -> Vec<TrackedFile> {
        let mut tracked: Vec<TrackedFile> = self
            .files
            .values()
            .map(|loaded| match loaded {
                Loaded::Ok(source) => source.tracked.clone(),
                Loaded::Failed { tracked, .. } => tracked.clone(),
            })
            .collect();
        tracked.sort_by(|a, b| a.path().cmp(b.path()));
        tracked
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn normalize_newlines(text: String) -> String {
    if text.contains('\r') {
        text.replace("\r\n", "\n")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_preload_reads_and_normalizes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.ts");
        fs::write(&path, "one\r\ntwo\r\n").unwrap();

        let files = SourceFiles::preload([path.clone(), path.clone()]).await;
        let source = files.get(&path).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(source.text, "one\ntwo\n");
        assert_eq!(source.line_count(), 2);
        assert!(!source.tracked.missing);
    }

    #[tokio::test]
    async fn test_missing_file_is_tracked_as_absent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nope.ts");

        let files = SourceFiles::preload([path.clone()]).await;

        assert!(files.get(&path).is_err());
        let tracked = files.tracked();
        assert_eq!(tracked.len(), 1);
        assert!(tracked[0].missing);
    }

    #[tokio::test]
    async fn test_non_utf8_file_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bin.dat");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let files = SourceFiles::preload([path.clone()]).await;
        assert_eq!(files.get(&path).unwrap_err(), "file is not valid UTF-8");
    }
}
