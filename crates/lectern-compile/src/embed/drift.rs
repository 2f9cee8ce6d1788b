//! Drift ledger for embedded excerpts.
//!
//! An embed is identified by its resolved path and declared ranges. Each
//! compile reports the hash of the sliced content; when it differs from the
//! last compile, the author gets a one-off warning to re-check the
//! `range`/`highlight` attributes. Restoring the previous content clears the
//! pending warning without a new one.

use std::path::Path;
use std::sync::Mutex;

use lectern_core::ContentHash;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::range::RangeSet;
use crate::lock_recover;

/// Identity of one embed directive: `sha256(resolvedPath + "\n" + ranges)`.
pub fn embed_identity(path: &Path, ranges: &RangeSet) -> ContentHash {
    let path = path.to_string_lossy();
    let ranges = ranges.to_string();
    ContentHash::of_parts([path.as_bytes(), b"\n".as_slice(), ranges.as_bytes()])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedDriftRecord {
    pub embed_identity: ContentHash,
    pub last_content_hash: ContentHash,
    /// Content hash from before the most recent change, while a warning is outstanding
    pub pending_warning_baseline: Option<ContentHash>,
}

/// What [`DriftLedger::observe`] saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftStatus {
    /// First sighting of this embed.
    New,
    Unchanged,
    /// Content differs from the previous compile; warn the author.
    Drifted,
    /// Content went back to the pre-change baseline.
    Resolved,
}

impl DriftStatus {
    pub fn should_warn(&self) -> bool {
        matches!(self, DriftStatus::Drifted)
    }
}

/// Process-wide record of embed content, shared by every compile.
#[derive(Debug, Default)]
pub struct DriftLedger {
    records: Mutex<FxHashMap<ContentHash, EmbedDriftRecord>>,
}

impl DriftLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current content hash for an embed.
    pub fn observe(&self, identity: &ContentHash, current: &ContentHash) -> DriftStatus {
        let mut records = lock_recover(&self.records);

        let Some(record) = records.get_mut(identity) else {
            records.insert(
                identity.clone(),
                EmbedDriftRecord {
                    embed_identity: identity.clone(),
                    last_content_hash: current.clone(),
                    pending_warning_baseline: None,
                },
            );
            return DriftStatus::New;
        };

        let status = if record.pending_warning_baseline.as_ref() == Some(current) {
            record.pending_warning_baseline = None;
            DriftStatus::Resolved
        } else if &record.last_content_hash != current {
            record.pending_warning_baseline = Some(record.last_content_hash.clone());
            DriftStatus::Drifted
        } else {
            DriftStatus::Unchanged
        };
        record.last_content_hash = current.clone();

        tracing::debug!(
            "Embed {} content {}: {:?}",
            identity.short(),
            current.short(),
            status
        );
        status
    }

    pub fn record(&self, identity: &ContentHash) -> Option<EmbedDriftRecord> {
        lock_recover(&self.records).get(identity).cloned()
    }

    pub fn len(&self) -> usize {
        lock_recover(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
