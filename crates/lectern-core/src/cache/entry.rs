//! Cache entries and their validity windows.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A cached value and the window in which it may be served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_time_millis: u64,

    /// `None` means the entry never expires by age.
    pub ttl_millis: Option<u64>,

    #[serde(default)]
    pub stale_while_revalidate_millis: u64,
}

impl<V> CacheEntry<V> {
    /// Create an entry stamped with `created_time_millis`.
    pub fn new(
        value: V,
        created_time_millis: u64,
        ttl: Option<Duration>,
        stale_while_revalidate: Duration,
    ) -> Self {
        Self {
            value,
            created_time_millis,
            ttl_millis: ttl.map(|d| d.as_millis() as u64),
            stale_while_revalidate_millis: stale_while_revalidate.as_millis() as u64,
        }
    }

    /// Whether the entry is inside its TTL at `now`.
    pub fn is_fresh_at(&self, now: u64) -> bool {
        match self.ttl_millis {
            None => true,
            Some(ttl) => now < self.created_time_millis.saturating_add(ttl),
        }
    }

    /// Whether the entry is past its TTL but still inside the
    /// stale-while-revalidate window at `now`.
    pub fn is_servable_stale_at(&self, now: u64) -> bool {
        match self.ttl_millis {
            None => true,
            Some(ttl) => {
                now < self
                    .created_time_millis
                    .saturating_add(ttl)
                    .saturating_add(self.stale_while_revalidate_millis)
            }
        }
    }
}

/// Creation stamp for an entry replacing one created at `previous`.
///
/// Always strictly newer than the replaced entry, even when both land in
/// the same millisecond.
pub fn next_created_time(previous: Option<u64>) -> u64 {
    let now = now_millis();
    match previous {
        Some(prev) if now <= prev => prev + 1,
        _ => now,
    }
}
