//! Compiler configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for [`DocumentCompiler`](crate::DocumentCompiler).
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerConfig {
    /// Directory for persisted compile results. `None` keeps the cache in memory only.
    pub cache_dir: Option<PathBuf>,

    /// Serve any cached entry without checking TTL or file fingerprints
    pub trust_mode: bool,

    /// Time to live for compiled documents (`None` = no expiry)
    pub ttl: Option<Duration>,

    /// Window after expiry during which an old result may stand in for a failed recompile
    pub stale_while_revalidate: Duration,

    /// Suffix cache keys with the document's content hash
    pub strict_content_keys: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            trust_mode: false,
            ttl: None,
            stale_while_revalidate: Duration::ZERO,
            strict_content_keys: false,
        }
    }
}

impl CompilerConfig {
    /// Config for authoring: every compile verifies file state.
    pub fn development() -> Self {
        Self::default()
    }

    /// Config for deployed content that never changes underneath the server.
    pub fn production() -> Self {
        Self {
            trust_mode: true,
            cache_dir: Some(PathBuf::from(".lectern/cache")),
            ..Default::default()
        }
    }

    /// Build a config from `LECTERN_*` environment variables.
    ///
    /// `LECTERN_ENV=production` starts from [`production()`](Self::production);
    /// `LECTERN_TRUST_CACHE`, `LECTERN_CACHE_DIR` and `LECTERN_CACHE_TTL_SECS`
    /// override individual fields. Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = match lookup("LECTERN_ENV").as_deref() {
            Some("production") => Self::production(),
            _ => Self::development(),
        };

        if let Some(value) = lookup("LECTERN_TRUST_CACHE") {
            match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.trust_mode = true,
                "0" | "false" | "no" => config.trust_mode = false,
                other => tracing::warn!("Ignoring LECTERN_TRUST_CACHE={}", other),
            }
        }

        if let Some(dir) = lookup("LECTERN_CACHE_DIR") {
            config.cache_dir = if dir.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }

        if let Some(secs) = lookup("LECTERN_CACHE_TTL_SECS") {
            match secs.trim().parse::<u64>() {
                Ok(0) => config.ttl = None,
                Ok(secs) => config.ttl = Some(Duration::from_secs(secs)),
                Err(_) => tracing::warn!("Ignoring LECTERN_CACHE_TTL_SECS={}", secs),
            }
        }

        config
    }

    /// Use a persistent cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_trust_mode(mut self, trust_mode: bool) -> Self {
        self.trust_mode = trust_mode;
        self
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_strict_content_keys(mut self, strict: bool) -> Self {
        self.strict_content_keys = strict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert!(!config.trust_mode);
        assert!(config.cache_dir.is_none());
        assert!(config.ttl.is_none());
    }

    #[test]
    fn test_production_config() {
        let config = CompilerConfig::production();
        assert!(config.trust_mode);
        assert!(config.cache_dir.is_some());
    }

    #[test]
    fn test_from_env_production() {
        let config = CompilerConfig::from_lookup(lookup(&[("LECTERN_ENV", "production")]));
        assert_eq!(config, CompilerConfig::production());
    }

    #[test]
    fn test_from_env_overrides() {
        let config = CompilerConfig::from_lookup(lookup(&[
            ("LECTERN_ENV", "production"),
            ("LECTERN_TRUST_CACHE", "false"),
            ("LECTERN_CACHE_DIR", "/tmp/lectern"),
            ("LECTERN_CACHE_TTL_SECS", "90"),
        ]));
        assert!(!config.trust_mode);
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/lectern")));
        assert_eq!(config.ttl, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_from_env_ignores_garbage() {
        let config = CompilerConfig::from_lookup(lookup(&[
            ("LECTERN_TRUST_CACHE", "maybe"),
            ("LECTERN_CACHE_TTL_SECS", "soon"),
        ]));
        assert_eq!(config, CompilerConfig::development());
    }
}
