//! Cached document compilation.
//!
//! A compile reads the document, parses it, expands embed directives and
//! serializes the resulting tree. Results are cached per document; the cache
//! tracks the document itself plus every file an embed read, so editing an
//! excerpt source recompiles every document that shows it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use lectern_core::{Cache, CacheKey, CacheObserver, CacheOptions, Computed, JsonFileStore};
use serde::{Deserialize, Serialize};

use crate::config::CompilerConfig;
use crate::document::parse_document;
use crate::embed::{
    DriftLedger, EmbedContext, EmbeddedFiles, SourceFiles, collect_embed_paths,
    embed_source_excerpts,
};
use crate::error::{Error, Result};

/// Output of compiling one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledDocument {
    /// Serialized document tree (JSON)
    pub code: String,
    /// First top-level `#` heading, else the frontmatter `title`
    pub title: Option<String>,
    pub video_embed_urls: Vec<String>,
    /// Invalid-directive messages, `line N: message`
    pub errors: Vec<String>,
    /// Drift warnings, `line N: message`
    pub warnings: Vec<String>,
    pub frontmatter: BTreeMap<String, String>,
    pub embedded_files: EmbeddedFiles,
}

/// Per-call compile options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Ignore any cached result.
    pub force_fresh: bool,
}

impl CompileOptions {
    pub fn force_fresh() -> Self {
        Self { force_fresh: true }
    }
}

/// Compiles documents through a shared cache and drift ledger.
pub struct DocumentCompiler {
    config: CompilerConfig,
    cache: Cache<CompiledDocument>,
    drift: Arc<DriftLedger>,
}

impl DocumentCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self::with_drift_ledger(config, Arc::new(DriftLedger::new()))
    }

    /// Create a compiler that shares a drift ledger with other compilers.
    pub fn with_drift_ledger(config: CompilerConfig, drift: Arc<DriftLedger>) -> Self {
        let mut cache = Cache::new().with_trust_mode(config.trust_mode);
        if let Some(dir) = &config.cache_dir {
            tracing::debug!("Persisting compiled documents to {}", dir.display());
            cache = cache.with_store(JsonFileStore::new(dir));
        }

        Self {
            config,
            cache,
            drift,
        }
    }

    /// Report cache events to `observer` instead of the tracing log.
    pub fn with_observer(mut self, observer: impl CacheObserver + 'static) -> Self {
        self.cache = self.cache.with_observer(observer);
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn cache(&self) -> &Cache<CompiledDocument> {
        &self.cache
    }

    pub fn drift_ledger(&self) -> &Arc<DriftLedger> {
        &self.drift
    }

    /// Compile a document, reusing the cached result when nothing it was
    /// built from has changed.
    pub async fn compile(
        &self,
        path: impl AsRef<Path>,
        options: CompileOptions,
    ) -> Result<CompiledDocument> {
        let path = path.as_ref();
        let path = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| Error::read(path, &e))?;

        let key = if self.config.strict_content_keys {
            CacheKey::strict(&path).await?
        } else {
            CacheKey::file(&path)
        };
        let cache_options = CacheOptions::default()
            .with_ttl(self.config.ttl)
            .with_stale_while_revalidate(self.config.stale_while_revalidate)
            .with_force_fresh(options.force_fresh);

        self.cache
            .get_or_compute(&key, || compile_document(&path, &self.drift), &cache_options)
            .await
    }
}

/// Compile a document without caching.
///
/// Only an unreadable or unparseable document is an error; invalid
/// directives are reported inside the result.
pub async fn compile_document(
    path: &Path,
    drift: &DriftLedger,
) -> Result<Computed<CompiledDocument>> {
    let started = Instant::now();

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::read(path, &e))?;
    let source = String::from_utf8(bytes).map_err(|_| Error::Parse {
        path: path.to_path_buf(),
        message: "document is not valid UTF-8".to_string(),
    })?;
    let mut document = parse_document(&source).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let document_dir = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let sources = SourceFiles::preload(collect_embed_paths(&document, &document_dir)).await;
    let outcome = embed_source_excerpts(
        &mut document,
        &EmbedContext {
            document_dir: &document_dir,
            document_source: &source,
            sources: &sources,
            drift,
        },
    );

    let title = document
        .title()
        .or_else(|| document.frontmatter.get("title").cloned());
    let video_embed_urls = document.video_embed_urls();
    let code = serde_json::to_string(&document)?;

    tracing::info!(
        "Compiled {} in {:?} ({} embeds, {} errors, {} warnings)",
        path.display(),
        started.elapsed(),
        outcome.embedded,
        outcome.errors.len(),
        outcome.warnings.len()
    );

    let compiled = CompiledDocument {
        code,
        title,
        video_embed_urls,
        errors: outcome.errors,
        warnings: outcome.warnings,
        frontmatter: document.frontmatter,
        embedded_files: outcome.embedded_files,
    };
    Ok(Computed::new(compiled).with_dependencies(sources.tracked()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_compile_document_outputs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lesson.mdx");
        fs::write(
            &path,
            "---\ntitle: Fallback\n---\n# Real Title\n\n<VideoEmbed url=\"https://v/1\" />\n",
        )
        .unwrap();

        let computed = compile_document(&path, &DriftLedger::new()).await.unwrap();
        let compiled = computed.value;

        assert_eq!(compiled.title.as_deref(), Some("Real Title"));
        assert_eq!(compiled.video_embed_urls, vec!["https://v/1"]);
        assert!(compiled.errors.is_empty());
        assert!(computed.dependencies.is_empty());

        let tree: Document = serde_json::from_str(&compiled.code).unwrap();
        assert_eq!(tree.children.len(), 2);
    }

    #[tokio::test]
    async fn test_title_falls_back_to_frontmatter() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lesson.mdx");
        fs::write(&path, "---\ntitle: From Frontmatter\n---\nNo heading here.\n").unwrap();

        let compiled = compile_document(&path, &DriftLedger::new())
            .await
            .unwrap()
            .value;
        assert_eq!(compiled.title.as_deref(), Some("From Frontmatter"));
    }

    #[tokio::test]
    async fn test_unparseable_document_is_fatal() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lesson.mdx");
        fs::write(&path, "```ts\nnever closed\n").unwrap();

        let err = compile_document(&path, &DriftLedger::new()).await.unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[tokio::test]
    async fn test_missing_document_is_fatal() {
        let compiler = DocumentCompiler::new(CompilerConfig::development());
        let err = compiler
            .compile("/definitely/not/here.mdx", CompileOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }

    #[tokio::test]
    async fn test_embed_dependencies_are_tracked() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.ts"), "let a = 1\n").unwrap();
        let path = temp.path().join("lesson.mdx");
        fs::write(
            &path,
            "<EmbeddedFile file=\"a.ts\" />\n\n<EmbeddedFile file=\"missing.ts\" />\n",
        )
        .unwrap();

        let computed = compile_document(&path, &DriftLedger::new()).await.unwrap();

        assert_eq!(computed.dependencies.len(), 2);
        assert_eq!(computed.value.errors.len(), 1);
        assert_eq!(computed.value.embedded_files.invalid.len(), 1);
    }
}
