//! strata: Repository indexing for code-intelligence consumers.
//!
//! [`Repository`] composes the scanning, extraction, caching, and
//! dependency-analysis components behind one query API: file tree,
//! per-file symbols (cache-first), and per-language dependency graphs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use strata_core::{
    CacheConfig, FileEntry, LanguageId, ScanConfig, StrataConfig, StrataError, Symbol, SymbolKind,
};
pub use strata_graph::{
    ContextFormat, DependencyAnalyzer, DependencyGraph, DependencyKind, DependencyNode,
    ExportFormat, GoDependencyAnalyzer, PythonDependencyAnalyzer, RustDependencyAnalyzer,
};
pub use strata_index::{
    CacheStats, Capture, CapturedNode, GitAwareFileTree, IncrementalCache, NameStyle,
    ParserProvider, StructuralMatch, SymbolExtractionEngine, TreeSitterProvider,
};

/// Languages with a registered dependency analyzer.
pub const ANALYZER_LANGUAGES: &[&str] = &["go", "python", "rust"];

/// The repository facade. One instance owns the incremental cache for its
/// root; a non-existent root is accepted and degrades to empty results.
pub struct Repository {
    root: PathBuf,
    config: StrataConfig,
    tree: GitAwareFileTree,
    engine: SymbolExtractionEngine,
    cache: IncrementalCache,
}

impl Repository {
    /// Open a repository with its persisted configuration (or defaults).
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config = StrataConfig::load_or_default(&root);
        Self::with_config(root, config)
    }

    pub fn with_config(root: impl Into<PathBuf>, config: StrataConfig) -> Self {
        Self::with_provider(root, config, Arc::new(TreeSitterProvider::new()))
    }

    /// Open with a custom parser provider (the extraction boundary is
    /// pluggable).
    pub fn with_provider(
        root: impl Into<PathBuf>,
        config: StrataConfig,
        provider: Arc<dyn ParserProvider>,
    ) -> Self {
        let root = root.into();
        let tree = GitAwareFileTree::new(&root).exclude(config.cache.dir_name.as_str());
        let cache = IncrementalCache::new(&root, &config.cache);
        Self {
            root,
            config,
            tree,
            engine: SymbolExtractionEngine::new(provider),
            cache,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The current file/directory listing, honoring cascading ignore
    /// rules.
    pub fn get_file_tree(&self) -> Vec<FileEntry> {
        self.tree.scan()
    }

    /// Symbols of one file (repository-relative path), from the cache when
    /// its fingerprint still matches, freshly extracted otherwise.
    /// Unreadable or unsupported files degrade to an empty list.
    pub fn extract_symbols(&mut self, path: &str) -> Vec<Symbol> {
        if let Some(symbols) = self.cache.get_cached(path) {
            return symbols;
        }
        let abs = self.root.join(path);
        let content = match std::fs::read(&abs) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Cannot read {}: {}", abs.display(), e);
                return Vec::new();
            }
        };
        let source = String::from_utf8_lossy(&content);
        let symbols = self.engine.extract_for_path(path, &source);
        self.cache.put(path, &content, symbols.clone());
        symbols
    }

    /// Batch extraction over every supported file of a fresh scan,
    /// fault-isolated per file.
    pub fn extract_all(&mut self) -> BTreeMap<String, Vec<Symbol>> {
        let mut results = BTreeMap::new();
        for file in self.tree.files() {
            if self
                .engine
                .provider()
                .language_for_path(Path::new(&file.path))
                .is_none()
            {
                continue;
            }
            if file.size > self.config.scan.max_file_size {
                tracing::warn!(
                    "Skipping {} ({} bytes exceeds scan.max_file_size)",
                    file.path,
                    file.size
                );
                continue;
            }
            results.insert(file.path.clone(), self.extract_symbols(&file.path));
        }
        results
    }

    /// The dependency analyzer plugin for a language id. Requesting an
    /// unregistered language is a programmer error.
    pub fn get_dependency_analyzer(
        &self,
        language: &str,
    ) -> Result<Box<dyn DependencyAnalyzer>, StrataError> {
        match language {
            "go" => Ok(Box::new(GoDependencyAnalyzer::new(&self.root))),
            "python" => Ok(Box::new(PythonDependencyAnalyzer::new(&self.root))),
            "rust" => Ok(Box::new(RustDependencyAnalyzer::new(&self.root))),
            other => Err(StrataError::UnsupportedLanguage(other.to_string())),
        }
    }

    /// Drop every cache entry, in memory and on disk.
    pub fn clear_incremental_cache(&mut self) {
        self.cache.clear();
    }

    pub fn get_incremental_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop cache entries whose file no longer exists; returns the count.
    pub fn reconcile_cache(&mut self) -> usize {
        self.cache.reconcile()
    }

    /// Persist the cache. Failures are logged; the in-memory state stays
    /// authoritative.
    pub fn finalize(&mut self) {
        if let Err(e) = self.cache.flush() {
            tracing::warn!("Cache flush failed on finalize: {}", e);
        }
    }
}
