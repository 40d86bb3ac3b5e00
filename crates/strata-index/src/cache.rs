//! Incremental extraction cache with mtime/size/hash fingerprints.
//!
//! Two persisted JSON documents live under the repository's cache
//! directory: file metadata and symbol payloads. Both are reloaded
//! verbatim at construction; corrupt or missing data degrades to an empty
//! cache. The in-memory state stays authoritative when a persistence
//! write fails.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use strata_core::{CacheConfig, StrataError, Symbol};

/// Persisted fingerprint document name.
pub const METADATA_FILE: &str = "metadata.json";
/// Persisted symbol payload document name.
pub const SYMBOLS_FILE: &str = "symbols.json";

/// The stored fingerprint of an analyzed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Modification time, milliseconds since the Unix epoch.
    pub mtime_ms: i64,
    pub size: u64,
    /// SHA-256 of the file content, hex-encoded.
    pub content_hash: String,
    /// When the symbols were last extracted, milliseconds since epoch.
    pub last_analyzed: i64,
}

/// Observability counters; non-load-bearing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub invalidations: u64,
    pub reconciled: u64,
    pub flushes: u64,
    /// Cumulative time spent hashing file contents.
    pub hash_time_ms: u64,
}

/// Per-repository incremental cache. One instance owns the in-memory
/// state for its root; sharing a persisted directory between instances is
/// unsupported (last writer wins).
pub struct IncrementalCache {
    root: PathBuf,
    cache_dir: PathBuf,
    flush_every: usize,
    metadata: HashMap<String, FileMetadata>,
    symbols: HashMap<String, Vec<Symbol>>,
    /// Paths changed since the last successful flush.
    dirty: HashSet<String>,
    stats: CacheStats,
}

impl IncrementalCache {
    /// Open (or create) the cache for a repository root, reloading any
    /// persisted documents.
    pub fn new(root: impl Into<PathBuf>, config: &CacheConfig) -> Self {
        let root = root.into();
        let cache_dir = root.join(&config.dir_name);
        let metadata = load_document(&cache_dir.join(METADATA_FILE));
        let symbols = load_document(&cache_dir.join(SYMBOLS_FILE));
        Self {
            root,
            cache_dir,
            flush_every: config.flush_every.max(1),
            metadata,
            symbols,
            dirty: HashSet::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Has the file changed since it was last analyzed?
    ///
    /// Cheapest-first short circuit: missing entry, then mtime, then size,
    /// then the content hash (expensive, authoritative). Any mismatch is
    /// conclusive.
    pub fn is_changed(&mut self, path: &str) -> bool {
        let Some(entry) = self.metadata.get(path) else {
            return true;
        };
        let abs = self.root.join(path);
        let Ok(meta) = std::fs::metadata(&abs) else {
            return true;
        };
        if !meta.is_file() {
            return true;
        }
        if mtime_ms(&meta) != entry.mtime_ms {
            return true;
        }
        if meta.len() != entry.size {
            return true;
        }
        let expected = entry.content_hash.clone();
        let start = Instant::now();
        let hash = match std::fs::read(&abs) {
            Ok(content) => hash_content(&content),
            Err(_) => return true,
        };
        self.stats.hash_time_ms += start.elapsed().as_millis() as u64;
        hash != expected
    }

    /// Stored symbols, only while the fingerprint still matches.
    pub fn get_cached(&mut self, path: &str) -> Option<Vec<Symbol>> {
        if self.metadata.contains_key(path) && !self.is_changed(path) {
            if let Some(symbols) = self.symbols.get(path) {
                self.stats.hits += 1;
                return Some(symbols.clone());
            }
        }
        self.stats.misses += 1;
        None
    }

    /// Store symbols plus a freshly computed fingerprint of `content`,
    /// overwriting any previous entry. Flushes opportunistically once
    /// enough entries are dirty.
    pub fn put(&mut self, path: &str, content: &[u8], symbols: Vec<Symbol>) {
        let abs = self.root.join(path);
        let (mtime, size) = match std::fs::metadata(&abs) {
            Ok(meta) => (mtime_ms(&meta), meta.len()),
            Err(e) => {
                tracing::warn!("Cannot stat {} while caching: {}", abs.display(), e);
                (0, content.len() as u64)
            }
        };

        let start = Instant::now();
        let content_hash = hash_content(content);
        self.stats.hash_time_ms += start.elapsed().as_millis() as u64;

        self.metadata.insert(
            path.to_string(),
            FileMetadata {
                mtime_ms: mtime,
                size,
                content_hash,
                last_analyzed: now_ms(),
            },
        );
        self.symbols.insert(path.to_string(), symbols);
        self.dirty.insert(path.to_string());
        self.stats.puts += 1;
        self.maybe_flush();
    }

    /// Drop a single entry.
    pub fn invalidate(&mut self, path: &str) {
        let removed_meta = self.metadata.remove(path).is_some();
        let removed_symbols = self.symbols.remove(path).is_some();
        if removed_meta || removed_symbols {
            self.dirty.insert(path.to_string());
            self.stats.invalidations += 1;
        }
    }

    /// Drop everything, in memory and on disk.
    pub fn clear(&mut self) {
        self.metadata.clear();
        self.symbols.clear();
        self.dirty.clear();
        self.stats.invalidations += 1;
        if let Err(e) = self.flush() {
            tracing::warn!("Cache flush after clear failed: {}", e);
        }
    }

    /// Remove entries whose file no longer exists; returns the removed
    /// count.
    pub fn reconcile(&mut self) -> usize {
        let stale: Vec<String> = self
            .metadata
            .keys()
            .filter(|path| !self.root.join(path.as_str()).is_file())
            .cloned()
            .collect();
        for path in &stale {
            self.metadata.remove(path);
            self.symbols.remove(path);
            self.dirty.insert(path.clone());
        }
        self.stats.reconciled += stale.len() as u64;
        self.maybe_flush();
        stale.len()
    }

    /// Snapshot of the observability counters.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.entries = self.metadata.len();
        stats
    }

    /// Persist both documents. The write goes through a temp file and
    /// rename so a crash never leaves a half-written document behind.
    pub fn flush(&mut self) -> Result<(), StrataError> {
        std::fs::create_dir_all(&self.cache_dir)?;
        write_document(&self.cache_dir.join(METADATA_FILE), &self.metadata)?;
        write_document(&self.cache_dir.join(SYMBOLS_FILE), &self.symbols)?;
        self.dirty.clear();
        self.stats.flushes += 1;
        Ok(())
    }

    fn maybe_flush(&mut self) {
        if self.dirty.len() >= self.flush_every {
            if let Err(e) = self.flush() {
                tracing::warn!("Opportunistic cache flush failed: {}", e);
            }
        }
    }
}

impl Drop for IncrementalCache {
    fn drop(&mut self) {
        if !self.dirty.is_empty() {
            if let Err(e) = self.flush() {
                tracing::warn!("Final cache flush failed: {}", e);
            }
        }
    }
}

fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

fn mtime_ms(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn load_document<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> T {
    match std::fs::read(path) {
        Ok(content) => match serde_json::from_slice(&content) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Corrupt cache document {}: {}", path.display(), e);
                T::default()
            }
        },
        Err(_) => T::default(),
    }
}

fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<(), StrataError> {
    let content = serde_json::to_vec(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
