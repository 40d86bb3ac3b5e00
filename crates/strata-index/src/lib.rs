//! strata-index: Repository scanning, structural symbol extraction, and the
//! incremental extraction cache.
//!
//! # Architecture
//!
//! - **tree** — Git-aware file discovery with cascading `.gitignore` rules
//! - **provider** — `ParserProvider` boundary + tree-sitter registry
//! - **engine** — Capture-convention decoding into `Symbol` records
//! - **cache** — mtime/size/hash fingerprints with JSON persistence

pub mod cache;
pub mod engine;
pub mod provider;
pub mod tree;

pub use cache::{CacheStats, FileMetadata, IncrementalCache};
pub use engine::SymbolExtractionEngine;
pub use provider::{
    Capture, CapturedNode, NameStyle, ParserProvider, StructuralMatch, TreeSitterProvider,
};
pub use tree::{GitAwareFileTree, IgnoreRule, IgnoreRuleSet};
