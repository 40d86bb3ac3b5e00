//! strata-graph: Per-language module dependency graphs with cycle
//! detection.
//!
//! # Architecture
//!
//! - **graph** — petgraph-backed dependency graph, cycle enumeration,
//!   JSON/DOT exports
//! - **analyzer** — the `DependencyAnalyzer` plugin trait and summary
//!   rendering
//! - **manifest** — Cargo.toml / package.json / pyproject.toml / go.mod
//!   parsing for module naming and declared dependencies
//! - **languages** — Go, Python, and Rust analyzers

pub mod analyzer;
pub mod graph;
pub mod languages;
pub mod manifest;

pub use analyzer::{ContextFormat, DependencyAnalyzer};
pub use graph::{DependencyGraph, DependencyKind, DependencyNode, ExportFormat};
pub use languages::{GoDependencyAnalyzer, PythonDependencyAnalyzer, RustDependencyAnalyzer};
pub use manifest::{Dependency, GoManifest, ManifestInfo};
