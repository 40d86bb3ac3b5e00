//! Per-language dependency analyzers.
//!
//! Each language implements the `DependencyAnalyzer` trait with its own
//! import syntax, node-identity scheme, and stdlib table.

pub mod go;
pub mod python;
pub mod rust;

pub use go::GoDependencyAnalyzer;
pub use python::PythonDependencyAnalyzer;
pub use rust::RustDependencyAnalyzer;
