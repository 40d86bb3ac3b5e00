//! Core data types shared across the indexing pipeline.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;

/// A single entry produced by a repository scan.
///
/// Entries are immutable; a new scan supersedes the previous listing
/// wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the scanned root, `/`-separated on every platform.
    pub path: String,
    /// Final path component.
    pub name: String,
    pub is_directory: bool,
    /// Size in bytes; 0 for directories.
    pub size: u64,
}

/// The kind of an extracted symbol.
///
/// Grammars introduce new kinds without a code change, so unknown
/// discriminators are preserved through the `Other` escape hatch rather
/// than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Struct,
    Enum,
    Interface,
    Type,
    Constant,
    Variable,
    Module,
    Macro,
    Block,
    Other(String),
}

impl SymbolKind {
    /// Parse a kind from the discriminator tag of a `definition.<kind>`
    /// capture name.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "function" => Self::Function,
            "method" => Self::Method,
            "class" => Self::Class,
            "struct" => Self::Struct,
            "enum" => Self::Enum,
            "interface" => Self::Interface,
            "type" => Self::Type,
            "constant" => Self::Constant,
            "variable" => Self::Variable,
            "module" => Self::Module,
            "macro" => Self::Macro,
            "block" => Self::Block,
            other => Self::Other(other.to_string()),
        }
    }

    /// The plain tag string this kind serializes as.
    pub fn as_tag(&self) -> &str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Interface => "interface",
            Self::Type => "type",
            Self::Constant => "constant",
            Self::Variable => "variable",
            Self::Module => "module",
            Self::Macro => "macro",
            Self::Block => "block",
            Self::Other(tag) => tag,
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl Serialize for SymbolKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_tag())
    }
}

impl<'de> Deserialize<'de> for SymbolKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(SymbolKind::from_tag(&tag))
    }
}

/// A named definition extracted from a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Repository-relative path of the defining file.
    pub file: String,
    /// 1-based first line of the definition.
    pub start_line: u32,
    /// 1-based last line of the definition, inclusive.
    pub end_line: u32,
}

/// Languages with structural extraction support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageId {
    Rust,
    Python,
    Go,
    JavaScript,
    TypeScript,
    Hcl,
}

impl LanguageId {
    /// Map a file extension to a language id.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "rs" => Some(Self::Rust),
            "py" | "pyi" => Some(Self::Python),
            "go" => Some(Self::Go),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "ts" | "tsx" => Some(Self::TypeScript),
            "tf" | "hcl" => Some(Self::Hcl),
            _ => None,
        }
    }

    /// Detect the language of a path from its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::Go => "go",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Hcl => "hcl",
        }
    }
}

impl std::fmt::Display for LanguageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
