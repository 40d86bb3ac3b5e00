//! Parser/query provider boundary for structural extraction.
//!
//! The extraction engine depends only on the [`ParserProvider`] trait; the
//! concrete [`TreeSitterProvider`] wraps tree-sitter grammars and `.scm`
//! query files compiled once into an explicit registry.
//!
//! # Query format
//!
//! Queries use tree-sitter capture conventions:
//! - `@definition.<kind>` — the whole definition node; `<kind>` becomes the
//!   symbol kind tag
//! - `@name` — the node supplying the display name
//! - `@type` — fallback name node(s) for constructs that build a composite
//!   name (e.g. HCL blocks joining label strings)

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;
use streaming_iterator::StreamingIterator;
use strata_core::LanguageId;
use tree_sitter::{Parser, Query, QueryCursor};

/// How a language derives a symbol's display name from its captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameStyle {
    /// First `name` capture, falling back to the first `type` capture.
    Identifier,
    /// Join every `type` capture in document order, stripping the quotes
    /// of string-literal nodes.
    Composite { separator: char },
}

/// A syntax-tree node bound by a query capture.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedNode {
    pub text: String,
    pub node_kind: String,
    /// 1-based line numbers.
    pub start_line: u32,
    pub end_line: u32,
}

impl CapturedNode {
    pub fn is_string_literal(&self) -> bool {
        self.node_kind.contains("string") || self.text.starts_with('"')
    }
}

/// A named capture and the node(s) it bound within one match.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub name: String,
    pub nodes: Vec<CapturedNode>,
}

/// One structural query match: a pattern index plus its captures.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralMatch {
    pub pattern_index: usize,
    pub captures: Vec<Capture>,
}

impl StructuralMatch {
    pub fn capture(&self, name: &str) -> Option<&Capture> {
        self.captures.iter().find(|c| c.name == name)
    }
}

/// The sole dependency boundary of the extraction engine. Any technology
/// that can produce structural matches is pluggable behind it.
pub trait ParserProvider: Send + Sync {
    /// Language id for a path, from the extension table by default.
    fn language_for_path(&self, path: &Path) -> Option<LanguageId> {
        LanguageId::from_path(path)
    }

    /// Parse `source` and run the language's structural query. `None` means
    /// a missing grammar/query or a parse failure — never an error.
    fn structural_matches(
        &self,
        language: LanguageId,
        source: &str,
    ) -> Option<Vec<StructuralMatch>>;

    fn name_style(&self, _language: LanguageId) -> NameStyle {
        NameStyle::Identifier
    }
}

mod queries {
    pub const RUST: &str = include_str!("queries/rust-tags.scm");
    pub const PYTHON: &str = include_str!("queries/python-tags.scm");
    pub const GO: &str = include_str!("queries/go-tags.scm");
    pub const JAVASCRIPT: &str = include_str!("queries/javascript-tags.scm");
    pub const TYPESCRIPT: &str = include_str!("queries/typescript-tags.scm");
    pub const HCL: &str = include_str!("queries/hcl-tags.scm");
}

struct LangConfig {
    language: tree_sitter::Language,
    query: Query,
    name_style: NameStyle,
}

fn grammar(id: LanguageId) -> tree_sitter::Language {
    match id {
        LanguageId::Rust => tree_sitter_rust::LANGUAGE.into(),
        LanguageId::Python => tree_sitter_python::LANGUAGE.into(),
        LanguageId::Go => tree_sitter_go::LANGUAGE.into(),
        LanguageId::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        LanguageId::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        LanguageId::Hcl => tree_sitter_hcl::LANGUAGE.into(),
    }
}

fn query_source(id: LanguageId) -> &'static str {
    match id {
        LanguageId::Rust => queries::RUST,
        LanguageId::Python => queries::PYTHON,
        LanguageId::Go => queries::GO,
        LanguageId::JavaScript => queries::JAVASCRIPT,
        LanguageId::TypeScript => queries::TYPESCRIPT,
        LanguageId::Hcl => queries::HCL,
    }
}

fn default_name_style(id: LanguageId) -> NameStyle {
    match id {
        LanguageId::Hcl => NameStyle::Composite { separator: '.' },
        _ => NameStyle::Identifier,
    }
}

/// Compiled grammar + query registry, built once. A query that fails to
/// compile against its linked grammar drops that language with a warning.
static LANG_CONFIGS: Lazy<HashMap<LanguageId, LangConfig>> = Lazy::new(|| {
    let mut configs = HashMap::new();
    for id in [
        LanguageId::Rust,
        LanguageId::Python,
        LanguageId::Go,
        LanguageId::JavaScript,
        LanguageId::TypeScript,
        LanguageId::Hcl,
    ] {
        let language = grammar(id);
        match Query::new(&language, query_source(id)) {
            Ok(query) => {
                configs.insert(
                    id,
                    LangConfig {
                        language,
                        query,
                        name_style: default_name_style(id),
                    },
                );
            }
            Err(e) => {
                tracing::warn!("Failed to compile {} structural query: {}", id, e);
            }
        }
    }
    configs
});

/// Tree-sitter backed [`ParserProvider`].
#[derive(Default)]
pub struct TreeSitterProvider;

impl TreeSitterProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn supports(&self, language: LanguageId) -> bool {
        LANG_CONFIGS.contains_key(&language)
    }
}

impl ParserProvider for TreeSitterProvider {
    fn structural_matches(
        &self,
        language: LanguageId,
        source: &str,
    ) -> Option<Vec<StructuralMatch>> {
        let config = LANG_CONFIGS.get(&language)?;

        let mut parser = Parser::new();
        parser.set_language(&config.language).ok()?;
        let tree = parser.parse(source, None)?;

        let capture_names = config.query.capture_names();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&config.query, tree.root_node(), source.as_bytes());

        let mut out = Vec::new();
        while let Some(m) = matches.next() {
            let mut captures: Vec<Capture> = Vec::new();
            for qc in m.captures {
                let name = capture_names
                    .get(qc.index as usize)
                    .copied()
                    .unwrap_or("");
                let node = qc.node;
                let captured = CapturedNode {
                    text: node.utf8_text(source.as_bytes()).unwrap_or("").to_string(),
                    node_kind: node.kind().to_string(),
                    start_line: node.start_position().row as u32 + 1,
                    end_line: node.end_position().row as u32 + 1,
                };
                match captures.iter_mut().find(|c| c.name == name) {
                    Some(capture) => capture.nodes.push(captured),
                    None => captures.push(Capture {
                        name: name.to_string(),
                        nodes: vec![captured],
                    }),
                }
            }
            out.push(StructuralMatch {
                pattern_index: m.pattern_index,
                captures,
            });
        }
        Some(out)
    }

    fn name_style(&self, language: LanguageId) -> NameStyle {
        LANG_CONFIGS
            .get(&language)
            .map(|c| c.name_style)
            .unwrap_or(NameStyle::Identifier)
    }
}
