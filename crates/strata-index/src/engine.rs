//! Symbol extraction from structural query matches.

use crate::provider::{Capture, CapturedNode, NameStyle, ParserProvider, StructuralMatch};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use strata_core::{LanguageId, Symbol, SymbolKind};

/// Turns a provider's structural matches into [`Symbol`] records.
///
/// Extraction is fault-isolated per file: a missing grammar/query or a
/// parse failure yields an empty list, never an error.
pub struct SymbolExtractionEngine {
    provider: Arc<dyn ParserProvider>,
}

impl SymbolExtractionEngine {
    pub fn new(provider: Arc<dyn ParserProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn ParserProvider> {
        &self.provider
    }

    /// Extract all symbols a language's query finds in `source`.
    pub fn extract(&self, file: &str, language: LanguageId, source: &str) -> Vec<Symbol> {
        let Some(matches) = self.provider.structural_matches(language, source) else {
            tracing::debug!("No structural support for {} ({})", file, language);
            return Vec::new();
        };
        let style = self.provider.name_style(language);

        let mut symbols = Vec::new();
        let mut seen: HashSet<(String, SymbolKind, u32)> = HashSet::new();
        for m in &matches {
            let Some((kind, definition)) = definition_of(m, file) else {
                continue;
            };
            let Some(name) = resolve_name(m, style, file) else {
                tracing::debug!(
                    "Match without usable name in {} (pattern {})",
                    file,
                    m.pattern_index
                );
                continue;
            };
            if seen.insert((name.clone(), kind.clone(), definition.start_line)) {
                symbols.push(Symbol {
                    name,
                    kind,
                    file: file.to_string(),
                    start_line: definition.start_line,
                    end_line: definition.end_line,
                });
            }
        }
        symbols
    }

    /// Extract using the provider's extension table; unknown extensions
    /// yield an empty list.
    pub fn extract_for_path(&self, file: &str, source: &str) -> Vec<Symbol> {
        match self.provider.language_for_path(Path::new(file)) {
            Some(language) => self.extract(file, language, source),
            None => Vec::new(),
        }
    }
}

/// Locate the `definition.<kind>` capture of a match.
fn definition_of<'m>(m: &'m StructuralMatch, file: &str) -> Option<(SymbolKind, &'m CapturedNode)> {
    for capture in &m.captures {
        if let Some(tag) = capture.name.strip_prefix("definition.") {
            let node = first_node(capture, file)?;
            return Some((SymbolKind::from_tag(tag), node));
        }
    }
    None
}

/// Deterministically take the first node of a capture, logging when the
/// query bound several.
fn first_node<'c>(capture: &'c Capture, file: &str) -> Option<&'c CapturedNode> {
    if capture.nodes.len() > 1 {
        tracing::debug!(
            "Capture {} bound {} nodes in {}; taking the first",
            capture.name,
            capture.nodes.len(),
            file
        );
    }
    capture.nodes.first()
}

/// Resolve the display name: the `name` capture, falling back to `type`
/// per the language's naming style.
fn resolve_name(m: &StructuralMatch, style: NameStyle, file: &str) -> Option<String> {
    if let Some(capture) = m.capture("name") {
        return first_node(capture, file).map(literal_text);
    }
    let capture = m.capture("type")?;
    match style {
        NameStyle::Identifier => first_node(capture, file).map(literal_text),
        NameStyle::Composite { separator } => {
            let parts: Vec<String> = capture
                .nodes
                .iter()
                .map(literal_text)
                .filter(|part| !part.is_empty())
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(&separator.to_string()))
            }
        }
    }
}

/// Node text with surrounding quotes stripped from string literals.
fn literal_text(node: &CapturedNode) -> String {
    if node.is_string_literal() {
        node.text.trim_matches('"').to_string()
    } else {
        node.text.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TreeSitterProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted provider for exercising engine behavior without grammars.
    struct FakeProvider {
        matches: Vec<StructuralMatch>,
        style: NameStyle,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(matches: Vec<StructuralMatch>, style: NameStyle) -> Self {
            Self {
                matches,
                style,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ParserProvider for FakeProvider {
        fn structural_matches(
            &self,
            _language: LanguageId,
            _source: &str,
        ) -> Option<Vec<StructuralMatch>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some(self.matches.clone())
        }

        fn name_style(&self, _language: LanguageId) -> NameStyle {
            self.style
        }
    }

    fn node(text: &str, kind: &str, line: u32) -> CapturedNode {
        CapturedNode {
            text: text.to_string(),
            node_kind: kind.to_string(),
            start_line: line,
            end_line: line + 2,
        }
    }

    fn capture(name: &str, nodes: Vec<CapturedNode>) -> Capture {
        Capture {
            name: name.to_string(),
            nodes,
        }
    }

    #[test]
    fn kind_comes_from_definition_suffix() {
        let m = StructuralMatch {
            pattern_index: 0,
            captures: vec![
                capture("definition.function", vec![node("fn f() {}", "function_item", 3)]),
                capture("name", vec![node("f", "identifier", 3)]),
            ],
        };
        let engine = SymbolExtractionEngine::new(Arc::new(FakeProvider::new(
            vec![m],
            NameStyle::Identifier,
        )));

        let symbols = engine.extract("a.rs", LanguageId::Rust, "src");
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "f");
        assert_eq!(symbols[0].kind, SymbolKind::Function);
        assert_eq!(symbols[0].start_line, 3);
        assert_eq!(symbols[0].end_line, 5);
        assert_eq!(symbols[0].file, "a.rs");
    }

    #[test]
    fn multi_node_capture_takes_first() {
        let m = StructuralMatch {
            pattern_index: 1,
            captures: vec![
                capture("definition.class", vec![node("class A:", "class_definition", 1)]),
                capture(
                    "name",
                    vec![node("A", "identifier", 1), node("B", "identifier", 1)],
                ),
            ],
        };
        let engine = SymbolExtractionEngine::new(Arc::new(FakeProvider::new(
            vec![m],
            NameStyle::Identifier,
        )));

        let symbols = engine.extract("a.py", LanguageId::Python, "src");
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "A");
    }

    #[test]
    fn match_without_name_or_type_is_skipped() {
        let named = StructuralMatch {
            pattern_index: 0,
            captures: vec![
                capture("definition.function", vec![node("fn g() {}", "function_item", 9)]),
                capture("name", vec![node("g", "identifier", 9)]),
            ],
        };
        let nameless = StructuralMatch {
            pattern_index: 2,
            captures: vec![capture(
                "definition.function",
                vec![node("fn ??", "function_item", 4)],
            )],
        };
        let engine = SymbolExtractionEngine::new(Arc::new(FakeProvider::new(
            vec![nameless, named],
            NameStyle::Identifier,
        )));

        let symbols = engine.extract("a.rs", LanguageId::Rust, "src");
        assert_eq!(symbols.len(), 1, "the nameless match is skipped, not fatal");
        assert_eq!(symbols[0].name, "g");
    }

    #[test]
    fn composite_style_joins_type_nodes_and_strips_quotes() {
        let m = StructuralMatch {
            pattern_index: 0,
            captures: vec![
                capture("definition.block", vec![node("resource ...", "block", 1)]),
                capture(
                    "type",
                    vec![
                        node("resource", "identifier", 1),
                        node("\"aws_instance\"", "string_lit", 1),
                        node("\"web\"", "string_lit", 1),
                    ],
                ),
            ],
        };
        let engine = SymbolExtractionEngine::new(Arc::new(FakeProvider::new(
            vec![m],
            NameStyle::Composite { separator: '.' },
        )));

        let symbols = engine.extract("main.tf", LanguageId::Hcl, "src");
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "resource.aws_instance.web");
        assert_eq!(symbols[0].kind, SymbolKind::Block);
    }

    #[test]
    fn unknown_extension_extracts_nothing() {
        let engine = SymbolExtractionEngine::new(Arc::new(TreeSitterProvider::new()));
        assert!(engine.extract_for_path("data.bin", "\0\0\0").is_empty());
    }

    #[test]
    fn rust_source_end_to_end() {
        let engine = SymbolExtractionEngine::new(Arc::new(TreeSitterProvider::new()));
        let source = r#"
pub struct Config {
    pub debug: bool,
}

pub enum Mode {
    Fast,
    Slow,
}

pub trait Runner {
    fn run(&self);
}

const LIMIT: usize = 8;

fn helper() -> usize {
    LIMIT
}
"#;
        let symbols = engine.extract_for_path("src/config.rs", source);
        let find = |name: &str| symbols.iter().find(|s| s.name == name);

        assert_eq!(find("Config").unwrap().kind, SymbolKind::Struct);
        assert_eq!(find("Mode").unwrap().kind, SymbolKind::Enum);
        assert_eq!(find("Runner").unwrap().kind, SymbolKind::Interface);
        assert_eq!(find("LIMIT").unwrap().kind, SymbolKind::Constant);
        assert_eq!(find("helper").unwrap().kind, SymbolKind::Function);
        assert!(find("run").is_none(), "trait methods are not top-level items");
    }

    #[test]
    fn python_source_end_to_end() {
        let engine = SymbolExtractionEngine::new(Arc::new(TreeSitterProvider::new()));
        let source = r#"
VERSION = "1.0"

class Indexer:
    def scan(self):
        return []

def main():
    return Indexer()
"#;
        let symbols = engine.extract_for_path("indexer.py", source);
        let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"Indexer"));
        assert!(names.contains(&"scan"));
        assert!(names.contains(&"main"));
        assert!(names.contains(&"VERSION"));
    }
}
