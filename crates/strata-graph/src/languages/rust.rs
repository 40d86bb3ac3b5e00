//! Rust dependency analyzer.
//!
//! Internal node ids are `crate::module::path` strings derived from the
//! manifest-declared crate name and the `src/` layout (directory name as a
//! fallback when no manifest exists). `crate::`, `super::`, and `self::`
//! qualifiers resolve to internal module nodes. Stdlib and external ids
//! use the crate-root segment, since use-paths name items rather than
//! modules.

use crate::analyzer::DependencyAnalyzer;
use crate::graph::{DependencyGraph, DependencyKind};
use crate::manifest::{self, ManifestInfo};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use strata_index::GitAwareFileTree;

const RUST_STDLIB: &[&str] = &["std", "core", "alloc", "proc_macro"];

static USE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+([^;]+);").unwrap());

/// A crate discovered in the repository.
#[derive(Debug, Clone)]
struct CrateInfo {
    /// Underscore-normalized crate name.
    name: String,
    /// Crate directory relative to the root ("" for the root itself).
    dir: String,
}

#[derive(Debug)]
pub struct RustDependencyAnalyzer {
    root: PathBuf,
}

impl RustDependencyAnalyzer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn discover_crates(&self) -> Vec<CrateInfo> {
        let mut crates: Vec<CrateInfo> = manifest::scan_cargo_manifests(&self.root)
            .into_iter()
            .filter_map(|(path, info)| crate_of(&self.root, &path, &info))
            .collect();

        if crates.is_empty() {
            let fallback = self
                .root
                .file_name()
                .map(|n| n.to_string_lossy().replace('-', "_"))
                .unwrap_or_else(|| "crate_root".to_string());
            tracing::warn!(
                "No Cargo.toml under {}; using directory name {:?} as crate name",
                self.root.display(),
                fallback
            );
            crates.push(CrateInfo {
                name: fallback,
                dir: String::new(),
            });
        }

        // Longest directory first, so nested crates claim their own files.
        crates.sort_by(|a, b| b.dir.len().cmp(&a.dir.len()));
        crates
    }
}

impl DependencyAnalyzer for RustDependencyAnalyzer {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn build_dependency_graph(&self) -> DependencyGraph {
        let crates = self.discover_crates();
        let crate_roots: HashSet<String> = crates.iter().map(|c| c.name.clone()).collect();

        let files = GitAwareFileTree::new(&self.root).files();
        let rs_files: Vec<String> = files
            .into_iter()
            .filter(|f| f.path.ends_with(".rs"))
            .map(|f| f.path)
            .collect();

        // Map each src/ file to its module id within its owning crate.
        let mut file_modules: Vec<(String, Vec<String>)> = Vec::new();
        for path in &rs_files {
            if let Some(module) = module_of(path, &crates) {
                file_modules.push((path.clone(), module));
            } else {
                tracing::debug!("{} is outside any crate's src tree; skipping", path);
            }
        }
        let internal_modules: HashSet<String> = file_modules
            .iter()
            .map(|(_, module)| module.join("::"))
            .collect();

        let mut graph = DependencyGraph::new();
        for id in &internal_modules {
            graph.add_node(id, DependencyKind::Internal);
        }

        for (path, module) in &file_modules {
            let abs = self.root.join(path);
            let source = match std::fs::read_to_string(&abs) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!("Skipping unreadable {}: {}", abs.display(), e);
                    continue;
                }
            };
            let module_id = module.join("::");
            for segments in parse_use_paths(&source) {
                let Some((target, kind)) =
                    resolve_use(module, &segments, &internal_modules, &crate_roots)
                else {
                    continue;
                };
                graph.add_node(&target, kind);
                graph.add_dependency(&module_id, &target);
            }
        }
        graph
    }

    fn insights(&self, graph: &DependencyGraph) -> Vec<String> {
        let crates = self.discover_crates();
        let names: Vec<&str> = crates.iter().map(|c| c.name.as_str()).collect();
        vec![format!(
            "{} crate(s) [{}] with {} internal modules",
            crates.len(),
            names.join(", "),
            graph.count_of_kind(DependencyKind::Internal)
        )]
    }
}

fn crate_of(root: &Path, manifest_path: &Path, info: &ManifestInfo) -> Option<CrateInfo> {
    let name = info.name.as_ref()?.replace('-', "_");
    let dir = manifest_path
        .parent()?
        .strip_prefix(root)
        .ok()?
        .to_string_lossy()
        .replace('\\', "/");
    Some(CrateInfo { name, dir })
}

/// Module segments of a `src/` file within its owning crate.
fn module_of(rel_path: &str, crates: &[CrateInfo]) -> Option<Vec<String>> {
    for krate in crates {
        let local = if krate.dir.is_empty() {
            rel_path
        } else {
            match rel_path
                .strip_prefix(krate.dir.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
            {
                Some(local) => local,
                None => continue,
            }
        };
        let Some(src_rel) = local.strip_prefix("src/") else {
            continue;
        };

        let mut segments = vec![krate.name.clone()];
        let components: Vec<&str> = src_rel.split('/').collect();
        for (i, component) in components.iter().enumerate() {
            let last = i + 1 == components.len();
            if last {
                let stem = component.strip_suffix(".rs").unwrap_or(component);
                if !matches!(stem, "lib" | "main" | "mod") {
                    segments.push(stem.to_string());
                }
            } else {
                segments.push(component.to_string());
            }
        }
        return Some(segments);
    }
    None
}

/// Expand the use statements of a source file into segment paths. Grouped
/// lists are flattened one level; aliases and wildcards are stripped.
fn parse_use_paths(source: &str) -> Vec<Vec<String>> {
    let mut paths = Vec::new();
    for captures in USE_RE.captures_iter(source) {
        paths.extend(expand_use_path(&captures[1]));
    }
    paths
}

fn expand_use_path(text: &str) -> Vec<Vec<String>> {
    let text = text.trim().trim_start_matches("::");
    let Some(brace) = text.find('{') else {
        let segments = segments_of(text);
        return if segments.is_empty() {
            Vec::new()
        } else {
            vec![segments]
        };
    };

    let prefix = text[..brace].trim().trim_end_matches("::");
    let inner = &text[brace + 1..text.rfind('}').unwrap_or(text.len())];

    let mut out = Vec::new();
    for item in split_top_level(inner) {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let mut segments = segments_of(prefix);
        if item != "self" {
            // A nested group contributes its own prefix segments.
            let item_path = item.split('{').next().unwrap_or(item);
            segments.extend(segments_of(item_path));
        }
        if !segments.is_empty() {
            out.push(segments);
        }
    }
    out
}

fn segments_of(path: &str) -> Vec<String> {
    path.split("::")
        .map(|s| s.trim())
        .map(|s| s.split_whitespace().next().unwrap_or(""))
        .filter(|s| !s.is_empty() && *s != "*")
        .map(String::from)
        .collect()
}

/// Split on commas outside nested braces.
fn split_top_level(inner: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in inner.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&inner[start..]);
    items
}

/// Classify one use-path and resolve it to a node id.
fn resolve_use(
    current: &[String],
    segments: &[String],
    internal_modules: &HashSet<String>,
    crate_roots: &HashSet<String>,
) -> Option<(String, DependencyKind)> {
    let first = segments.first()?;
    match first.as_str() {
        s if RUST_STDLIB.contains(&s) => Some((s.to_string(), DependencyKind::Stdlib)),
        "crate" => {
            let mut target = vec![current.first()?.clone()];
            target.extend(segments[1..].iter().cloned());
            Some((
                resolve_internal(&target, internal_modules),
                DependencyKind::Internal,
            ))
        }
        "self" => {
            let mut target = current.to_vec();
            target.extend(segments[1..].iter().cloned());
            Some((
                resolve_internal(&target, internal_modules),
                DependencyKind::Internal,
            ))
        }
        "super" => {
            let mut target = current.to_vec();
            let mut rest = segments;
            while rest.first().map(String::as_str) == Some("super") {
                if target.len() > 1 {
                    target.pop();
                }
                rest = &rest[1..];
            }
            target.extend(rest.iter().cloned());
            Some((
                resolve_internal(&target, internal_modules),
                DependencyKind::Internal,
            ))
        }
        other => {
            let normalized = other.replace('-', "_");
            if crate_roots.contains(&normalized) {
                let mut target = vec![normalized];
                target.extend(segments[1..].iter().cloned());
                Some((
                    resolve_internal(&target, internal_modules),
                    DependencyKind::Internal,
                ))
            } else {
                Some((other.to_string(), DependencyKind::External))
            }
        }
    }
}

/// Longest known-module prefix; the full path is kept as a directory-style
/// fallback when nothing matches.
fn resolve_internal(target: &[String], internal_modules: &HashSet<String>) -> String {
    let mut end = target.len();
    while end > 0 {
        let candidate = target[..end].join("::");
        if internal_modules.contains(&candidate) {
            return candidate;
        }
        end -= 1;
    }
    target.join("::")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn krate(name: &str, dir: &str) -> CrateInfo {
        CrateInfo {
            name: name.to_string(),
            dir: dir.to_string(),
        }
    }

    #[test]
    fn module_ids_follow_src_layout() {
        let crates = vec![krate("widget", "")];
        assert_eq!(module_of("src/lib.rs", &crates), Some(vec!["widget".into()]));
        assert_eq!(module_of("src/main.rs", &crates), Some(vec!["widget".into()]));
        assert_eq!(
            module_of("src/tree.rs", &crates),
            Some(vec!["widget".into(), "tree".into()])
        );
        assert_eq!(
            module_of("src/graph/mod.rs", &crates),
            Some(vec!["widget".into(), "graph".into()])
        );
        assert_eq!(
            module_of("src/graph/cycles.rs", &crates),
            Some(vec!["widget".into(), "graph".into(), "cycles".into()])
        );
        assert_eq!(module_of("tests/integration.rs", &crates), None);
    }

    #[test]
    fn nested_crates_claim_their_own_files() {
        let mut crates = vec![krate("workspace_root", ""), krate("member", "crates/member")];
        crates.sort_by(|a, b| b.dir.len().cmp(&a.dir.len()));
        assert_eq!(
            module_of("crates/member/src/lib.rs", &crates),
            Some(vec!["member".into()])
        );
        assert_eq!(
            module_of("src/lib.rs", &crates),
            Some(vec!["workspace_root".into()])
        );
    }

    #[test]
    fn parses_use_statement_forms() {
        let source = r#"
use std::collections::HashMap;
pub use crate::tree::FileTree;
use serde::{Serialize, Deserialize};
use super::graph as dep_graph;
use self::inner::Thing;
use regex::Regex as Re;
use petgraph::visit::{self, EdgeRef};
use walker::*;
"#;
        let paths = parse_use_paths(source);
        assert!(paths.contains(&vec!["std".into(), "collections".into(), "HashMap".into()]));
        assert!(paths.contains(&vec!["crate".into(), "tree".into(), "FileTree".into()]));
        assert!(paths.contains(&vec!["serde".into(), "Serialize".into()]));
        assert!(paths.contains(&vec!["serde".into(), "Deserialize".into()]));
        assert!(paths.contains(&vec!["super".into(), "graph".into()]));
        assert!(paths.contains(&vec!["self".into(), "inner".into(), "Thing".into()]));
        assert!(paths.contains(&vec!["regex".into(), "Regex".into()]));
        assert!(paths.contains(&vec!["petgraph".into(), "visit".into()]));
        assert!(
            paths.contains(&vec!["walker".into()]),
            "wildcard keeps the module path"
        );
    }

    #[test]
    fn resolves_relative_qualifiers_to_internal_modules() {
        let modules: HashSet<String> = ["widget", "widget::tree", "widget::graph"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let roots: HashSet<String> = ["widget".to_string()].into();
        let current = vec!["widget".to_string(), "graph".to_string()];

        let (id, kind) = resolve_use(
            &current,
            &["crate".into(), "tree".into(), "FileTree".into()],
            &modules,
            &roots,
        )
        .unwrap();
        assert_eq!((id.as_str(), kind), ("widget::tree", DependencyKind::Internal));

        let (id, _) = resolve_use(
            &current,
            &["super".into(), "tree".into()],
            &modules,
            &roots,
        )
        .unwrap();
        assert_eq!(id, "widget::tree");

        let (id, kind) = resolve_use(&current, &["self".into()], &modules, &roots).unwrap();
        assert_eq!((id.as_str(), kind), ("widget::graph", DependencyKind::Internal));

        let (id, kind) = resolve_use(
            &current,
            &["std".into(), "fs".into()],
            &modules,
            &roots,
        )
        .unwrap();
        assert_eq!((id.as_str(), kind), ("std", DependencyKind::Stdlib));

        let (id, kind) = resolve_use(
            &current,
            &["serde".into(), "Serialize".into()],
            &modules,
            &roots,
        )
        .unwrap();
        assert_eq!((id.as_str(), kind), ("serde", DependencyKind::External));
    }

    #[test]
    fn builds_graph_with_cycle_detection() {
        let dir = setup("strata_rust_graph");
        write(
            &dir,
            "Cargo.toml",
            "[package]\nname = \"widget\"\nversion = \"0.1.0\"\n\n[dependencies]\nserde = \"1\"\n",
        );
        write(&dir, "src/lib.rs", "pub mod tree;\npub mod graph;\n");
        write(
            &dir,
            "src/tree.rs",
            "use crate::graph::Graph;\nuse serde::Serialize;\n",
        );
        write(
            &dir,
            "src/graph.rs",
            "use crate::tree::FileTree;\nuse std::collections::HashMap;\n",
        );

        let analyzer = RustDependencyAnalyzer::new(&dir);
        let graph = analyzer.build_dependency_graph();

        assert_eq!(
            graph.node("widget::tree").unwrap().kind,
            DependencyKind::Internal
        );
        assert_eq!(graph.node("std").unwrap().kind, DependencyKind::Stdlib);
        assert_eq!(graph.node("serde").unwrap().kind, DependencyKind::External);

        let cycles = graph.find_cycles();
        assert_eq!(cycles.len(), 1, "tree <-> graph form a cycle");
        assert_eq!(cycles[0], vec!["widget::graph", "widget::tree"]);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_manifest_falls_back_to_directory_name() {
        let dir = setup("strata_rust_nomanifest");
        write(&dir, "src/lib.rs", "use std::fs;\n");

        let graph = RustDependencyAnalyzer::new(&dir).build_dependency_graph();
        assert!(graph.node("strata_rust_nomanifest").is_some());
        assert_eq!(graph.node("std").unwrap().kind, DependencyKind::Stdlib);

        fs::remove_dir_all(&dir).ok();
    }
}
