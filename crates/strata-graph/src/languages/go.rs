//! Go dependency analyzer.
//!
//! Internal node ids are fully-qualified package paths: the `go.mod`
//! module path joined with the package's directory (falling back to the
//! root directory name when no manifest exists). Stdlib/external ids are
//! the literal import path as written.

use crate::analyzer::DependencyAnalyzer;
use crate::graph::{DependencyGraph, DependencyKind};
use crate::manifest;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use strata_index::GitAwareFileTree;

/// First path segments of the Go standard library.
const GO_STDLIB: &[&str] = &[
    "archive", "bufio", "builtin", "bytes", "cmp", "compress", "container", "context", "crypto",
    "database", "debug", "embed", "encoding", "errors", "expvar", "flag", "fmt", "go", "hash",
    "html", "image", "index", "io", "iter", "log", "maps", "math", "mime", "net", "os", "path",
    "plugin", "reflect", "regexp", "runtime", "slices", "sort", "strconv", "strings", "structs",
    "sync", "syscall", "testing", "text", "time", "unicode", "unsafe",
];

/// `import "x"`, optionally aliased, dot, or blank.
static SINGLE_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^import\s+(?:[A-Za-z_][A-Za-z0-9_]*\s+|\.\s+|_\s+)?"([^"]+)""#).unwrap()
});

/// One spec inside an `import ( ... )` block.
static GROUPED_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:[A-Za-z_][A-Za-z0-9_]*\s+|\.\s+|_\s+)?"([^"]+)""#).unwrap()
});

#[derive(Debug)]
pub struct GoDependencyAnalyzer {
    root: PathBuf,
}

impl GoDependencyAnalyzer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn module_path(&self) -> String {
        match manifest::parse_go_mod(&self.root.join("go.mod")) {
            Some(manifest) => manifest.module,
            None => {
                let fallback = self
                    .root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "main".to_string());
                tracing::warn!(
                    "No go.mod under {}; using directory name {:?} as module path",
                    self.root.display(),
                    fallback
                );
                fallback
            }
        }
    }
}

impl DependencyAnalyzer for GoDependencyAnalyzer {
    fn language(&self) -> &'static str {
        "go"
    }

    fn build_dependency_graph(&self) -> DependencyGraph {
        let module = self.module_path();
        let files = GitAwareFileTree::new(&self.root).files();
        let go_files: Vec<_> = files
            .into_iter()
            .filter(|f| f.path.ends_with(".go"))
            .collect();

        let mut graph = DependencyGraph::new();
        for file in &go_files {
            graph.add_node(&package_id(&module, &file.path), DependencyKind::Internal);
        }

        for file in &go_files {
            let abs = self.root.join(&file.path);
            let source = match std::fs::read_to_string(&abs) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!("Skipping unreadable {}: {}", abs.display(), e);
                    continue;
                }
            };
            let package = package_id(&module, &file.path);
            for import in parse_go_imports(&source) {
                let kind = classify(&module, &import);
                graph.add_node(&import, kind);
                graph.add_dependency(&package, &import);
            }
        }
        graph
    }

    fn insights(&self, graph: &DependencyGraph) -> Vec<String> {
        vec![format!(
            "Go module {} with {} internal packages",
            self.module_path(),
            graph.count_of_kind(DependencyKind::Internal)
        )]
    }
}

/// Fully-qualified package id of a file's directory.
fn package_id(module: &str, rel_path: &str) -> String {
    match rel_path.rsplit_once('/') {
        Some((dir, _)) => format!("{}/{}", module, dir),
        None => module.to_string(),
    }
}

fn classify(module: &str, import: &str) -> DependencyKind {
    let first = import.split('/').next().unwrap_or(import);
    if GO_STDLIB.contains(&first) {
        DependencyKind::Stdlib
    } else if import == module || import.starts_with(&format!("{}/", module)) {
        DependencyKind::Internal
    } else {
        DependencyKind::External
    }
}

/// All import paths of a Go source file: single, grouped, aliased, dot,
/// and blank forms.
fn parse_go_imports(source: &str) -> Vec<String> {
    let mut imports = Vec::new();
    let mut in_block = false;
    for line in source.lines() {
        let line = line.trim();
        if in_block {
            if line.starts_with(')') {
                in_block = false;
            } else if let Some(captures) = GROUPED_IMPORT.captures(line) {
                imports.push(captures[1].to_string());
            }
            continue;
        }
        if line.starts_with("import (") {
            in_block = true;
        } else if let Some(captures) = SINGLE_IMPORT.captures(line) {
            imports.push(captures[1].to_string());
        }
    }
    imports
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

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

    #[test]
    fn parses_every_import_form() {
        let source = r#"package main

import "fmt"
import alias "github.com/acme/widget/util"

import (
    "os"
    _ "github.com/lib/pq"
    . "strings"
    log "github.com/sirupsen/logrus"
)
"#;
        let imports = parse_go_imports(source);
        assert_eq!(
            imports,
            vec![
                "fmt",
                "github.com/acme/widget/util",
                "os",
                "github.com/lib/pq",
                "strings",
                "github.com/sirupsen/logrus",
            ]
        );
    }

    #[test]
    fn classifies_stdlib_internal_external() {
        let module = "github.com/acme/widget";
        assert_eq!(classify(module, "fmt"), DependencyKind::Stdlib);
        assert_eq!(classify(module, "net/http"), DependencyKind::Stdlib);
        assert_eq!(
            classify(module, "github.com/acme/widget/util"),
            DependencyKind::Internal
        );
        assert_eq!(
            classify(module, "github.com/acme/widgetfactory"),
            DependencyKind::External,
            "prefix match must respect path boundaries"
        );
        assert_eq!(
            classify(module, "github.com/pkg/errors"),
            DependencyKind::External
        );
    }

    #[test]
    fn builds_graph_from_repository() {
        let dir = setup("strata_go_graph");
        write(&dir, "go.mod", "module github.com/acme/widget\n\ngo 1.22\n");
        write(
            &dir,
            "main.go",
            r#"package main

import (
    "fmt"
    "github.com/acme/widget/util"
    "github.com/pkg/errors"
)
"#,
        );
        write(
            &dir,
            "util/strings.go",
            "package util\n\nimport \"strings\"\n",
        );

        let graph = GoDependencyAnalyzer::new(&dir).build_dependency_graph();

        let root_pkg = graph.node("github.com/acme/widget").unwrap();
        assert_eq!(root_pkg.kind, DependencyKind::Internal);
        assert!(root_pkg.dependencies.contains("fmt"));
        assert!(root_pkg.dependencies.contains("github.com/acme/widget/util"));

        assert_eq!(graph.node("fmt").unwrap().kind, DependencyKind::Stdlib);
        assert_eq!(
            graph.node("github.com/pkg/errors").unwrap().kind,
            DependencyKind::External
        );
        assert_eq!(
            graph.node("github.com/acme/widget/util").unwrap().kind,
            DependencyKind::Internal
        );

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_manifest_falls_back_to_directory_name() {
        let dir = setup("strata_go_nomod");
        write(&dir, "main.go", "package main\n\nimport \"fmt\"\n");

        let analyzer = GoDependencyAnalyzer::new(&dir);
        let graph = analyzer.build_dependency_graph();
        assert!(graph.node("strata_go_nomod").is_some());
        assert!(graph.node("fmt").is_some());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn rebuild_is_idempotent() {
        let dir = setup("strata_go_idempotent");
        write(&dir, "go.mod", "module example.com/app\n");
        write(&dir, "a.go", "package main\n\nimport \"os\"\n");

        let analyzer = GoDependencyAnalyzer::new(&dir);
        let first = analyzer.build_dependency_graph();
        let second = analyzer.build_dependency_graph();
        assert_eq!(first.nodes(), second.nodes());

        fs::remove_dir_all(&dir).ok();
    }
}
