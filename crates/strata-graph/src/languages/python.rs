//! Python dependency analyzer.
//!
//! Python is internal-by-file: every scanned `.py` file is a node whose id
//! is its repository-relative path. Relative import qualifiers (`.`,
//! `..`) resolve against the importing file's package directory to the
//! corresponding internal node, never to an external one.

use crate::analyzer::DependencyAnalyzer;
use crate::graph::{DependencyGraph, DependencyKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::PathBuf;
use strata_index::GitAwareFileTree;

/// Top-level modules of the Python standard library.
const PYTHON_STDLIB: &[&str] = &[
    "abc", "argparse", "array", "ast", "asyncio", "base64", "bisect", "builtins", "collections",
    "configparser", "contextlib", "copy", "csv", "dataclasses", "datetime", "decimal", "difflib",
    "dis", "email", "enum", "errno", "fnmatch", "fractions", "functools", "gc", "getpass", "glob",
    "gzip", "hashlib", "heapq", "html", "http", "importlib", "inspect", "io", "itertools", "json",
    "keyword", "logging", "math", "mimetypes", "multiprocessing", "numbers", "operator", "os",
    "pathlib", "pickle", "pkgutil", "platform", "pprint", "queue", "random", "re", "secrets",
    "select", "shlex", "shutil", "signal", "socket", "sqlite3", "statistics", "string", "struct",
    "subprocess", "sys", "sysconfig", "tarfile", "tempfile", "textwrap", "threading", "time",
    "timeit", "token", "tokenize", "traceback", "types", "typing", "unicodedata", "unittest",
    "urllib", "uuid", "venv", "warnings", "weakref", "xml", "zipfile", "zlib",
];

static FROM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*from\s+(\.*)([A-Za-z_][\w.]*)?\s*import\s+(.+)$").unwrap()
});

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*import\s+(.+)$").unwrap());

/// One parsed import statement.
#[derive(Debug, Clone, PartialEq)]
struct PyImport {
    /// Number of leading dots: 0 = absolute, 1 = current package,
    /// 2 = parent package, and so on.
    level: usize,
    /// Dotted module path after the dots; may be empty for
    /// `from . import x`.
    module: String,
    /// Imported names of a `from` statement ("*" for wildcards); empty
    /// for plain `import` statements.
    names: Vec<String>,
}

#[derive(Debug)]
pub struct PythonDependencyAnalyzer {
    root: PathBuf,
}

impl PythonDependencyAnalyzer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DependencyAnalyzer for PythonDependencyAnalyzer {
    fn language(&self) -> &'static str {
        "python"
    }

    fn build_dependency_graph(&self) -> DependencyGraph {
        let files = GitAwareFileTree::new(&self.root).files();
        let py_files: Vec<String> = files
            .into_iter()
            .filter(|f| f.path.ends_with(".py"))
            .map(|f| f.path)
            .collect();
        let file_set: HashSet<String> = py_files.iter().cloned().collect();

        let mut graph = DependencyGraph::new();
        for path in &py_files {
            graph.add_node(path, DependencyKind::Internal);
        }

        for path in &py_files {
            let abs = self.root.join(path);
            let source = match std::fs::read_to_string(&abs) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!("Skipping unreadable {}: {}", abs.display(), e);
                    continue;
                }
            };
            for import in parse_python_imports(&source) {
                for (id, kind) in resolve_import(path, &import, &file_set) {
                    graph.add_node(&id, kind);
                    graph.add_dependency(path, &id);
                }
            }
        }
        graph
    }

    fn insights(&self, graph: &DependencyGraph) -> Vec<String> {
        vec![format!(
            "{} Python modules (one node per file), {} external packages",
            graph.count_of_kind(DependencyKind::Internal),
            graph.count_of_kind(DependencyKind::External)
        )]
    }
}

/// Resolve one import to the node(s) it depends on.
fn resolve_import(
    file: &str,
    import: &PyImport,
    files: &HashSet<String>,
) -> Vec<(String, DependencyKind)> {
    if import.level > 0 {
        return resolve_relative(file, import, files);
    }

    let first = import.module.split('.').next().unwrap_or("");
    if first.is_empty() {
        return Vec::new();
    }
    if PYTHON_STDLIB.contains(&first) {
        return vec![(import.module.clone(), DependencyKind::Stdlib)];
    }
    if let Some(target) = resolve_absolute(&import.module, files) {
        return vec![(target, DependencyKind::Internal)];
    }
    vec![(import.module.clone(), DependencyKind::External)]
}

/// Relative qualifiers resolve against the importing file's package
/// directory; they are internal by definition.
fn resolve_relative(
    file: &str,
    import: &PyImport,
    files: &HashSet<String>,
) -> Vec<(String, DependencyKind)> {
    let mut base: Vec<&str> = file.split('/').collect();
    base.pop(); // drop the file name, keeping the package directory

    let ascend = import.level - 1;
    if ascend > base.len() {
        tracing::warn!("Relative import in {} escapes the repository root", file);
        return Vec::new();
    }
    base.truncate(base.len() - ascend);
    base.extend(import.module.split('.').filter(|s| !s.is_empty()));

    if import.module.is_empty() && !import.names.is_empty() {
        // `from . import db, models` — each name may be a sibling module.
        let mut deps = Vec::new();
        for name in &import.names {
            if name == "*" {
                continue;
            }
            let mut candidate = base.clone();
            candidate.push(name);
            if let Some(target) = file_for(&candidate, files) {
                deps.push((target, DependencyKind::Internal));
                continue;
            }
            if let Some(target) = file_for(&base, files) {
                deps.push((target, DependencyKind::Internal));
            }
        }
        deps.dedup();
        return deps;
    }

    match file_for(&base, files) {
        Some(target) => vec![(target, DependencyKind::Internal)],
        // The file is missing from the scan (generated, ignored); keep the
        // dotted name as an internal placeholder rather than misclassify.
        None => vec![(base.join("."), DependencyKind::Internal)],
    }
}

/// Longest-prefix resolution of a dotted absolute module path to a
/// repository file (`a.b.c` may name an attribute of module `a/b.py`).
fn resolve_absolute(module: &str, files: &HashSet<String>) -> Option<String> {
    let mut components: Vec<&str> = module.split('.').collect();
    while !components.is_empty() {
        if let Some(target) = file_for(&components, files) {
            return Some(target);
        }
        components.pop();
    }
    None
}

fn file_for(components: &[&str], files: &HashSet<String>) -> Option<String> {
    if components.is_empty() {
        return None;
    }
    let base = components.join("/");
    let module_file = format!("{}.py", base);
    if files.contains(&module_file) {
        return Some(module_file);
    }
    let package_file = format!("{}/__init__.py", base);
    if files.contains(&package_file) {
        return Some(package_file);
    }
    None
}

/// Parse the import statements of a Python source file, folding
/// parenthesized multi-line `from` imports into logical lines.
fn parse_python_imports(source: &str) -> Vec<PyImport> {
    let mut imports = Vec::new();
    for line in logical_lines(source) {
        if let Some(captures) = FROM_RE.captures(&line) {
            let level = captures.get(1).map_or(0, |m| m.as_str().len());
            let module = captures.get(2).map_or("", |m| m.as_str()).to_string();
            let names = parse_names(captures.get(3).map_or("", |m| m.as_str()));
            if level > 0 || !module.is_empty() {
                imports.push(PyImport {
                    level,
                    module,
                    names,
                });
            }
        } else if let Some(captures) = IMPORT_RE.captures(&line) {
            for target in captures[1].split(',') {
                let module = target
                    .split_whitespace()
                    .next()
                    .unwrap_or("")
                    .to_string();
                if !module.is_empty() && !module.starts_with('.') {
                    imports.push(PyImport {
                        level: 0,
                        module,
                        names: Vec::new(),
                    });
                }
            }
        }
    }
    imports
}

/// Join parenthesized import continuations into single lines.
fn logical_lines(source: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut pending = String::new();
    let mut depth: i32 = 0;
    for raw in source.lines() {
        let line = raw.split('#').next().unwrap_or("");
        if depth > 0 {
            pending.push(' ');
            pending.push_str(line.trim());
            depth += paren_delta(line);
            if depth <= 0 {
                out.push(std::mem::take(&mut pending));
                depth = 0;
            }
            continue;
        }
        let trimmed = line.trim_start();
        let delta = paren_delta(line);
        if delta > 0 && (trimmed.starts_with("from ") || trimmed.starts_with("import ")) {
            pending = line.to_string();
            depth = delta;
        } else {
            out.push(line.to_string());
        }
    }
    if !pending.is_empty() {
        out.push(pending);
    }
    out
}

fn paren_delta(line: &str) -> i32 {
    line.chars().fold(0, |acc, c| match c {
        '(' => acc + 1,
        ')' => acc - 1,
        _ => acc,
    })
}

fn parse_names(raw: &str) -> Vec<String> {
    raw.replace(['(', ')', '\\'], " ")
        .split(',')
        .map(|name| {
            name.split_whitespace()
                .next()
                .unwrap_or("")
                .to_string()
        })
        .filter(|name| !name.is_empty())
        .collect()
}
