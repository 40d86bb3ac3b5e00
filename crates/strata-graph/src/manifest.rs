//! Manifest file parsing for module naming and dependency declarations.
//!
//! Analyzers consume manifests to seed internal-module names and to
//! recognize declared external packages. Parsing is best-effort: a
//! missing or corrupt manifest yields `None` and callers fall back to
//! directory-derived naming.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A declared dependency from any manifest kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: String,
    pub dev: bool,
}

/// A parsed package manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestInfo {
    /// Declared package name, when the manifest names one.
    pub name: Option<String>,
    pub dependencies: Vec<Dependency>,
    /// Workspace/monorepo member globs, when declared.
    pub workspace_members: Vec<String>,
}

impl ManifestInfo {
    pub fn dependency_names(&self) -> Vec<&str> {
        self.dependencies.iter().map(|d| d.name.as_str()).collect()
    }
}

/// A parsed `go.mod`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoManifest {
    /// The declared module path.
    pub module: String,
    /// Required module paths.
    pub requires: Vec<String>,
}

// ── Cargo.toml ───────────────────────────────────────────────────────────

/// Parse a Cargo.toml for its package name, dependency names, and
/// workspace members.
pub fn parse_cargo_toml(path: &Path) -> Option<ManifestInfo> {
    let content = std::fs::read_to_string(path).ok()?;
    let toml_value: toml::Value = toml::from_str(&content).ok()?;
    let table = toml_value.as_table()?;

    let mut info = ManifestInfo::default();

    if let Some(package) = table.get("package").and_then(|v| v.as_table()) {
        if let Some(name) = package.get("name").and_then(|v| v.as_str()) {
            info.name = Some(name.to_string());
        }
    }

    if let Some(workspace) = table.get("workspace").and_then(|v| v.as_table()) {
        if let Some(members) = workspace.get("members").and_then(|v| v.as_array()) {
            info.workspace_members = members
                .iter()
                .filter_map(|m| m.as_str().map(|s| s.to_string()))
                .collect();
        }
    }

    for (section, dev) in [("dependencies", false), ("dev-dependencies", true)] {
        if let Some(deps) = table.get(section).and_then(|v| v.as_table()) {
            for (name, value) in deps {
                info.dependencies.push(Dependency {
                    name: name.clone(),
                    version: cargo_dep_version(value),
                    dev,
                });
            }
        }
    }

    Some(info)
}

/// Version string from either `"1.0"` or `{ version = "1.0", ... }`.
fn cargo_dep_version(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Table(t) => t
            .get("version")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        _ => String::new(),
    }
}

// ── package.json ─────────────────────────────────────────────────────────

/// Parse a package.json for its name and dependency names.
pub fn parse_package_json(path: &Path) -> Option<ManifestInfo> {
    let content = std::fs::read_to_string(path).ok()?;
    let json: serde_json::Value = serde_json::from_str(&content).ok()?;
    let obj = json.as_object()?;

    let mut info = ManifestInfo {
        name: obj.get("name").and_then(|v| v.as_str()).map(String::from),
        ..ManifestInfo::default()
    };

    if let Some(workspaces) = obj.get("workspaces").and_then(|v| v.as_array()) {
        info.workspace_members = workspaces
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect();
    }

    for (section, dev) in [("dependencies", false), ("devDependencies", true)] {
        if let Some(deps) = obj.get(section).and_then(|v| v.as_object()) {
            for (name, value) in deps {
                info.dependencies.push(Dependency {
                    name: name.clone(),
                    version: value.as_str().unwrap_or("").to_string(),
                    dev,
                });
            }
        }
    }

    Some(info)
}

// ── pyproject.toml ───────────────────────────────────────────────────────

/// Parse a pyproject.toml `[project]` table for the package name and
/// dependency names (PEP 621 requirement strings reduced to their leading
/// package identifier).
pub fn parse_pyproject_toml(path: &Path) -> Option<ManifestInfo> {
    let content = std::fs::read_to_string(path).ok()?;
    let toml_value: toml::Value = toml::from_str(&content).ok()?;
    let project = toml_value.get("project")?.as_table()?;

    let mut info = ManifestInfo {
        name: project.get("name").and_then(|v| v.as_str()).map(String::from),
        ..ManifestInfo::default()
    };

    if let Some(deps) = project.get("dependencies").and_then(|v| v.as_array()) {
        for requirement in deps.iter().filter_map(|v| v.as_str()) {
            if let Some(name) = requirement_name(requirement) {
                info.dependencies.push(Dependency {
                    name,
                    version: requirement.to_string(),
                    dev: false,
                });
            }
        }
    }

    Some(info)
}

/// Leading package identifier of a PEP 508 requirement string.
fn requirement_name(requirement: &str) -> Option<String> {
    let name: String = requirement
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

// ── go.mod ───────────────────────────────────────────────────────────────

/// Parse a go.mod for the module path and required modules.
pub fn parse_go_mod(path: &Path) -> Option<GoManifest> {
    let content = std::fs::read_to_string(path).ok()?;

    let mut manifest = GoManifest::default();
    let mut in_require = false;
    for line in content.lines() {
        let line = line.split("//").next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        if in_require {
            if line.starts_with(')') {
                in_require = false;
            } else if let Some(module) = line.split_whitespace().next() {
                manifest.requires.push(module.to_string());
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("module ") {
            manifest.module = rest.trim().to_string();
        } else if line.starts_with("require (") {
            in_require = true;
        } else if let Some(rest) = line.strip_prefix("require ") {
            if let Some(module) = rest.split_whitespace().next() {
                manifest.requires.push(module.to_string());
            }
        }
    }

    if manifest.module.is_empty() {
        None
    } else {
        Some(manifest)
    }
}

// ── Directory scanning ───────────────────────────────────────────────────

/// Find and parse every Cargo.toml under a root, skipping common build
/// and dependency directories.
pub fn scan_cargo_manifests(root: &Path) -> Vec<(PathBuf, ManifestInfo)> {
    let mut manifests = Vec::new();

    let walker = walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_dir() {
                return !matches!(
                    name.as_ref(),
                    "node_modules" | "target" | ".git" | "vendor" | "dist" | "build"
                );
            }
            true
        });

    for entry in walker.flatten() {
        if entry.file_type().is_file() && entry.file_name() == "Cargo.toml" {
            if let Some(info) = parse_cargo_toml(entry.path()) {
                manifests.push((entry.path().to_path_buf(), info));
            }
        }
    }

    manifests
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_temp_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        fs::write(&path, content).expect("failed to write temp file");
        path
    }

    fn setup(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn parse_simple_cargo_toml() {
        let dir = setup("strata_manifest_cargo");
        let content = r#"
[package]
name = "my-crate"
version = "0.1.0"

[dependencies]
serde = "1.0"
tokio = { version = "1", features = ["full"] }

[dev-dependencies]
tempfile = "3"
"#;
        let path = write_temp_file(&dir, "Cargo.toml", content);
        let info = parse_cargo_toml(&path).expect("should parse");

        assert_eq!(info.name.as_deref(), Some("my-crate"));
        assert!(info
            .dependencies
            .iter()
            .any(|d| d.name == "serde" && d.version == "1.0" && !d.dev));
        assert!(info
            .dependencies
            .iter()
            .any(|d| d.name == "tokio" && d.version == "1"));
        assert!(info.dependencies.iter().any(|d| d.name == "tempfile" && d.dev));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn parse_cargo_workspace_members() {
        let dir = setup("strata_manifest_workspace");
        let content = r#"
[workspace]
members = ["crates/core", "crates/cli"]
resolver = "2"
"#;
        let path = write_temp_file(&dir, "Cargo.toml", content);
        let info = parse_cargo_toml(&path).expect("should parse");
        assert_eq!(info.name, None);
        assert_eq!(info.workspace_members, vec!["crates/core", "crates/cli"]);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn parse_simple_package_json() {
        let dir = setup("strata_manifest_npm");
        let content = r#"
{
    "name": "my-app",
    "dependencies": { "react": "^18.0.0" },
    "devDependencies": { "jest": "^29.0.0" }
}
"#;
        let path = write_temp_file(&dir, "package.json", content);
        let info = parse_package_json(&path).expect("should parse");

        assert_eq!(info.name.as_deref(), Some("my-app"));
        assert!(info.dependencies.iter().any(|d| d.name == "react" && !d.dev));
        assert!(info.dependencies.iter().any(|d| d.name == "jest" && d.dev));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn parse_pyproject_reduces_requirements_to_names() {
        let dir = setup("strata_manifest_pyproject");
        let content = r#"
[project]
name = "my-tool"
dependencies = [
    "requests>=2.28",
    "rich",
    "typing-extensions; python_version < '3.11'",
]
"#;
        let path = write_temp_file(&dir, "pyproject.toml", content);
        let info = parse_pyproject_toml(&path).expect("should parse");

        assert_eq!(info.name.as_deref(), Some("my-tool"));
        let names = info.dependency_names();
        assert_eq!(names, vec!["requests", "rich", "typing-extensions"]);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn parse_go_mod_module_and_requires() {
        let dir = setup("strata_manifest_gomod");
        let content = r#"
module github.com/acme/widget

go 1.22

require (
    github.com/pkg/errors v0.9.1
    golang.org/x/sync v0.3.0 // indirect
)

require gopkg.in/yaml.v3 v3.0.1
"#;
        let path = write_temp_file(&dir, "go.mod", content);
        let manifest = parse_go_mod(&path).expect("should parse");

        assert_eq!(manifest.module, "github.com/acme/widget");
        assert_eq!(
            manifest.requires,
            vec![
                "github.com/pkg/errors",
                "golang.org/x/sync",
                "gopkg.in/yaml.v3"
            ]
        );

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_or_invalid_manifests_return_none() {
        assert!(parse_cargo_toml(Path::new("/nonexistent/Cargo.toml")).is_none());
        assert!(parse_go_mod(Path::new("/nonexistent/go.mod")).is_none());

        let dir = setup("strata_manifest_invalid");
        let path = write_temp_file(&dir, "Cargo.toml", "this is not valid toml {{{{");
        assert!(parse_cargo_toml(&path).is_none());
        let path = write_temp_file(&dir, "go.mod", "go 1.22\n");
        assert!(parse_go_mod(&path).is_none(), "go.mod without module line");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn scan_finds_nested_cargo_manifests() {
        let dir = setup("strata_manifest_scan");
        write_temp_file(
            &dir,
            "Cargo.toml",
            "[workspace]\nmembers = [\"member\"]\n",
        );
        write_temp_file(
            &dir,
            "member/Cargo.toml",
            "[package]\nname = \"member-crate\"\nversion = \"0.1.0\"\n",
        );
        write_temp_file(
            &dir,
            "target/Cargo.toml",
            "[package]\nname = \"ignored\"\nversion = \"0.1.0\"\n",
        );

        let manifests = scan_cargo_manifests(&dir);
        let names: Vec<Option<&str>> = manifests.iter().map(|(_, m)| m.name.as_deref()).collect();
        assert_eq!(manifests.len(), 2, "target/ must be skipped");
        assert!(names.contains(&Some("member-crate")));

        fs::remove_dir_all(&dir).ok();
    }
}
