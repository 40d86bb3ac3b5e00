//! Git-aware repository scanning with cascading ignore rules.
//!
//! Walks a repository recursively, maintaining a root-to-current stack of
//! per-directory `.gitignore` rule sets. For every candidate path the
//! applicable sets are evaluated root-first; the last matching pattern
//! across that concatenation decides inclusion, so deeper rules (including
//! negations) override shallower ones.

use globset::{GlobBuilder, GlobMatcher};
use std::fs;
use std::path::{Path, PathBuf};
use strata_core::FileEntry;

/// A single parsed ignore rule.
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    pub pattern: String,
    pub is_negation: bool,
    pub is_anchored: bool,
    pub directory_only: bool,
    has_separator: bool,
    matcher: GlobMatcher,
}

impl IgnoreRule {
    /// Parse one `.gitignore` line. Returns `None` for blanks, comments,
    /// and patterns that fail to compile.
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let (is_negation, rest) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let (directory_only, rest) = match rest.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, rest),
        };
        let (is_anchored, rest) = match rest.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, rest),
        };
        if rest.is_empty() {
            return None;
        }

        // A pattern with an internal separator is anchored to the declaring
        // directory even without a leading slash.
        let has_separator = rest.contains('/');
        let matcher = match GlobBuilder::new(rest)
            .literal_separator(is_anchored || has_separator)
            .build()
        {
            Ok(glob) => glob.compile_matcher(),
            Err(e) => {
                tracing::warn!("Skipping unparsable ignore pattern {:?}: {}", line, e);
                return None;
            }
        };

        Some(Self {
            pattern: rest.to_string(),
            is_negation,
            is_anchored,
            directory_only,
            has_separator,
            matcher,
        })
    }

    /// Does this rule match a candidate, given its path relative to the
    /// rule's declaring directory and its basename?
    fn matches(&self, local_path: &str, name: &str, is_dir: bool) -> bool {
        if self.directory_only && !is_dir {
            return false;
        }
        if self.is_anchored || self.has_separator {
            self.matcher.is_match(local_path)
        } else {
            // No separator: match the basename at any depth beneath the
            // declaring directory.
            self.matcher.is_match(name)
        }
    }
}

/// The ordered rules of one `.gitignore`, scoped to its declaring directory.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRuleSet {
    /// Declaring directory, relative to the scan root ("" for the root).
    base: String,
    rules: Vec<IgnoreRule>,
}

impl IgnoreRuleSet {
    /// Load the `.gitignore` of a directory; a missing or unreadable file
    /// yields an empty set.
    pub fn load(dir: &Path, base: &str) -> Self {
        let gitignore = dir.join(".gitignore");
        let content = match fs::read_to_string(&gitignore) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                tracing::warn!("Unreadable {}: {}", gitignore.display(), e);
                String::new()
            }
        };
        Self::parse(&content, base)
    }

    /// Parse rule lines scoped to `base`.
    pub fn parse(content: &str, base: &str) -> Self {
        Self {
            base: base.to_string(),
            rules: content.lines().filter_map(IgnoreRule::parse).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    /// Evaluate every rule in order against a candidate; the last matching
    /// rule decides. `None` when no rule matched.
    fn decide(&self, rel_path: &str, name: &str, is_dir: bool) -> Option<bool> {
        let local = if self.base.is_empty() {
            rel_path
        } else {
            rel_path.strip_prefix(self.base.as_str())?.strip_prefix('/')?
        };

        let mut decision = None;
        for rule in &self.rules {
            if rule.matches(local, name, is_dir) {
                decision = Some(!rule.is_negation);
            }
        }
        decision
    }
}

/// Recursive repository walker honoring cascading `.gitignore` semantics.
pub struct GitAwareFileTree {
    root: PathBuf,
    /// Root-level directory names excluded from every scan (index
    /// artifacts, like the incremental cache directory).
    excluded: Vec<String>,
}

impl GitAwareFileTree {
    /// A non-existent root is accepted; scans against it yield empty
    /// results.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excluded: Vec::new(),
        }
    }

    /// Exclude a root-level directory name from scans.
    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excluded.push(name.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Produce the ordered file/directory listing. Entries are sorted by
    /// name within each directory, parents before children. Never fails;
    /// unreadable entries are skipped with a warning.
    pub fn scan(&self) -> Vec<FileEntry> {
        let mut entries = Vec::new();
        if !self.root.is_dir() {
            tracing::warn!("Scan root {} is not a directory", self.root.display());
            return entries;
        }
        let mut stack = vec![IgnoreRuleSet::load(&self.root, "")];
        self.walk(&self.root, "", &mut stack, &mut entries);
        entries
    }

    /// Non-directory entries of a scan.
    pub fn files(&self) -> Vec<FileEntry> {
        self.scan().into_iter().filter(|e| !e.is_directory).collect()
    }

    fn walk(
        &self,
        dir: &Path,
        rel: &str,
        stack: &mut Vec<IgnoreRuleSet>,
        out: &mut Vec<FileEntry>,
    ) {
        let reader = match fs::read_dir(dir) {
            Ok(reader) => reader,
            Err(e) => {
                tracing::warn!("Unreadable directory {}: {}", dir.display(), e);
                return;
            }
        };

        let mut children: Vec<(String, PathBuf, bool, u64)> = Vec::new();
        for entry in reader {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Unreadable entry under {}: {}", dir.display(), e);
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::warn!("Cannot stat {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            let is_dir = meta.is_dir();
            let size = if is_dir { 0 } else { meta.len() };
            children.push((name, entry.path(), is_dir, size));
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, path, is_dir, size) in children {
            // The VCS bookkeeping directory is always excluded, regardless
            // of ignore-rule content.
            if name == ".git" {
                continue;
            }
            if rel.is_empty() && self.excluded.iter().any(|e| e == &name) {
                continue;
            }

            let rel_path = if rel.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", rel, name)
            };

            if self.is_ignored(&rel_path, &name, is_dir, stack) {
                continue;
            }

            out.push(FileEntry {
                path: rel_path.clone(),
                name,
                is_directory: is_dir,
                size,
            });

            if is_dir {
                stack.push(IgnoreRuleSet::load(&path, &rel_path));
                self.walk(&path, &rel_path, stack, out);
                stack.pop();
            }
        }
    }

    fn is_ignored(&self, rel_path: &str, name: &str, is_dir: bool, stack: &[IgnoreRuleSet]) -> bool {
        let mut ignored = false;
        for set in stack {
            if let Some(decision) = set.decide(rel_path, name, is_dir) {
                ignored = decision;
            }
        }
        ignored
    }
}
