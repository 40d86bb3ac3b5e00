//! Dependency graph storage, cycle enumeration, and exports.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::str::FromStr;
use strata_core::StrataError;

/// Three-way classification of a dependency id relative to the analyzed
/// repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Internal,
    Stdlib,
    External,
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internal => write!(f, "internal"),
            Self::Stdlib => write!(f, "stdlib"),
            Self::External => write!(f, "external"),
        }
    }
}

/// A node record; the owning map's key is the node id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyNode {
    pub kind: DependencyKind,
    pub dependencies: BTreeSet<String>,
}

/// Supported export renderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Structured node records, keyed by id.
    Json,
    /// Graphviz digraph text (nodes + directed edges).
    Dot,
}

impl FromStr for ExportFormat {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "dot" => Ok(Self::Dot),
            other => Err(StrataError::UnknownFormat(other.to_string())),
        }
    }
}

/// In-memory dependency graph backed by petgraph, rebuilt wholesale on
/// every `build_dependency_graph()` call.
#[derive(Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    /// Map from node ids to petgraph indices.
    id_to_index: HashMap<String, NodeIndex>,
    /// Node records in id order.
    nodes: BTreeMap<String, DependencyNode>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. An id registered twice keeps its first kind.
    pub fn add_node(&mut self, id: &str, kind: DependencyKind) {
        if !self.id_to_index.contains_key(id) {
            let idx = self.graph.add_node(id.to_string());
            self.id_to_index.insert(id.to_string(), idx);
            self.nodes.insert(
                id.to_string(),
                DependencyNode {
                    kind,
                    dependencies: BTreeSet::new(),
                },
            );
        }
    }

    /// Add a directed edge between two registered nodes. Unregistered
    /// endpoints and self-edges are ignored.
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        let (Some(&from_idx), Some(&to_idx)) =
            (self.id_to_index.get(from), self.id_to_index.get(to))
        else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(from) {
            if node.dependencies.insert(to.to_string()) {
                self.graph.add_edge(from_idx, to_idx, ());
            }
        }
    }

    pub fn node(&self, id: &str) -> Option<&DependencyNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &BTreeMap<String, DependencyNode> {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.dependencies.len()).sum()
    }

    pub fn count_of_kind(&self, kind: DependencyKind) -> usize {
        self.nodes.values().filter(|n| n.kind == kind).count()
    }

    /// Inverse-edge lookup: every node depending on `id`, sorted.
    pub fn get_dependents(&self, id: &str) -> Vec<String> {
        let Some(&idx) = self.id_to_index.get(id) else {
            return Vec::new();
        };
        let mut dependents: Vec<String> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect();
        dependents.sort();
        dependents.dedup();
        dependents
    }

    /// Enumerate every simple cycle via exhaustive path-stack DFS from
    /// each node; a revisit of a node already on the stack closes a cycle.
    /// Rotations of the same cycle are deduplicated by canonicalizing on
    /// the lexically smallest member.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut cycles = Vec::new();
        for start in self.nodes.keys() {
            let mut stack: Vec<String> = Vec::new();
            self.dfs_cycles(start, &mut stack, &mut seen, &mut cycles);
        }
        cycles
    }

    fn dfs_cycles(
        &self,
        current: &str,
        stack: &mut Vec<String>,
        seen: &mut HashSet<Vec<String>>,
        out: &mut Vec<Vec<String>>,
    ) {
        stack.push(current.to_string());
        if let Some(node) = self.nodes.get(current) {
            for dep in &node.dependencies {
                if let Some(pos) = stack.iter().position(|n| n == dep) {
                    let cycle = canonical_rotation(&stack[pos..]);
                    if seen.insert(cycle.clone()) {
                        out.push(cycle);
                    }
                } else if self.nodes.contains_key(dep) {
                    self.dfs_cycles(dep, stack, seen, out);
                }
            }
        }
        stack.pop();
    }

    /// Render the graph in the requested format. An unsupported format
    /// string fails at `ExportFormat::from_str` (programmer error).
    pub fn export(&self, format: ExportFormat) -> Result<String, StrataError> {
        match format {
            ExportFormat::Json => Ok(serde_json::to_string_pretty(&self.nodes)?),
            ExportFormat::Dot => Ok(self.to_dot()),
        }
    }

    fn to_dot(&self) -> String {
        let mut out = String::from("digraph dependencies {\n");
        for (id, node) in &self.nodes {
            out.push_str(&format!("  \"{}\" [kind=\"{}\"];\n", id, node.kind));
        }
        for (id, node) in &self.nodes {
            for dep in &node.dependencies {
                out.push_str(&format!("  \"{}\" -> \"{}\";\n", id, dep));
            }
        }
        out.push_str("}\n");
        out
    }
}

/// Rotate a cycle so its lexically smallest id comes first.
fn canonical_rotation(cycle: &[String]) -> Vec<String> {
    let min_pos = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut out = Vec::with_capacity(cycle.len());
    out.extend_from_slice(&cycle[min_pos..]);
    out.extend_from_slice(&cycle[..min_pos]);
    out
}
