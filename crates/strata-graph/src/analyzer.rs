//! The per-language dependency analyzer trait and report rendering.

use crate::graph::{DependencyGraph, DependencyKind};
use std::str::FromStr;
use strata_core::StrataError;

/// Renderings of the dependency summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextFormat {
    Markdown,
    Text,
}

impl FromStr for ContextFormat {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markdown" | "md" => Ok(Self::Markdown),
            "text" | "plain" => Ok(Self::Text),
            other => Err(StrataError::UnknownFormat(other.to_string())),
        }
    }
}

/// One plugin per supported language. Building is idempotent and always a
/// full rebuild; graphs and cycles are ephemeral query-time values.
pub trait DependencyAnalyzer: Send + Sync + std::fmt::Debug {
    fn language(&self) -> &'static str;

    /// Rebuild the module dependency graph from the repository's current
    /// state.
    fn build_dependency_graph(&self) -> DependencyGraph;

    /// Language-specific reporting lines for the summary.
    fn insights(&self, _graph: &DependencyGraph) -> Vec<String> {
        Vec::new()
    }

    /// Render a textual summary (counts, cycles, insights) from a fresh
    /// graph build.
    fn generate_llm_context(&self, format: ContextFormat) -> String {
        let graph = self.build_dependency_graph();
        let insights = self.insights(&graph);
        render_context(self.language(), &graph, &insights, format)
    }
}

/// At most this many cycles are listed in a summary; the remainder is
/// reported as a count.
const MAX_REPORTED_CYCLES: usize = 10;

pub(crate) fn render_context(
    language: &str,
    graph: &DependencyGraph,
    insights: &[String],
    format: ContextFormat,
) -> String {
    let cycles = graph.find_cycles();
    let internal = graph.count_of_kind(DependencyKind::Internal);
    let external = graph.count_of_kind(DependencyKind::External);
    let stdlib = graph.count_of_kind(DependencyKind::Stdlib);

    let mut out = String::new();
    match format {
        ContextFormat::Markdown => {
            out.push_str(&format!("# Dependency analysis ({})\n\n", language));
            out.push_str(&format!(
                "- modules: {} internal, {} external, {} stdlib\n",
                internal, external, stdlib
            ));
            out.push_str(&format!("- edges: {}\n\n", graph.edge_count()));
            out.push_str("## Cycles\n\n");
            if cycles.is_empty() {
                out.push_str("No dependency cycles detected.\n");
            } else {
                for cycle in cycles.iter().take(MAX_REPORTED_CYCLES) {
                    out.push_str(&format!("- {}\n", render_cycle(cycle)));
                }
                if cycles.len() > MAX_REPORTED_CYCLES {
                    out.push_str(&format!(
                        "- ... and {} more\n",
                        cycles.len() - MAX_REPORTED_CYCLES
                    ));
                }
            }
            if !insights.is_empty() {
                out.push_str("\n## Notes\n\n");
                for line in insights {
                    out.push_str(&format!("- {}\n", line));
                }
            }
        }
        ContextFormat::Text => {
            out.push_str(&format!("Dependency analysis ({})\n", language));
            out.push_str(&format!(
                "modules: {} internal, {} external, {} stdlib; edges: {}\n",
                internal,
                external,
                stdlib,
                graph.edge_count()
            ));
            if cycles.is_empty() {
                out.push_str("no dependency cycles detected\n");
            } else {
                out.push_str(&format!("cycles ({}):\n", cycles.len()));
                for cycle in cycles.iter().take(MAX_REPORTED_CYCLES) {
                    out.push_str(&format!("  {}\n", render_cycle(cycle)));
                }
                if cycles.len() > MAX_REPORTED_CYCLES {
                    out.push_str(&format!(
                        "  ... and {} more\n",
                        cycles.len() - MAX_REPORTED_CYCLES
                    ));
                }
            }
            for line in insights {
                out.push_str(&format!("note: {}\n", line));
            }
        }
    }
    out
}

fn render_cycle(cycle: &[String]) -> String {
    let mut rendered = cycle.join(" -> ");
    if let Some(first) = cycle.first() {
        rendered.push_str(" -> ");
        rendered.push_str(first);
    }
    rendered
}
