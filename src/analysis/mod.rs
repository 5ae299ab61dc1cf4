//! Dependency analysis: circular dependencies, dead code, change impact,
//! and coupling hot spots.
//!
//! Like the query engine, every analysis borrows the graph read-only and
//! returns a plain result value.

pub mod cycles;
pub mod dead_code;
pub mod impact;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::graph::engine::CodeGraph;
use crate::query::render::{node_line, write_more};
use crate::query::{NodeRef, QueryEngine};

pub use cycles::{Cycle, CycleReport, CycleType, Severity};
pub use dead_code::DeadCodeResult;
pub use impact::{ImpactEntry, ImpactResult, RiskLevel};

/// Structural analyses over a [`CodeGraph`].
#[derive(Clone, Copy)]
pub struct DependencyAnalyzer<'g> {
    graph: &'g CodeGraph,
}

impl<'g> DependencyAnalyzer<'g> {
    pub fn new(graph: &'g CodeGraph) -> Self {
        Self { graph }
    }

    /// Query primitives over the same graph.
    pub fn queries(&self) -> QueryEngine<'g> {
        QueryEngine::new(self.graph)
    }

    /// Nodes whose in-degree plus out-degree is at least `min_connections`,
    /// most connected first. Dangling edges count toward the degree.
    pub fn find_highly_coupled_nodes(&self, min_connections: usize) -> CouplingReport {
        let mut nodes: Vec<CoupledNode> = self
            .graph
            .vertices()
            .filter_map(|idx| {
                let node = self.graph.node_at(idx)?;
                let in_degree = self.graph.in_edges_at(idx).len();
                let out_degree = self.graph.out_edges_at(idx).len();
                let total = in_degree + out_degree;
                (total >= min_connections).then(|| CoupledNode {
                    node: NodeRef::from(node),
                    in_degree,
                    out_degree,
                    total_connections: total,
                })
            })
            .collect();
        nodes.sort_by(|a, b| b.total_connections.cmp(&a.total_connections));

        CouplingReport {
            min_connections,
            total_count: nodes.len(),
            nodes,
        }
    }
}

// ─── Coupling ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoupledNode {
    pub node: NodeRef,
    pub in_degree: usize,
    pub out_degree: usize,
    pub total_connections: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouplingReport {
    pub min_connections: usize,
    pub nodes: Vec<CoupledNode>,
    pub total_count: usize,
}

const MAX_SHOWN_COUPLED: usize = 30;

impl fmt::Display for CouplingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nodes.is_empty() {
            return writeln!(
                f,
                "No nodes with {} or more connections",
                self.min_connections
            );
        }
        writeln!(
            f,
            "HIGHLY COUPLED NODES (>= {} connections): {}",
            self.min_connections, self.total_count
        )?;
        writeln!(f)?;
        for entry in self.nodes.iter().take(MAX_SHOWN_COUPLED) {
            writeln!(
                f,
                "  {:>4} (in {}, out {})  {}",
                entry.total_connections,
                entry.in_degree,
                entry.out_degree,
                node_line(&entry.node)
            )?;
        }
        write_more(f, "  ", self.nodes.len().min(MAX_SHOWN_COUPLED), self.total_count, "")
    }
}
