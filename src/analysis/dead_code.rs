//! Reachability-based dead code detection.

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use super::DependencyAnalyzer;
use crate::graph::types::meta;
use crate::graph::{NodeKind, Relationship};
use crate::parser::is_lifecycle_callback;
use crate::pattern::PatternSet;
use crate::query::render::write_more;
use crate::query::NodeRef;

/// Entry point names listed in a report.
const MAX_LISTED_ENTRY_POINTS: usize = 20;

/// Incoming relationships that make their source live when the target is.
const LIVENESS_EDGES: [Relationship; 3] = [
    Relationship::Calls,
    Relationship::References,
    Relationship::ConnectsTo,
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeadCodeResult {
    pub total_unreachable: usize,
    pub unreachable_functions: Vec<NodeRef>,
    pub unreachable_classes: Vec<NodeRef>,
    /// Signals that are also never emitted nor connected.
    pub unreachable_signals: Vec<NodeRef>,
    pub total_entry_points: usize,
    /// Names of the first entry points, in graph order.
    pub entry_points_used: Vec<String>,
    pub total_reachable: usize,
}

impl<'g> DependencyAnalyzer<'g> {
    /// Report functions, classes, and signals not reachable from any entry
    /// point. Entry points are nodes in files matching `entry_patterns`,
    /// lifecycle callbacks, scenes, and scene-declared signal connections.
    pub fn detect_dead_code(&self, entry_patterns: &PatternSet) -> DeadCodeResult {
        let graph = self.graph;
        let mut result = DeadCodeResult::default();

        let entries: Vec<NodeIndex> = graph
            .vertices()
            .filter(|&idx| {
                let Some(node) = graph.node_at(idx) else {
                    return false;
                };
                entry_patterns.matches_any(&node.file_path)
                    || (node.kind == NodeKind::Function && is_lifecycle_callback(&node.name))
                    || node.kind == NodeKind::Scene
                    || (node.kind == NodeKind::SignalConnection
                        && node.meta_flag(meta::DEFINED_IN_SCENE))
            })
            .collect();

        result.total_entry_points = entries.len();
        result.entry_points_used = entries
            .iter()
            .take(MAX_LISTED_ENTRY_POINTS)
            .filter_map(|&idx| graph.node_at(idx))
            .map(|n| n.name.clone())
            .collect();

        // forward along every edge, backward along liveness edges
        let mut reachable: HashSet<NodeIndex> = HashSet::new();
        let mut to_visit = entries;
        while let Some(current) = to_visit.pop() {
            if !reachable.insert(current) {
                continue;
            }
            for (target, _) in graph.out_edges_at(current) {
                if graph.is_live(target) && !reachable.contains(&target) {
                    to_visit.push(target);
                }
            }
            for (source, edge) in graph.in_edges_at(current) {
                if LIVENESS_EDGES.contains(&edge.relationship)
                    && graph.is_live(source)
                    && !reachable.contains(&source)
                {
                    to_visit.push(source);
                }
            }
        }
        result.total_reachable = reachable.len();

        for idx in graph.vertices() {
            if reachable.contains(&idx) {
                continue;
            }
            let Some(node) = graph.node_at(idx) else {
                continue;
            };
            match node.kind {
                NodeKind::Function => {
                    // `_private` helpers may be invoked reflectively
                    if node.name.starts_with('_') && !is_lifecycle_callback(&node.name) {
                        continue;
                    }
                    result.unreachable_functions.push(NodeRef::from(node));
                }
                NodeKind::Class => result.unreachable_classes.push(NodeRef::from(node)),
                NodeKind::Signal => {
                    let emitted = graph
                        .in_edges_at(idx)
                        .iter()
                        .any(|(_, e)| e.relationship == Relationship::Emits);
                    let connected = graph
                        .out_edges_at(idx)
                        .iter()
                        .any(|(_, e)| e.relationship == Relationship::ConnectsTo);
                    if !emitted && !connected {
                        result.unreachable_signals.push(NodeRef::from(node));
                    }
                }
                _ => {}
            }
        }

        result.total_unreachable = result.unreachable_functions.len()
            + result.unreachable_classes.len()
            + result.unreachable_signals.len();
        debug!(
            entries = result.total_entry_points,
            reachable = result.total_reachable,
            unreachable = result.total_unreachable,
            "dead code scan"
        );
        result
    }
}

fn write_section(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    nodes: &[NodeRef],
    limit: usize,
    label: impl Fn(&NodeRef) -> String,
) -> fmt::Result {
    if nodes.is_empty() {
        return Ok(());
    }
    writeln!(f, "\n=== {} ({}) ===", title, nodes.len())?;
    for node in nodes.iter().take(limit) {
        writeln!(f, "  {}", label(node))?;
        writeln!(f, "       @ {}:{}", node.file_path, node.line_number)?;
    }
    write_more(f, "  ", nodes.len().min(limit), nodes.len(), "")
}

impl fmt::Display for DeadCodeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DEAD CODE ANALYSIS")?;
        writeln!(f, "Entry points: {}", self.total_entry_points)?;
        writeln!(f, "Reachable nodes: {}", self.total_reachable)?;
        writeln!(f, "Potentially unreachable: {}", self.total_unreachable)?;

        write_section(f, "UNREACHABLE FUNCTIONS", &self.unreachable_functions, 20, |n| {
            format!("{}()", n.name)
        })?;
        write_section(f, "UNREACHABLE CLASSES", &self.unreachable_classes, 10, |n| {
            format!("class {}", n.name)
        })?;
        write_section(f, "UNUSED SIGNALS", &self.unreachable_signals, 10, |n| {
            format!("signal {}", n.name)
        })?;

        if self.total_unreachable == 0 {
            writeln!(f, "\nNo obvious dead code detected!")?;
        }
        Ok(())
    }
}
