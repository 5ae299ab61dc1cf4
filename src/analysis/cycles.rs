//! Circular dependency detection.
//!
//! Elementary cycles are enumerated with Johnson's algorithm: split the
//! graph into strongly connected components, search circuits through the
//! lowest vertex of each component, remove that vertex, and repeat on the
//! sub-components. Placeholder vertices never take part.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::debug;

use super::DependencyAnalyzer;
use crate::graph::engine::CodeGraph;
use crate::graph::Relationship;
use crate::query::render::write_more;
use crate::query::NodeRef;

/// Classification by the relationships along a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleType {
    Call,
    Signal,
    Resource,
    Data,
}

impl CycleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleType::Call => "call",
            CycleType::Signal => "signal",
            CycleType::Resource => "resource",
            CycleType::Data => "data",
        }
    }

    fn classify(relationships: &HashSet<Relationship>) -> Self {
        if relationships.contains(&Relationship::Calls) {
            CycleType::Call
        } else if relationships.contains(&Relationship::Emits)
            || relationships.contains(&Relationship::ConnectsTo)
        {
            CycleType::Signal
        } else if relationships.contains(&Relationship::References) {
            CycleType::Resource
        } else {
            CycleType::Data
        }
    }
}

impl fmt::Display for CycleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short cycles are tight couplings; long ones are more often incidental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn for_length(length: usize) -> Self {
        match length {
            0..=2 => Severity::High,
            3..=4 => Severity::Medium,
            _ => Severity::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One elementary cycle. The last node has an edge back to the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    pub nodes: Vec<NodeRef>,
    /// Relationships of the followed edges, in encounter order.
    pub relationships: Vec<Relationship>,
    pub length: usize,
    pub cycle_type: CycleType,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleReport {
    pub total_cycles: usize,
    pub cycles: Vec<Cycle>,
    pub by_type: BTreeMap<String, usize>,
    /// Relationship filter the search ran with; empty means all.
    pub relationship_filter: Vec<Relationship>,
}

impl<'g> DependencyAnalyzer<'g> {
    /// Enumerate up to `max_cycles` elementary cycles of length two or more,
    /// following only edges whose relationship is in `relationships` (all
    /// edges when it is empty).
    pub fn detect_circular_dependencies(
        &self,
        relationships: &[Relationship],
        max_cycles: usize,
    ) -> CycleReport {
        let allowed = |rel: Relationship| relationships.is_empty() || relationships.contains(&rel);
        let adjacency = filtered_adjacency(self.graph, &allowed);
        let raw = johnson_cycles(&adjacency, max_cycles);
        debug!(cycles = raw.len(), "cycle search");

        let mut report = CycleReport {
            relationship_filter: relationships.to_vec(),
            ..CycleReport::default()
        };

        for vertices in raw {
            let mut kinds = HashSet::new();
            let mut followed = Vec::with_capacity(vertices.len());
            for (i, &from) in vertices.iter().enumerate() {
                let to = vertices[(i + 1) % vertices.len()];
                kinds.extend(
                    self.graph
                        .out_edges_at(from)
                        .into_iter()
                        .filter(|(next, e)| *next == to && allowed(e.relationship))
                        .map(|(_, e)| e.relationship),
                );
                if let Some(edge) = self.graph.best_edge_between(from, to, &allowed) {
                    followed.push(edge.relationship);
                }
            }

            let nodes: Vec<NodeRef> = vertices
                .iter()
                .filter_map(|&idx| self.graph.node_at(idx))
                .map(NodeRef::from)
                .collect();
            let cycle_type = CycleType::classify(&kinds);
            *report
                .by_type
                .entry(cycle_type.as_str().to_string())
                .or_default() += 1;
            report.cycles.push(Cycle {
                length: nodes.len(),
                severity: Severity::for_length(nodes.len()),
                cycle_type,
                relationships: followed,
                nodes,
            });
        }

        report.total_cycles = report.cycles.len();
        report
    }
}

/// Distinct live successors per live vertex, in vertex order. Self-loops are
/// dropped since cycles shorter than two are not reported.
fn filtered_adjacency(
    graph: &CodeGraph,
    allowed: &dyn Fn(Relationship) -> bool,
) -> BTreeMap<NodeIndex, Vec<NodeIndex>> {
    graph
        .vertices()
        .filter(|idx| graph.is_live(*idx))
        .map(|idx| {
            let mut next: Vec<NodeIndex> = graph
                .out_edges_at(idx)
                .into_iter()
                .filter(|(to, e)| *to != idx && graph.is_live(*to) && allowed(e.relationship))
                .map(|(to, _)| to)
                .collect();
            next.sort();
            next.dedup();
            (idx, next)
        })
        .collect()
}

/// Strongly connected components of the subgraph induced by `members`.
fn components(
    adjacency: &BTreeMap<NodeIndex, Vec<NodeIndex>>,
    members: &[NodeIndex],
) -> Vec<Vec<NodeIndex>> {
    let mut sub: DiGraph<NodeIndex, ()> = DiGraph::new();
    let local: HashMap<NodeIndex, NodeIndex> =
        members.iter().map(|&v| (v, sub.add_node(v))).collect();
    for &v in members {
        for next in adjacency.get(&v).into_iter().flatten() {
            if let Some(&to) = local.get(next) {
                sub.add_edge(local[&v], to, ());
            }
        }
    }
    tarjan_scc(&sub)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|scc| {
            let mut scc: Vec<NodeIndex> = scc.into_iter().map(|i| sub[i]).collect();
            scc.sort();
            scc
        })
        .collect()
}

fn johnson_cycles(
    adjacency: &BTreeMap<NodeIndex, Vec<NodeIndex>>,
    max_cycles: usize,
) -> Vec<Vec<NodeIndex>> {
    let mut cycles = Vec::new();
    if max_cycles == 0 {
        return cycles;
    }

    let all: Vec<NodeIndex> = adjacency.keys().copied().collect();
    let mut pending = components(adjacency, &all);
    // lowest component first
    pending.sort_by(|a, b| b[0].cmp(&a[0]));

    while let Some(scc) = pending.pop() {
        let start = scc[0];
        let members: HashSet<NodeIndex> = scc.iter().copied().collect();
        circuits_from(start, adjacency, &members, max_cycles, &mut cycles);
        if cycles.len() >= max_cycles {
            break;
        }

        let rest: Vec<NodeIndex> = scc[1..].to_vec();
        let mut subs = components(adjacency, &rest);
        subs.sort_by(|a, b| b[0].cmp(&a[0]));
        pending.extend(subs);
        pending.sort_by(|a, b| b[0].cmp(&a[0]));
    }
    cycles
}

/// All elementary circuits through `start` inside `members`.
fn circuits_from(
    start: NodeIndex,
    adjacency: &BTreeMap<NodeIndex, Vec<NodeIndex>>,
    members: &HashSet<NodeIndex>,
    max_cycles: usize,
    out: &mut Vec<Vec<NodeIndex>>,
) {
    let successors = |v: NodeIndex| -> Vec<NodeIndex> {
        adjacency
            .get(&v)
            .into_iter()
            .flatten()
            .copied()
            .filter(|n| members.contains(n))
            .collect()
    };

    let mut path = vec![start];
    let mut blocked: HashSet<NodeIndex> = HashSet::from([start]);
    let mut closed: HashSet<NodeIndex> = HashSet::new();
    let mut b: HashMap<NodeIndex, HashSet<NodeIndex>> = HashMap::new();
    let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> = vec![(start, successors(start), 0)];

    while let Some((this, nbrs, pos)) = stack.last_mut() {
        let this = *this;
        if *pos < nbrs.len() {
            let next = nbrs[*pos];
            *pos += 1;
            if next == start {
                out.push(path.clone());
                if out.len() >= max_cycles {
                    return;
                }
                closed.extend(path.iter().copied());
            } else if !blocked.contains(&next) {
                path.push(next);
                stack.push((next, successors(next), 0));
                closed.remove(&next);
                blocked.insert(next);
            }
            continue;
        }

        if closed.contains(&this) {
            unblock(this, &mut blocked, &mut b);
        } else {
            for next in successors(this) {
                b.entry(next).or_default().insert(this);
            }
        }
        stack.pop();
        path.pop();
    }
}

fn unblock(
    node: NodeIndex,
    blocked: &mut HashSet<NodeIndex>,
    b: &mut HashMap<NodeIndex, HashSet<NodeIndex>>,
) {
    let mut stack = vec![node];
    while let Some(v) = stack.pop() {
        if blocked.remove(&v) {
            if let Some(waiting) = b.remove(&v) {
                stack.extend(waiting);
            }
        }
    }
}

// ─── Rendering ──────────────────────────────────────────────────

const MAX_SHOWN_CYCLES: usize = 10;

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "CIRCULAR DEPENDENCY ({}, {})",
            self.cycle_type, self.severity
        )?;
        writeln!(f, "Length: {} nodes", self.length)?;
        for (i, node) in self.nodes.iter().enumerate() {
            let arrow = if i + 1 < self.nodes.len() { " →" } else { " ↩" };
            writeln!(f, "  [{}] {}: {}", i + 1, node.kind, node.name)?;
            writeln!(f, "       @ {}:{}{}", node.file_path, node.line_number, arrow)?;
        }
        Ok(())
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total_cycles == 0 {
            return writeln!(f, "NO CIRCULAR DEPENDENCIES FOUND");
        }
        writeln!(f, "CIRCULAR DEPENDENCIES DETECTED: {}", self.total_cycles)?;
        writeln!(f, "\nBy type:")?;
        let mut by_type: Vec<(&String, &usize)> = self.by_type.iter().collect();
        by_type.sort_by(|a, b| b.1.cmp(a.1));
        for (cycle_type, count) in by_type {
            writeln!(f, "  {}: {}", cycle_type, count)?;
        }

        for (i, cycle) in self.cycles.iter().take(MAX_SHOWN_CYCLES).enumerate() {
            writeln!(f, "\n--- Cycle {} ---", i + 1)?;
            write!(f, "{}", cycle)?;
        }
        write_more(
            f,
            "\n",
            self.cycles.len().min(MAX_SHOWN_CYCLES),
            self.cycles.len(),
            "cycles",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node, NodeKind};

    fn graph(nodes: &[&str], edges: &[(&str, &str, Relationship)]) -> CodeGraph {
        let mut g = CodeGraph::new();
        for id in nodes {
            g.add_node(Node::new(*id, NodeKind::Function, *id, "x.gd", 1, "gdscript"));
        }
        for (s, t, rel) in edges {
            g.add_edge(Edge::new(*s, *t, *rel));
        }
        g
    }

    fn closes(g: &CodeGraph, cycle: &Cycle) -> bool {
        let ids: Vec<&str> = cycle.nodes.iter().map(|n| n.id.as_str()).collect();
        (0..ids.len()).all(|i| {
            let next = ids[(i + 1) % ids.len()];
            g.outgoing(ids[i]).iter().any(|e| e.target_id == next)
        })
    }

    #[test]
    fn test_three_node_call_cycle() {
        let g = graph(
            &["x", "y", "z"],
            &[
                ("x", "y", Relationship::Calls),
                ("y", "z", Relationship::Calls),
                ("z", "x", Relationship::Calls),
            ],
        );
        let report = DependencyAnalyzer::new(&g).detect_circular_dependencies(&[], 50);

        assert_eq!(report.total_cycles, 1);
        let cycle = &report.cycles[0];
        assert_eq!(cycle.length, 3);
        assert_eq!(cycle.cycle_type, CycleType::Call);
        assert_eq!(cycle.severity, Severity::Medium);
        assert_eq!(report.by_type.get("call"), Some(&1));
        assert!(closes(&g, cycle));
    }

    #[test]
    fn test_overlapping_cycles_all_found_and_closed() {
        let g = graph(
            &["a", "b", "c", "d"],
            &[
                ("a", "b", Relationship::Calls),
                ("b", "a", Relationship::Calls),
                ("b", "c", Relationship::Emits),
                ("c", "a", Relationship::ConnectsTo),
                ("c", "d", Relationship::References),
                ("d", "c", Relationship::References),
                ("a", "a", Relationship::Calls),
            ],
        );
        let report = DependencyAnalyzer::new(&g).detect_circular_dependencies(&[], 50);

        // a-b, a-b-c, c-d; the self-loop is not reported
        assert_eq!(report.total_cycles, 3);
        assert!(report.cycles.iter().all(|c| c.length >= 2));
        assert!(report.cycles.iter().all(|c| closes(&g, c)));
        assert_eq!(report.by_type.get("call"), Some(&2));
        assert_eq!(report.by_type.get("resource"), Some(&1));

        let cd = report.cycles.iter().find(|c| c.nodes[0].id == "c").unwrap();
        assert_eq!(cd.severity, Severity::High);
        assert_eq!(cd.cycle_type, CycleType::Resource);
    }

    #[test]
    fn test_relationship_filter_and_limit() {
        let g = graph(
            &["a", "b", "c"],
            &[
                ("a", "b", Relationship::Emits),
                ("b", "a", Relationship::ConnectsTo),
                ("b", "c", Relationship::Calls),
                ("c", "b", Relationship::Calls),
            ],
        );
        let analyzer = DependencyAnalyzer::new(&g);

        let signals = analyzer
            .detect_circular_dependencies(&[Relationship::Emits, Relationship::ConnectsTo], 50);
        assert_eq!(signals.total_cycles, 1);
        assert_eq!(signals.cycles[0].cycle_type, CycleType::Signal);

        let limited = analyzer.detect_circular_dependencies(&[], 1);
        assert_eq!(limited.total_cycles, 1);
    }

    #[test]
    fn test_acyclic_and_dangling() {
        let mut g = graph(
            &["a", "b"],
            &[("a", "b", Relationship::Calls)],
        );
        g.add_edge(Edge::new("b", "ghost", Relationship::Calls));
        g.add_edge(Edge::new("ghost", "a", Relationship::Calls));

        let report = DependencyAnalyzer::new(&g).detect_circular_dependencies(&[], 50);
        assert_eq!(report.total_cycles, 0);
        assert_eq!(report.to_string().trim(), "NO CIRCULAR DEPENDENCIES FOUND");
    }

    #[test]
    fn test_cycle_rendering() {
        let g = graph(
            &["x", "y"],
            &[("x", "y", Relationship::Calls), ("y", "x", Relationship::Reads)],
        );
        let text = DependencyAnalyzer::new(&g)
            .detect_circular_dependencies(&[], 50)
            .to_string();
        assert!(text.contains("CIRCULAR DEPENDENCIES DETECTED: 1"));
        assert!(text.contains("CIRCULAR DEPENDENCY (call, high)"));
        assert!(text.contains("[2] function: y"));
    }
}
