//! Change impact ("blast radius") analysis.

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use super::DependencyAnalyzer;
use crate::graph::{NodeKind, Relationship};
use crate::query::render::write_more;
use crate::query::NodeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Fixed thresholds over the number of affected nodes and files.
    pub fn assess(total_affected: usize, affected_files: usize) -> Self {
        if total_affected > 50 || affected_files > 10 {
            RiskLevel::Critical
        } else if total_affected > 20 || affected_files > 5 {
            RiskLevel::High
        } else if total_affected > 5 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactEntry {
    pub node: NodeRef,
    /// Relationship of the edge into the analyzed node; direct impact only.
    pub relationship: Option<Relationship>,
    pub depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactResult {
    pub node_id: String,
    pub node_name: String,
    pub node_kind: Option<NodeKind>,
    pub found: bool,
    pub depth: usize,
    pub direct_impact: Vec<ImpactEntry>,
    pub indirect_impact: Vec<ImpactEntry>,
    pub total_affected: usize,
    pub affected_files: BTreeSet<String>,
    pub risk_level: RiskLevel,
}

impl<'g> DependencyAnalyzer<'g> {
    /// Everything that depends on `node_id`: direct dependents one hop back,
    /// indirect ones up to `depth` hops back.
    pub fn analyze_impact(&self, node_id: &str, depth: usize) -> ImpactResult {
        let graph = self.graph;
        let mut result = ImpactResult {
            node_id: node_id.to_string(),
            node_name: node_id.to_string(),
            node_kind: None,
            found: false,
            depth,
            direct_impact: Vec::new(),
            indirect_impact: Vec::new(),
            total_affected: 0,
            affected_files: BTreeSet::new(),
            risk_level: RiskLevel::Low,
        };

        let Some((start, node)) = graph
            .index_of(node_id)
            .and_then(|idx| graph.node_at(idx).map(|n| (idx, n)))
        else {
            return result;
        };
        result.found = true;
        result.node_name = node.name.clone();
        result.node_kind = Some(node.kind);

        let mut direct: HashSet<NodeIndex> = HashSet::new();
        for (source, edge) in graph.in_edges_at(start) {
            if source == start || !direct.insert(source) {
                continue;
            }
            if let Some(dependent) = graph.node_at(source) {
                result.affected_files.insert(dependent.file_path.clone());
                result.direct_impact.push(ImpactEntry {
                    node: NodeRef::from(dependent),
                    relationship: Some(edge.relationship),
                    depth: 1,
                });
            }
        }

        let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
        let mut level = vec![start];
        for d in 1..=depth {
            let mut next_level = Vec::new();
            for current in level {
                for (source, _) in graph.in_edges_at(current) {
                    if !visited.insert(source) {
                        continue;
                    }
                    let Some(dependent) = graph.node_at(source) else {
                        continue;
                    };
                    if !direct.contains(&source) {
                        result.affected_files.insert(dependent.file_path.clone());
                        result.indirect_impact.push(ImpactEntry {
                            node: NodeRef::from(dependent),
                            relationship: None,
                            depth: d,
                        });
                    }
                    next_level.push(source);
                }
            }
            level = next_level;
        }

        result.affected_files.retain(|f| !f.is_empty());
        result.total_affected = result.direct_impact.len() + result.indirect_impact.len();
        result.risk_level = RiskLevel::assess(result.total_affected, result.affected_files.len());
        result
    }
}

const MAX_SHOWN_IMPACT: usize = 15;
const MAX_SHOWN_FILES: usize = 20;

impl fmt::Display for ImpactResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.found {
            return writeln!(f, "Node not found: {}", self.node_id);
        }
        let kind = self.node_kind.map(|k| k.as_str()).unwrap_or("node");
        writeln!(f, "IMPACT ANALYSIS: {} '{}'", kind, self.node_name)?;
        writeln!(f, "Risk Level: {}", self.risk_level.as_str().to_uppercase())?;
        writeln!(f, "Total affected nodes: {}", self.total_affected)?;
        writeln!(f, "Affected files: {}", self.affected_files.len())?;

        if !self.direct_impact.is_empty() {
            writeln!(f, "\n=== DIRECT IMPACT ({}) ===", self.direct_impact.len())?;
            for entry in self.direct_impact.iter().take(MAX_SHOWN_IMPACT) {
                let rel = entry.relationship.map(|r| r.as_str()).unwrap_or("?");
                writeln!(f, "  [{}] {}: {}", rel, entry.node.kind, entry.node.name)?;
                writeln!(f, "       @ {}:{}", entry.node.file_path, entry.node.line_number)?;
            }
            let shown = self.direct_impact.len().min(MAX_SHOWN_IMPACT);
            write_more(f, "  ", shown, self.direct_impact.len(), "")?;
        }

        if !self.indirect_impact.is_empty() {
            writeln!(f, "\n=== INDIRECT IMPACT ({}) ===", self.indirect_impact.len())?;
            for entry in self.indirect_impact.iter().take(MAX_SHOWN_IMPACT) {
                writeln!(
                    f,
                    "  [depth {}] {}: {}",
                    entry.depth, entry.node.kind, entry.node.name
                )?;
                writeln!(f, "       @ {}:{}", entry.node.file_path, entry.node.line_number)?;
            }
            let shown = self.indirect_impact.len().min(MAX_SHOWN_IMPACT);
            write_more(f, "  ", shown, self.indirect_impact.len(), "")?;
        }

        if !self.affected_files.is_empty() {
            writeln!(f, "\n=== AFFECTED FILES ({}) ===", self.affected_files.len())?;
            for file in self.affected_files.iter().take(MAX_SHOWN_FILES) {
                writeln!(f, "  {}", file)?;
            }
            let shown = self.affected_files.len().min(MAX_SHOWN_FILES);
            write_more(f, "  ", shown, self.affected_files.len(), "")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CodeGraph, Edge, Node};

    fn func(id: &str, file: &str) -> Node {
        Node::new(id, NodeKind::Function, id, file, 1, "gdscript")
    }

    #[test]
    fn test_chain_impact() {
        let mut g = CodeGraph::new();
        g.add_node(func("A", "a.gd"));
        g.add_node(func("B", "b.gd"));
        g.add_node(func("C", "c.gd"));
        g.add_edge(Edge::new("A", "B", Relationship::Calls));
        g.add_edge(Edge::new("B", "C", Relationship::Calls));

        let result = DependencyAnalyzer::new(&g).analyze_impact("C", 2);
        assert!(result.found);
        assert_eq!(result.direct_impact.len(), 1);
        assert_eq!(result.direct_impact[0].node.id, "B");
        assert_eq!(result.direct_impact[0].relationship, Some(Relationship::Calls));
        assert_eq!(result.indirect_impact.len(), 1);
        assert_eq!(result.indirect_impact[0].node.id, "A");
        assert_eq!(result.indirect_impact[0].depth, 2);
        assert_eq!(result.total_affected, 2);
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert_eq!(
            result.affected_files.iter().cloned().collect::<Vec<_>>(),
            vec!["a.gd", "b.gd"]
        );
    }

    #[test]
    fn test_depth_bounds_indirect_impact() {
        let mut g = CodeGraph::new();
        for id in ["A", "B", "C", "D"] {
            g.add_node(func(id, "x.gd"));
        }
        g.add_edge(Edge::new("A", "B", Relationship::Calls));
        g.add_edge(Edge::new("B", "C", Relationship::Reads));
        g.add_edge(Edge::new("C", "D", Relationship::Calls));
        g.add_edge(Edge::new("B", "D", Relationship::Writes));

        let result = DependencyAnalyzer::new(&g).analyze_impact("D", 2);
        let direct: Vec<_> = result.direct_impact.iter().map(|e| e.node.id.as_str()).collect();
        assert_eq!(direct, vec!["C", "B"]);
        let indirect: Vec<_> = result.indirect_impact.iter().map(|e| e.node.id.as_str()).collect();
        assert_eq!(indirect, vec!["A"]);
        assert_eq!(result.affected_files.len(), 1);

        let shallow = DependencyAnalyzer::new(&g).analyze_impact("D", 1);
        assert!(shallow.indirect_impact.is_empty());
    }

    #[test]
    fn test_risk_thresholds() {
        assert_eq!(RiskLevel::assess(5, 5), RiskLevel::Low);
        assert_eq!(RiskLevel::assess(6, 1), RiskLevel::Medium);
        assert_eq!(RiskLevel::assess(2, 6), RiskLevel::High);
        assert_eq!(RiskLevel::assess(21, 1), RiskLevel::High);
        assert_eq!(RiskLevel::assess(51, 0), RiskLevel::Critical);
        assert_eq!(RiskLevel::assess(0, 11), RiskLevel::Critical);
    }

    #[test]
    fn test_missing_node_and_rendering() {
        let mut g = CodeGraph::new();
        g.add_node(func("A", "a.gd"));
        g.add_node(func("B", "b.gd"));
        g.add_edge(Edge::new("A", "B", Relationship::Calls));
        let analyzer = DependencyAnalyzer::new(&g);

        let missing = analyzer.analyze_impact("nope", 3);
        assert!(!missing.found);
        assert_eq!(missing.total_affected, 0);

        let text = analyzer.analyze_impact("B", 3).to_string();
        assert!(text.contains("IMPACT ANALYSIS: function 'B'"));
        assert!(text.contains("Risk Level: LOW"));
        assert!(text.contains("[calls] function: A"));
    }
}
