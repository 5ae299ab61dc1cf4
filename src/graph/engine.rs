//! The core graph engine for Reach.
//!
//! Uses petgraph to store nodes and typed edges, keyed by the string ids
//! that extractors produce. Edges may point at ids that no file defined;
//! those endpoints live in the graph as placeholder slots and are invisible
//! to every query.

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, info};

use super::types::*;

/// A vertex in the underlying petgraph. `node` is `None` for ids that
/// only appear as edge endpoints.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub(crate) id: String,
    pub(crate) node: Option<Node>,
}

/// The main code graph: holds all nodes, edges, and the id index.
pub struct CodeGraph {
    /// The directed multigraph. At most one edge per (source, target, relationship).
    graph: DiGraph<Slot, Edge>,
    /// Index: node id -> vertex.
    id_index: HashMap<String, NodeIndex>,
    /// Edges waiting for their symbolic target to be resolved.
    pending: Vec<PendingEdge>,
}

impl CodeGraph {
    /// Create a new empty code graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            id_index: HashMap::new(),
            pending: Vec::new(),
        }
    }

    // ─── Mutation ───────────────────────────────────────────────

    /// Insert a node. An existing id is overwritten (last write wins).
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        if let Some(&idx) = self.id_index.get(&node.id) {
            self.graph[idx].node = Some(node);
            return idx;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(Slot {
            id: id.clone(),
            node: Some(node),
        });
        self.id_index.insert(id, idx);
        idx
    }

    /// Insert an edge. Endpoints that are not known yet become placeholders.
    ///
    /// Distinct relationships between the same ordered pair coexist; a
    /// repeated (source, target, relationship) triple overwrites the payload.
    pub fn add_edge(&mut self, edge: Edge) -> EdgeIndex {
        let from = self.ensure_slot(&edge.source_id);
        let to = self.ensure_slot(&edge.target_id);

        let existing = self
            .graph
            .edges_connecting(from, to)
            .find(|e| e.weight().relationship == edge.relationship)
            .map(|e| e.id());

        match existing {
            Some(edge_idx) => {
                self.graph[edge_idx] = edge;
                edge_idx
            }
            None => self.graph.add_edge(from, to, edge),
        }
    }

    /// Merge one file's extraction. Symbolic edges are queued for
    /// [`CodeGraph::resolve_pending`].
    pub fn ingest(&mut self, extraction: FileExtraction) {
        debug!(
            file = %extraction.file_path,
            nodes = extraction.nodes.len(),
            edges = extraction.edges.len(),
            pending = extraction.pending.len(),
            "ingesting file"
        );
        for node in extraction.nodes {
            self.add_node(node);
        }
        for edge in extraction.edges {
            self.add_edge(edge);
        }
        self.pending.extend(extraction.pending);
    }

    /// Resolve queued symbolic edges against the full node set.
    ///
    /// A key with exactly one matching node becomes a concrete edge. Keys with
    /// no match or several matches stay dangling under their placeholder id.
    pub fn resolve_pending(&mut self) -> ResolveReport {
        let pending = std::mem::take(&mut self.pending);
        let mut report = ResolveReport::default();
        if pending.is_empty() {
            return report;
        }

        let mut by_key: HashMap<SymbolKey, Vec<String>> = HashMap::new();
        for node in self.nodes() {
            by_key
                .entry(SymbolKey::new(node.kind, node.name.clone()))
                .or_default()
                .push(node.id.clone());
        }

        for edge in pending {
            let target_id = match by_key.get(&edge.target).map(Vec::as_slice) {
                Some([only]) => {
                    report.resolved += 1;
                    only.clone()
                }
                _ => {
                    report.unresolved.push(edge.target.placeholder_id());
                    edge.target.placeholder_id()
                }
            };
            self.add_edge(edge.into_edge(target_id));
        }

        info!(
            resolved = report.resolved,
            unresolved = report.unresolved.len(),
            "resolved symbolic edges"
        );
        report
    }

    /// Drop every node, edge, and queued edge.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.id_index.clear();
        self.pending.clear();
    }

    // ─── Lookup ─────────────────────────────────────────────────

    /// Get a node by id. Placeholder endpoints are not nodes.
    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.index_of(id).and_then(|idx| self.node_at(idx))
    }

    /// Whether a node with this id was ingested.
    pub fn contains(&self, id: &str) -> bool {
        self.get_node(id).is_some()
    }

    /// All edges leaving `id`, including those to placeholder targets.
    pub fn outgoing(&self, id: &str) -> Vec<&Edge> {
        self.edges_of(id, Direction::Outgoing)
    }

    /// All edges entering `id`, including those from placeholder sources.
    pub fn incoming(&self, id: &str) -> Vec<&Edge> {
        self.edges_of(id, Direction::Incoming)
    }

    /// Find nodes by name.
    ///
    /// Case-insensitive substring match unless `exact`, optionally filtered by
    /// kind and by a case-insensitive substring of the file path. Results come
    /// back in insertion order.
    pub fn find_by_name(
        &self,
        name: &str,
        kind: Option<NodeKind>,
        file: Option<&str>,
        exact: bool,
    ) -> Vec<&Node> {
        let name_lower = name.to_lowercase();
        let file_lower = file.map(str::to_lowercase);

        self.nodes()
            .filter(|node| {
                if exact {
                    node.name == name
                } else {
                    node.name.to_lowercase().contains(&name_lower)
                }
            })
            .filter(|node| kind.map_or(true, |k| node.kind == k))
            .filter(|node| {
                file_lower
                    .as_ref()
                    .map_or(true, |f| node.file_path.to_lowercase().contains(f.as_str()))
            })
            .collect()
    }

    /// Iterate over every ingested node in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights().filter_map(|slot| slot.node.as_ref())
    }

    /// Iterate over every stored edge.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.graph.edge_weights()
    }

    /// Number of ingested nodes (placeholders excluded).
    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of edge ids still waiting for resolution.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // ─── Index-level access for the traversal layers ────────────

    /// Vertex for an id, placeholder or not.
    pub(crate) fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.id_index.get(id).copied()
    }

    /// The node at a vertex, or `None` for placeholders.
    pub(crate) fn node_at(&self, idx: NodeIndex) -> Option<&Node> {
        self.graph.node_weight(idx).and_then(|slot| slot.node.as_ref())
    }

    /// Whether the vertex holds an ingested node.
    pub(crate) fn is_live(&self, idx: NodeIndex) -> bool {
        self.node_at(idx).is_some()
    }

    pub(crate) fn vertices(&self) -> impl Iterator<Item = NodeIndex> {
        self.graph.node_indices()
    }

    /// Outgoing `(target, edge)` pairs of a vertex, in insertion order.
    pub(crate) fn out_edges_at(&self, idx: NodeIndex) -> Vec<(NodeIndex, &Edge)> {
        self.adjacent(idx, Direction::Outgoing)
    }

    /// Incoming `(source, edge)` pairs of a vertex, in insertion order.
    pub(crate) fn in_edges_at(&self, idx: NodeIndex) -> Vec<(NodeIndex, &Edge)> {
        self.adjacent(idx, Direction::Incoming)
    }

    /// The most certain edge from `from` to `to` whose relationship passes
    /// `filter`. Ties go to the edge inserted first.
    pub(crate) fn best_edge_between(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        filter: impl Fn(Relationship) -> bool,
    ) -> Option<&Edge> {
        self.graph
            .edges_connecting(from, to)
            .filter(|e| filter(e.weight().relationship))
            .min_by_key(|e| (e.weight().confidence, e.id()))
            .map(|e| e.weight())
    }

    // ─── Stats ──────────────────────────────────────────────────

    /// Get graph statistics.
    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats::default();

        for node in self.nodes() {
            stats.total_nodes += 1;
            *stats
                .nodes_by_kind
                .entry(node.kind.as_str().to_string())
                .or_default() += 1;
            if node.confidence == Confidence::Ambiguous {
                stats.ambiguous_nodes += 1;
            }
        }

        stats.placeholder_ids = self
            .graph
            .node_weights()
            .filter(|slot| slot.node.is_none())
            .map(|slot| slot.id.clone())
            .collect();
        stats.placeholder_ids.sort();

        for edge_ref in self.graph.edge_references() {
            let edge = edge_ref.weight();
            stats.total_edges += 1;
            *stats
                .edges_by_relationship
                .entry(edge.relationship.as_str().to_string())
                .or_default() += 1;
            if edge.confidence.is_weak() {
                stats.low_confidence_edges += 1;
            }
            if !self.is_live(edge_ref.source()) || !self.is_live(edge_ref.target()) {
                stats.dangling_edges += 1;
            }
        }

        stats
    }

    // ─── Internal Helpers ───────────────────────────────────────

    fn ensure_slot(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.id_index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(Slot {
            id: id.to_string(),
            node: None,
        });
        self.id_index.insert(id.to_string(), idx);
        idx
    }

    fn edges_of(&self, id: &str, direction: Direction) -> Vec<&Edge> {
        match self.index_of(id) {
            Some(idx) => self
                .adjacent(idx, direction)
                .into_iter()
                .map(|(_, edge)| edge)
                .collect(),
            None => Vec::new(),
        }
    }

    /// petgraph walks adjacency lists newest-first; callers expect oldest-first.
    fn adjacent(&self, idx: NodeIndex, direction: Direction) -> Vec<(NodeIndex, &Edge)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (e.id(), other, e.weight())
            })
            .collect();
        edges.sort_by_key(|(edge_idx, _, _)| *edge_idx);
        edges
            .into_iter()
            .map(|(_, other, edge)| (other, edge))
            .collect()
    }
}

impl Default for CodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Result Types ───────────────────────────────────────────────

/// Outcome of [`CodeGraph::resolve_pending`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveReport {
    pub resolved: usize,
    /// Placeholder ids of edges left dangling.
    pub unresolved: Vec<String>,
}

/// Statistics about the graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub nodes_by_kind: BTreeMap<String, usize>,
    pub edges_by_relationship: BTreeMap<String, usize>,
    pub ambiguous_nodes: usize,
    pub low_confidence_edges: usize,
    /// Edges with at least one endpoint no file defined.
    pub dangling_edges: usize,
    /// Endpoint ids referenced by edges but never defined, sorted.
    #[serde(default)]
    pub placeholder_ids: Vec<String>,
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes: {}", self.total_nodes)?;
        for (kind, count) in &self.nodes_by_kind {
            writeln!(f, "  {:<18} {}", kind, count)?;
        }
        writeln!(f, "Edges: {}", self.total_edges)?;
        for (rel, count) in &self.edges_by_relationship {
            writeln!(f, "  {:<18} {}", rel, count)?;
        }
        writeln!(f, "Ambiguous nodes: {}", self.ambiguous_nodes)?;
        writeln!(f, "Low-confidence edges: {}", self.low_confidence_edges)?;
        write!(f, "Dangling edges: {}", self.dangling_edges)?;
        for id in &self.placeholder_ids {
            write!(f, "\n  {}", id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(id: &str, name: &str, file: &str) -> Node {
        Node::new(id, NodeKind::Function, name, file, 1, "gdscript")
    }

    #[test]
    fn test_empty_graph() {
        let graph = CodeGraph::new();
        let stats = graph.stats();
        assert_eq!(stats.total_nodes, 0);
        assert_eq!(stats.total_edges, 0);
        assert!(graph.is_empty());
        assert!(stats.to_string().starts_with("Nodes: 0\nEdges: 0\n"));
    }

    #[test]
    fn test_add_and_get_node() {
        let mut graph = CodeGraph::new();
        graph.add_node(func("f1", "login", "auth.gd"));

        let node = graph.get_node("f1").unwrap();
        assert_eq!(node.name, "login");
        assert!(graph.get_node("nope").is_none());
    }

    #[test]
    fn test_duplicate_id_overwrites() {
        let mut graph = CodeGraph::new();
        graph.add_node(func("f1", "login", "auth.gd").with_snippet("v1"));
        graph.add_node(func("f1", "login", "auth.gd").with_snippet("v2"));

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.get_node("f1").unwrap().code_snippet, "v2");
    }

    #[test]
    fn test_dangling_edge_is_stored_but_endpoint_absent() {
        let mut graph = CodeGraph::new();
        graph.add_node(func("a", "a", "a.gd"));
        graph.add_edge(Edge::new("a", "ghost", Relationship::Calls));

        assert_eq!(graph.outgoing("a").len(), 1);
        assert_eq!(graph.incoming("ghost").len(), 1);
        assert!(graph.get_node("ghost").is_none());
        assert!(!graph.contains("ghost"));
        assert_eq!(graph.node_count(), 1);
        let stats = graph.stats();
        assert_eq!(stats.dangling_edges, 1);
        assert_eq!(stats.placeholder_ids, vec!["ghost".to_string()]);
        assert!(stats.to_string().ends_with("Dangling edges: 1\n  ghost"));
    }

    #[test]
    fn test_edge_defined_before_endpoint_becomes_live() {
        let mut graph = CodeGraph::new();
        graph.add_edge(Edge::new("a", "b", Relationship::Calls));
        graph.add_node(func("b", "b", "b.gd"));

        assert!(graph.contains("b"));
        assert_eq!(graph.incoming("b")[0].source_id, "a");
    }

    #[test]
    fn test_distinct_relationships_coexist() {
        let mut graph = CodeGraph::new();
        graph.add_node(func("a", "a", "x.gd"));
        graph.add_node(Node::new("v", NodeKind::Variable, "hp", "x.gd", 2, "gdscript"));
        graph.add_edge(Edge::new("a", "v", Relationship::Reads));
        graph.add_edge(Edge::new("a", "v", Relationship::Writes));

        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_same_triple_overwrites_payload() {
        let mut graph = CodeGraph::new();
        graph.add_edge(Edge::new("a", "b", Relationship::Calls).with_context("line 1"));
        graph.add_edge(Edge::new("a", "b", Relationship::Calls).with_context("line 9"));

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.outgoing("a")[0].context, "line 9");
    }

    #[test]
    fn test_find_by_name_filters() {
        let mut graph = CodeGraph::new();
        graph.add_node(func("f1", "take_damage", "player.gd"));
        graph.add_node(func("f2", "damage", "enemy.gd"));
        graph.add_node(Node::new(
            "v1",
            NodeKind::Variable,
            "damage_bonus",
            "player.gd",
            3,
            "gdscript",
        ));

        assert_eq!(graph.find_by_name("DAMAGE", None, None, false).len(), 3);
        assert_eq!(
            graph
                .find_by_name("damage", Some(NodeKind::Function), None, false)
                .len(),
            2
        );
        assert_eq!(
            graph
                .find_by_name("damage", None, Some("PLAYER"), false)
                .len(),
            2
        );
        let exact = graph.find_by_name("damage", None, None, true);
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].id, "f2");
    }

    #[test]
    fn test_resolve_pending_unique_and_dangling() {
        let mut graph = CodeGraph::new();
        let mut first = FileExtraction::new("player.gd");
        first.nodes.push(Node::new("c_player", NodeKind::Class, "Player", "player.gd", 1, "gdscript"));
        first.pending.push(PendingEdge {
            source_id: "c_player".into(),
            target: SymbolKey::new(NodeKind::Class, "Actor"),
            relationship: Relationship::Inherits,
            context: "extends Actor".into(),
            confidence: Confidence::Medium,
        });
        first.pending.push(PendingEdge {
            source_id: "c_player".into(),
            target: SymbolKey::new(NodeKind::Class, "Node2D"),
            relationship: Relationship::Inherits,
            context: "extends Node2D".into(),
            confidence: Confidence::Medium,
        });
        graph.ingest(first);

        // The parent class arrives in a later file.
        let mut second = FileExtraction::new("actor.gd");
        second.nodes.push(Node::new("c_actor", NodeKind::Class, "Actor", "actor.gd", 1, "gdscript"));
        graph.ingest(second);

        assert_eq!(graph.pending_count(), 2);
        let report = graph.resolve_pending();
        assert_eq!(report.resolved, 1);
        assert_eq!(report.unresolved, vec!["class:*:Node2D".to_string()]);

        let incoming = graph.incoming("c_actor");
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].relationship, Relationship::Inherits);
        assert_eq!(incoming[0].confidence, Confidence::Medium);
        assert_eq!(graph.outgoing("c_player").len(), 2);
        assert!(!graph.contains("class:*:Node2D"));
    }

    #[test]
    fn test_ambiguous_symbol_is_not_guessed() {
        let mut graph = CodeGraph::new();
        graph.add_node(Node::new("c1", NodeKind::Class, "Base", "a.gd", 1, "gdscript"));
        graph.add_node(Node::new("c2", NodeKind::Class, "Base", "b.gd", 1, "gdscript"));
        let mut ext = FileExtraction::new("c.gd");
        ext.pending.push(PendingEdge {
            source_id: "c3".into(),
            target: SymbolKey::new(NodeKind::Class, "Base"),
            relationship: Relationship::Inherits,
            context: String::new(),
            confidence: Confidence::Medium,
        });
        graph.ingest(ext);

        let report = graph.resolve_pending();
        assert_eq!(report.resolved, 0);
        assert!(graph.incoming("c1").is_empty());
        assert!(graph.incoming("c2").is_empty());
    }

    #[test]
    fn test_stats_counts() {
        let mut graph = CodeGraph::new();
        graph.add_node(func("a", "a", "a.gd"));
        graph.add_node(
            Node::new("amb", NodeKind::Ambiguous, "call(\"x\")", "a.gd", 4, "gdscript")
                .with_confidence(Confidence::Ambiguous),
        );
        graph.add_edge(Edge::new("a", "amb", Relationship::References).with_confidence(Confidence::Low));
        graph.add_edge(Edge::new("a", "a", Relationship::Calls));

        let stats = graph.stats();
        assert_eq!(stats.total_nodes, 2);
        assert_eq!(stats.total_edges, 2);
        assert_eq!(stats.ambiguous_nodes, 1);
        assert_eq!(stats.low_confidence_edges, 1);
        assert_eq!(stats.nodes_by_kind.get("function"), Some(&1));
        assert_eq!(stats.edges_by_relationship.get("calls"), Some(&1));
    }

    #[test]
    fn test_clear() {
        let mut graph = CodeGraph::new();
        graph.add_node(func("a", "a", "a.gd"));
        graph.add_edge(Edge::new("a", "b", Relationship::Calls));
        graph.clear();

        assert!(graph.is_empty());
        assert!(graph.get_node("a").is_none());
        assert!(graph.outgoing("a").is_empty());
    }
}
