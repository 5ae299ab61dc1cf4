//! Query engine: paths, dependency traversal, usages, and name search.
//!
//! All queries borrow the graph read-only and answer with a result value.
//! An id that is not in the graph gives an empty result, never an error.

use petgraph::graph::NodeIndex;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

use super::types::*;
use crate::graph::engine::CodeGraph;
use crate::graph::types::{Confidence, Node, NodeKind, Relationship};

/// Read-only queries over a [`CodeGraph`].
#[derive(Clone, Copy)]
pub struct QueryEngine<'g> {
    graph: &'g CodeGraph,
}

impl<'g> QueryEngine<'g> {
    pub fn new(graph: &'g CodeGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &'g CodeGraph {
        self.graph
    }

    // ─── Paths ──────────────────────────────────────────────────

    /// Every simple path from `source_id` to `target_id` of at most
    /// `max_depth` hops, shortest first, truncated to `max_paths`.
    pub fn find_path(
        &self,
        source_id: &str,
        target_id: &str,
        max_depth: usize,
        max_paths: usize,
    ) -> PathResult {
        let (from, to) = match (self.live_index(source_id), self.live_index(target_id)) {
            (Some(from), Some(to)) => (from, to),
            _ => return PathResult::not_found(source_id, target_id),
        };

        let any = |_: Relationship| true;
        let paths: Vec<GraphPath> = enumerate_paths(self.graph, from, to, max_depth, &any)
            .iter()
            .map(|nodes| build_path(self.graph, nodes, &any))
            .collect();
        debug!(source = source_id, target = target_id, paths = paths.len(), "path search");

        assemble_paths(source_id, target_id, paths, max_paths)
    }

    // ─── Dependencies ───────────────────────────────────────────

    /// Breadth-first traversal up to `depth` hops. Each node is recorded once,
    /// at the depth it was first reached; the start node is excluded.
    pub fn find_dependencies(
        &self,
        node_id: &str,
        direction: Direction,
        depth: usize,
    ) -> DependencyResult {
        let mut result = DependencyResult {
            node_id: node_id.to_string(),
            node_name: None,
            found: false,
            direction,
            depth,
            dependencies: Vec::new(),
            total_count: 0,
        };
        let Some(start) = self.live_index(node_id) else {
            return result;
        };
        result.found = true;
        result.node_name = self.graph.node_at(start).map(|n| n.name.clone());

        let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::from([(start, 0)]);

        while let Some((current, level)) = queue.pop_front() {
            if level >= depth {
                continue;
            }

            let mut neighbors: Vec<(NodeIndex, Relationship, Direction)> = Vec::new();
            if matches!(direction, Direction::Forward | Direction::Both) {
                neighbors.extend(
                    self.graph
                        .out_edges_at(current)
                        .into_iter()
                        .map(|(n, e)| (n, e.relationship, Direction::Forward)),
                );
            }
            if matches!(direction, Direction::Backward | Direction::Both) {
                neighbors.extend(
                    self.graph
                        .in_edges_at(current)
                        .into_iter()
                        .map(|(n, e)| (n, e.relationship, Direction::Backward)),
                );
            }

            for (next, relationship, via) in neighbors {
                let Some(node) = self.graph.node_at(next) else {
                    continue;
                };
                if !visited.insert(next) {
                    continue;
                }
                result.dependencies.push(Dependency {
                    node: NodeRef::from(node),
                    depth: level + 1,
                    relationship,
                    direction: via,
                });
                queue.push_back((next, level + 1));
            }
        }

        result.total_count = result.dependencies.len();
        result
    }

    // ─── Usages ─────────────────────────────────────────────────

    /// Every incoming edge, resolved to its source node.
    pub fn find_usages(&self, node_id: &str) -> UsageResult {
        self.links(node_id, Direction::Backward, None)
    }

    /// Incoming `Calls` edges only.
    pub fn find_callers(&self, node_id: &str) -> UsageResult {
        self.links(node_id, Direction::Backward, Some(Relationship::Calls))
    }

    /// Outgoing `Calls` edges only.
    pub fn find_callees(&self, node_id: &str) -> UsageResult {
        self.links(node_id, Direction::Forward, Some(Relationship::Calls))
    }

    // ─── Search / Inspect ───────────────────────────────────────

    /// Name search; see [`CodeGraph::find_by_name`].
    pub fn find_by_name(
        &self,
        name: &str,
        kind: Option<NodeKind>,
        file: Option<&str>,
        exact: bool,
    ) -> Vec<&'g Node> {
        self.graph.find_by_name(name, kind, file, exact)
    }

    /// Resolve user input to one node: an exact id, else the first exact
    /// name match, else the first substring match.
    pub fn resolve(&self, name_or_id: &str, kind: Option<NodeKind>) -> Option<&'g Node> {
        if let Some(node) = self.graph.get_node(name_or_id) {
            if kind.map_or(true, |k| node.kind == k) {
                return Some(node);
            }
        }
        self.find_by_name(name_or_id, kind, None, true)
            .into_iter()
            .next()
            .or_else(|| self.find_by_name(name_or_id, kind, None, false).into_iter().next())
    }

    /// [`QueryEngine::find_by_name`] wrapped as a result value.
    pub fn search(
        &self,
        name: &str,
        kind: Option<NodeKind>,
        file: Option<&str>,
        exact: bool,
    ) -> SearchResult {
        let matches: Vec<NodeRef> = self
            .find_by_name(name, kind, file, exact)
            .into_iter()
            .map(NodeRef::from)
            .collect();
        SearchResult {
            query: name.to_string(),
            kind,
            exact,
            total_count: matches.len(),
            matches,
        }
    }

    /// A node with its direct incoming and outgoing neighbours.
    pub fn node_context(&self, node_id: &str) -> NodeContext {
        let node = self.graph.get_node(node_id).cloned();
        let found = node.is_some();
        let (incoming, outgoing) = if found {
            (
                self.links(node_id, Direction::Backward, None).usages,
                self.links(node_id, Direction::Forward, None).usages,
            )
        } else {
            (Vec::new(), Vec::new())
        };
        NodeContext {
            node_id: node_id.to_string(),
            found,
            node,
            incoming,
            outgoing,
        }
    }

    // ─── Internal Helpers ───────────────────────────────────────

    fn live_index(&self, id: &str) -> Option<NodeIndex> {
        self.graph
            .index_of(id)
            .filter(|idx| self.graph.is_live(*idx))
    }

    fn links(
        &self,
        node_id: &str,
        direction: Direction,
        filter: Option<Relationship>,
    ) -> UsageResult {
        let mut result = UsageResult {
            node_id: node_id.to_string(),
            node_name: None,
            node_kind: None,
            found: false,
            relationship_filter: filter,
            direction,
            usages: Vec::new(),
            total_count: 0,
        };
        let Some(idx) = self.live_index(node_id) else {
            return result;
        };
        if let Some(node) = self.graph.node_at(idx) {
            result.found = true;
            result.node_name = Some(node.name.clone());
            result.node_kind = Some(node.kind);
        }

        let edges = match direction {
            Direction::Forward => self.graph.out_edges_at(idx),
            _ => self.graph.in_edges_at(idx),
        };
        result.usages = edges
            .into_iter()
            .filter(|(_, edge)| filter.map_or(true, |rel| edge.relationship == rel))
            .filter_map(|(other, edge)| {
                self.graph.node_at(other).map(|node| Usage {
                    node: NodeRef::from(node),
                    relationship: edge.relationship,
                    confidence: edge.confidence,
                    context: edge.context.clone(),
                })
            })
            .collect();
        result.total_count = result.usages.len();
        result
    }
}

// ─── Path machinery shared with the flow tracer ─────────────────

/// All simple paths `from -> to` with at most `max_depth` hops, following
/// only edges whose relationship passes `filter`. Placeholder vertices are
/// never visited. `from == to` yields nothing.
pub(crate) fn enumerate_paths(
    graph: &CodeGraph,
    from: NodeIndex,
    to: NodeIndex,
    max_depth: usize,
    filter: &dyn Fn(Relationship) -> bool,
) -> Vec<Vec<NodeIndex>> {
    let mut found = Vec::new();
    if from == to || max_depth == 0 {
        return found;
    }
    let mut stack = vec![from];
    let mut on_stack: HashSet<NodeIndex> = HashSet::from([from]);
    walk(graph, to, max_depth, filter, &mut stack, &mut on_stack, &mut found);
    found
}

fn walk(
    graph: &CodeGraph,
    target: NodeIndex,
    max_depth: usize,
    filter: &dyn Fn(Relationship) -> bool,
    stack: &mut Vec<NodeIndex>,
    on_stack: &mut HashSet<NodeIndex>,
    found: &mut Vec<Vec<NodeIndex>>,
) {
    let Some(&current) = stack.last() else {
        return;
    };
    let hops = stack.len() - 1;
    if hops >= max_depth {
        return;
    }

    // Parallel edges collapse into a single hop.
    let mut seen = HashSet::new();
    let successors: Vec<NodeIndex> = graph
        .out_edges_at(current)
        .into_iter()
        .filter(|(_, edge)| filter(edge.relationship))
        .map(|(next, _)| next)
        .filter(|next| seen.insert(*next))
        .collect();

    for next in successors {
        if next == target {
            let mut path = stack.clone();
            path.push(target);
            found.push(path);
            continue;
        }
        if on_stack.contains(&next) || !graph.is_live(next) {
            continue;
        }
        stack.push(next);
        on_stack.insert(next);
        walk(graph, target, max_depth, filter, stack, on_stack, found);
        on_stack.remove(&next);
        stack.pop();
    }
}

/// Annotate a vertex sequence with node data and the strongest edge per hop.
pub(crate) fn build_path(
    graph: &CodeGraph,
    nodes: &[NodeIndex],
    filter: &dyn Fn(Relationship) -> bool,
) -> GraphPath {
    let mut steps = Vec::with_capacity(nodes.len());
    let mut confidences = Vec::with_capacity(nodes.len() * 2);

    for (i, &idx) in nodes.iter().enumerate() {
        let Some(node) = graph.node_at(idx) else {
            continue;
        };
        confidences.push(node.confidence);

        let edge = nodes
            .get(i + 1)
            .and_then(|&next| graph.best_edge_between(idx, next, filter));
        if let Some(edge) = edge {
            confidences.push(edge.confidence);
        }

        steps.push(PathStep {
            node: NodeRef::from(node),
            relationship: edge.map(|e| e.relationship),
            edge_confidence: edge.map(|e| e.confidence),
            context: edge.map(|e| e.context.clone()).unwrap_or_default(),
        });
    }

    GraphPath {
        length: nodes.len().saturating_sub(1),
        steps,
        confidence: Confidence::aggregate(confidences),
    }
}

/// Sort by length, truncate, and fold confidence over the returned paths.
pub(crate) fn assemble_paths(
    source: &str,
    target: &str,
    mut paths: Vec<GraphPath>,
    max_paths: usize,
) -> PathResult {
    if paths.is_empty() {
        return PathResult::not_found(source, target);
    }
    paths.sort_by_key(|p| p.length);
    let total_paths = paths.len();
    let shortest_length = paths.first().map(|p| p.length);
    paths.truncate(max_paths);
    let confidence = Confidence::aggregate(paths.iter().map(|p| p.confidence));

    PathResult {
        source: source.to_string(),
        target: target.to_string(),
        found: true,
        paths,
        total_paths,
        shortest_length,
        confidence,
    }
}
