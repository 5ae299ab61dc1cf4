//! Result types returned by the query engine.
//!
//! Every query answers with one of these, never an error: a missing node or
//! an empty search is reported through `found` / `total_count`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::graph::types::{Confidence, Node, NodeKind, Relationship};

/// A compact, owned view of a node for results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    pub file_path: String,
    pub line_number: usize,
    pub confidence: Confidence,
}

impl From<&Node> for NodeRef {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            kind: node.kind,
            file_path: node.file_path.clone(),
            line_number: node.line_number,
            confidence: node.confidence,
        }
    }
}

/// Which edges a traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Outgoing edges: what this node affects.
    Forward,
    /// Incoming edges: what affects this node.
    Backward,
    Both,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Both => "both",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "forward" | "fwd" | "out" => Ok(Direction::Forward),
            "backward" | "back" | "in" => Ok(Direction::Backward),
            "both" => Ok(Direction::Both),
            other => Err(format!(
                "unknown direction '{}' (expected forward, backward, or both)",
                other
            )),
        }
    }
}

// ─── Paths ──────────────────────────────────────────────────────

/// One node on a path, with the edge that leaves it toward the next step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub node: NodeRef,
    /// `None` on the last step.
    pub relationship: Option<Relationship>,
    pub edge_confidence: Option<Confidence>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPath {
    pub steps: Vec<PathStep>,
    /// Number of hops.
    pub length: usize,
    /// Weakest confidence of any node or edge on this path.
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathResult {
    pub source: String,
    pub target: String,
    pub found: bool,
    /// Sorted by length, truncated to `max_paths`.
    pub paths: Vec<GraphPath>,
    /// Paths found before truncation.
    pub total_paths: usize,
    pub shortest_length: Option<usize>,
    pub confidence: Confidence,
}

impl PathResult {
    pub fn not_found(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            found: false,
            paths: Vec::new(),
            total_paths: 0,
            shortest_length: None,
            confidence: Confidence::High,
        }
    }
}

// ─── Dependencies ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub node: NodeRef,
    /// BFS depth at which the node was first reached.
    pub depth: usize,
    /// Relationship of the edge that led here.
    pub relationship: Relationship,
    /// `Forward` if reached over an outgoing edge, `Backward` otherwise.
    pub direction: Direction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyResult {
    pub node_id: String,
    pub node_name: Option<String>,
    pub found: bool,
    pub direction: Direction,
    pub depth: usize,
    pub dependencies: Vec<Dependency>,
    pub total_count: usize,
}

// ─── Usages ─────────────────────────────────────────────────────

/// The node on the other end of an edge, with that edge's attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub node: NodeRef,
    pub relationship: Relationship,
    pub confidence: Confidence,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageResult {
    pub node_id: String,
    pub node_name: Option<String>,
    pub node_kind: Option<NodeKind>,
    pub found: bool,
    /// `Some(Calls)` for caller/callee lookups.
    pub relationship_filter: Option<Relationship>,
    /// `Backward` for usages and callers, `Forward` for callees.
    pub direction: Direction,
    pub usages: Vec<Usage>,
    pub total_count: usize,
}

// ─── Search / Inspect ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub kind: Option<NodeKind>,
    pub exact: bool,
    pub matches: Vec<NodeRef>,
    pub total_count: usize,
}

/// A node with its immediate neighbourhood.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeContext {
    pub node_id: String,
    pub found: bool,
    pub node: Option<Node>,
    pub incoming: Vec<Usage>,
    pub outgoing: Vec<Usage>,
}
