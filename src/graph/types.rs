//! Core types for the Reach code graph.
//!
//! Defines node kinds, relationships, confidence levels, and the
//! node/edge records that extractors hand to the graph.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Schema-less per-kind attributes. Opaque to the engine except for the
/// keys documented on [`meta`].
pub type Metadata = Map<String, Value>;

/// Metadata keys the analysis layer reads.
pub mod meta {
    /// `SignalConnection`: name of the connected signal.
    pub const SIGNAL: &str = "signal";
    /// `SignalConnection`: name of the handler method.
    pub const HANDLER: &str = "handler";
    /// `SignalConnection`: `true` when declared in a scene file.
    pub const DEFINED_IN_SCENE: &str = "defined_in_scene";
}

/// The kind of a node in the code graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A function or method definition.
    Function,
    /// A class-level variable, export, or onready binding.
    Variable,
    /// A declared signal.
    Signal,
    /// A signal-to-handler connection, in code or in a scene.
    SignalConnection,
    /// A scene file.
    Scene,
    /// A named class (`class_name`).
    Class,
    /// A node in a scene tree, or a `$Path` / `get_node` reference.
    NodeReference,
    /// A loaded or referenced resource.
    Resource,
    /// A call into an external API.
    ApiCall,
    /// A module or namespace.
    Module,
    /// Something the extractor saw but could not pin down.
    Ambiguous,
}

impl NodeKind {
    pub const ALL: [NodeKind; 11] = [
        NodeKind::Function,
        NodeKind::Variable,
        NodeKind::Signal,
        NodeKind::SignalConnection,
        NodeKind::Scene,
        NodeKind::Class,
        NodeKind::NodeReference,
        NodeKind::Resource,
        NodeKind::ApiCall,
        NodeKind::Module,
        NodeKind::Ambiguous,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Function => "function",
            NodeKind::Variable => "variable",
            NodeKind::Signal => "signal",
            NodeKind::SignalConnection => "signal_connection",
            NodeKind::Scene => "scene",
            NodeKind::Class => "class",
            NodeKind::NodeReference => "node_reference",
            NodeKind::Resource => "resource",
            NodeKind::ApiCall => "api_call",
            NodeKind::Module => "module",
            NodeKind::Ambiguous => "ambiguous",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        NodeKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| format!("unknown node kind '{}'", s))
    }
}

/// The kind of an edge (relationship) in the code graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Calls,
    Reads,
    Writes,
    Emits,
    ConnectsTo,
    Instantiates,
    Inherits,
    References,
    Imports,
    DataFlow,
    Contains,
    AttachesTo,
}

impl Relationship {
    pub const ALL: [Relationship; 12] = [
        Relationship::Calls,
        Relationship::Reads,
        Relationship::Writes,
        Relationship::Emits,
        Relationship::ConnectsTo,
        Relationship::Instantiates,
        Relationship::Inherits,
        Relationship::References,
        Relationship::Imports,
        Relationship::DataFlow,
        Relationship::Contains,
        Relationship::AttachesTo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Calls => "calls",
            Relationship::Reads => "reads",
            Relationship::Writes => "writes",
            Relationship::Emits => "emits",
            Relationship::ConnectsTo => "connects_to",
            Relationship::Instantiates => "instantiates",
            Relationship::Inherits => "inherits",
            Relationship::References => "references",
            Relationship::Imports => "imports",
            Relationship::DataFlow => "data_flow",
            Relationship::Contains => "contains",
            Relationship::AttachesTo => "attaches_to",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relationship {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Relationship::ALL
            .into_iter()
            .find(|r| r.as_str() == wanted)
            .ok_or_else(|| format!("unknown relationship '{}'", s))
    }
}

/// How certain the extractor was about a node, edge, or derived result.
///
/// Ordered from most to least certain, so `max()` over a set of
/// confidences yields the weakest one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    #[default]
    High,
    Medium,
    Low,
    Ambiguous,
}

impl Confidence {
    /// `Low` and `Ambiguous` both mean a heuristic link.
    pub fn is_weak(&self) -> bool {
        matches!(self, Confidence::Low | Confidence::Ambiguous)
    }

    /// Fold a set of confidences into the three-level result label:
    /// any weak input gives `Low`, else any `Medium` gives `Medium`.
    pub fn aggregate<I: IntoIterator<Item = Confidence>>(items: I) -> Confidence {
        let mut result = Confidence::High;
        for c in items {
            if c.is_weak() {
                return Confidence::Low;
            }
            if c == Confidence::Medium {
                result = Confidence::Medium;
            }
        }
        result
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::Ambiguous => "ambiguous",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A code or resource entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable id derived from (kind, file, name, line).
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    /// Project-relative path with `/` separators.
    pub file_path: String,
    /// 1-indexed line.
    pub line_number: usize,
    /// Tag of the originating format ("gdscript", "scene").
    pub source_language: String,
    #[serde(default)]
    pub code_snippet: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub confidence: Confidence,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        kind: NodeKind,
        name: impl Into<String>,
        file_path: impl Into<String>,
        line_number: usize,
        source_language: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            file_path: file_path.into(),
            line_number,
            source_language: source_language.into(),
            code_snippet: String::new(),
            metadata: Metadata::new(),
            confidence: Confidence::High,
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.code_snippet = snippet.into();
        self
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// String metadata value, if present.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Boolean metadata value; absent or non-boolean counts as `false`.
    pub fn meta_flag(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// A directed, typed relationship between two node ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source_id: String,
    pub target_id: String,
    pub relationship: Relationship,
    /// Provenance, usually a source line excerpt.
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub confidence: Confidence,
}

impl Edge {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relationship: Relationship,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relationship,
            context: String::new(),
            metadata: Metadata::new(),
            confidence: Confidence::High,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }
}

// ─── Ingestion Contract ───────────────────────────────────────────────────────

/// A symbolic endpoint, resolved against the full node set after every
/// file has been merged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolKey {
    pub kind: NodeKind,
    pub name: String,
}

impl SymbolKey {
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// The id a dangling edge keeps when resolution fails.
    pub fn placeholder_id(&self) -> String {
        format!("{}:*:{}", self.kind, self.name)
    }
}

/// An edge whose target is only known by kind and name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEdge {
    pub source_id: String,
    pub target: SymbolKey,
    pub relationship: Relationship,
    pub context: String,
    pub confidence: Confidence,
}

impl PendingEdge {
    /// Materialize against a concrete target id.
    pub fn into_edge(self, target_id: String) -> Edge {
        Edge::new(self.source_id, target_id, self.relationship)
            .with_context(self.context)
            .with_confidence(self.confidence)
    }
}

/// Everything one extractor produced for one file.
#[derive(Debug, Clone, Default)]
pub struct FileExtraction {
    /// Project-relative path of the file.
    pub file_path: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub pending: Vec<PendingEdge>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl FileExtraction {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}
