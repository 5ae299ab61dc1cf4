//! Flat node-list/edge-list serialization.
//!
//! The same JSON document serves as the user-facing export and as the
//! on-disk cache under `.reach/`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::engine::CodeGraph;
use super::types::{Edge, Node};
use crate::error::{ReachError, Result};

/// Format tag written into every export.
pub const EXPORT_FORMAT: &str = "reach_code_graph_v1";

/// A graph as two flat lists. Importing it reproduces the same graph,
/// dangling edges included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExport {
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl CodeGraph {
    /// Snapshot the graph. Nodes and edges keep insertion order.
    pub fn to_export(&self, project_root: Option<&Path>) -> GraphExport {
        GraphExport {
            format: EXPORT_FORMAT.to_string(),
            project_root: project_root.map(|p| p.to_string_lossy().into_owned()),
            exported_at: Some(Utc::now()),
            nodes: self.nodes().cloned().collect(),
            edges: self.edges().cloned().collect(),
        }
    }

    /// Rebuild a graph from an export.
    pub fn from_export(export: GraphExport) -> Result<Self> {
        if export.format != EXPORT_FORMAT {
            return Err(ReachError::GraphFormat(format!(
                "expected format '{}', found '{}'",
                EXPORT_FORMAT, export.format
            )));
        }
        let mut graph = CodeGraph::new();
        for node in export.nodes {
            graph.add_node(node);
        }
        for edge in export.edges {
            graph.add_edge(edge);
        }
        Ok(graph)
    }

    pub fn to_json(&self, project_root: Option<&Path>) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_export(project_root))?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let export: GraphExport = serde_json::from_str(json)?;
        Self::from_export(export)
    }

    /// Write the graph to `path` as JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json(None)?)?;
        debug!(path = %path.display(), nodes = self.node_count(), "graph saved");
        Ok(())
    }

    /// Export with the project root recorded.
    pub fn export_to(&self, path: &Path, project_root: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json(Some(project_root))?)?;
        info!(path = %path.display(), nodes = self.node_count(), edges = self.edge_count(), "graph exported");
        Ok(())
    }

    /// Load a graph previously written by [`CodeGraph::save`] or
    /// [`CodeGraph::export_to`].
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let graph = Self::from_json(&json)?;
        debug!(path = %path.display(), nodes = graph.node_count(), "graph loaded");
        Ok(graph)
    }
}
