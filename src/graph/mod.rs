//! Code graph module: the structural backbone of Reach.
//!
//! Provides the graph data model, the petgraph-backed container,
//! project scanning/building, and JSON persistence.

pub mod builder;
pub mod engine;
pub mod persistence;
pub mod types;

pub use builder::{
    build_graph, collect_files, load_or_build, scan_stats, IngestSummary, ScanStats,
};
pub use engine::{CodeGraph, GraphStats, ResolveReport};
pub use persistence::{GraphExport, EXPORT_FORMAT};
pub use types::{
    Confidence, Edge, FileExtraction, Metadata, Node, NodeKind, PendingEdge, Relationship,
    SymbolKey,
};
