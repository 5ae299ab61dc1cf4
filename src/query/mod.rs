//! Query engine: path finding, dependency traversal, usage lookup, and
//! name search over a built [`CodeGraph`](crate::graph::CodeGraph).

pub mod engine;
pub mod intent;
pub mod render;
pub mod types;

pub use engine::QueryEngine;
pub use intent::QueryAnswer;
pub use types::{
    Dependency, DependencyResult, Direction, GraphPath, NodeContext, NodeRef, PathResult,
    PathStep, SearchResult, Usage, UsageResult,
};
