//! Reach MCP Server - dependency graph queries for AI agents.
//!
//! Runs a JSON-RPC 2.0 server over STDIO that exposes the graph
//! through the Model Context Protocol (MCP).
//!
//! Usage:
//!   reach-mcp [project_root]
//!
//! If no project root is given, uses the current working directory.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tracing::info;

use reach::cli::init_logging;
use reach::{load_or_build, ReachConfig};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let project_root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let project_root = project_root.canonicalize().unwrap_or(project_root);

    let config = ReachConfig::for_project(&project_root);
    // stdout carries the protocol; logs go to stderr
    init_logging(&config.logging.level);
    info!(root = %project_root.display(), "Reach MCP server starting");

    let graph = load_or_build(&config)?;
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "MCP server ready, waiting for JSON-RPC requests on stdin"
    );

    reach::mcp::server::run(Arc::new(RwLock::new(graph)), config)?;
    Ok(())
}
