//! # Reach
//!
//! Dependency graph and structural analysis for GDScript projects.
//!
//! Reach scans `.gd` scripts and `.tscn` scenes into a typed multigraph of
//! functions, variables, signals, scenes and resources, then answers
//! structural questions about it: how two things connect, what breaks if
//! something changes, where a signal goes, what is never reached.
//!
//! ## Key Features
//!
//! - **Typed graph**: Node kinds, relationships, per-edge confidence
//! - **Queries**: Path enumeration, dependency walks, usages, callers/callees
//! - **Analysis**: Cycles, dead code, change impact, coupling hotspots
//! - **Flow tracing**: Variable writes/reads, signal wiring, call chains
//! - **Persistent**: JSON graph cache under `.reach/`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reach::{build_graph, DependencyAnalyzer, QueryEngine, ReachConfig};
//! use std::path::Path;
//!
//! let config = ReachConfig::for_project(Path::new("."));
//! let (graph, summary) = build_graph(&config)?;
//! println!("{}", summary);
//!
//! let answer = QueryEngine::new(&graph).answer("path from player to enemy", 10, 10);
//! println!("{}", answer);
//!
//! let impact = DependencyAnalyzer::new(&graph).analyze_impact("some_node_id", 3);
//! println!("{}", impact);
//! # Ok::<(), reach::ReachError>(())
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod flow;
pub mod graph;
pub mod mcp;
pub mod parser;
pub mod pattern;
pub mod query;

// Re-exports for convenience
pub use config::ReachConfig;
pub use error::{ReachError, Result};
pub use pattern::PatternSet;

// Graph re-exports
pub use graph::{
    build_graph, load_or_build, CodeGraph, Confidence, Edge, GraphStats, IngestSummary, Node,
    NodeKind, Relationship,
};
pub use parser::extract_file;

// Query / analysis / flow
pub use analysis::{CycleReport, DeadCodeResult, DependencyAnalyzer, ImpactResult, RiskLevel};
pub use flow::FlowTracer;
pub use query::{Direction, QueryAnswer, QueryEngine};

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const PLAYER: &str = r#"class_name Player
extends Node2D

signal died

var health: int = 100

func _ready():
	died.connect(_on_died)
	take_damage(0)

func take_damage(amount):
	health = health - amount
	if health <= 0:
		die()

func die():
	died.emit()

func _on_died():
	print("dead")

func unused_helper():
	pass
"#;

    const PINGPONG: &str = r#"extends Node

func ping(n):
	if n > 0:
		pong(n - 1)

func pong(n):
	ping(n)
"#;

    fn project() -> (TempDir, ReachConfig) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("scripts")).unwrap();
        fs::write(dir.path().join("scripts/player.gd"), PLAYER).unwrap();
        fs::write(dir.path().join("scripts/pingpong.gd"), PINGPONG).unwrap();
        let config = ReachConfig::for_project(dir.path());
        (dir, config)
    }

    fn function<'g>(graph: &'g CodeGraph, name: &str) -> &'g Node {
        graph.find_by_name(name, Some(NodeKind::Function), None, true)[0]
    }

    fn chain(ids: &[&str], edges: &[(&str, &str)]) -> CodeGraph {
        let mut g = CodeGraph::new();
        for id in ids {
            g.add_node(Node::new(*id, NodeKind::Function, *id, format!("{}.gd", id), 1, "gdscript"));
        }
        for (from, to) in edges {
            g.add_edge(Edge::new(*from, *to, Relationship::Calls));
        }
        g
    }

    // ─── Scenarios ──────────────────────────────────────────────

    #[test]
    fn test_impact_of_call_chain_tail() {
        let g = chain(&["A", "B", "C"], &[("A", "B"), ("B", "C")]);
        let impact = DependencyAnalyzer::new(&g).analyze_impact("C", 2);

        let direct: Vec<_> = impact.direct_impact.iter().map(|e| e.node.id.as_str()).collect();
        assert_eq!(direct, vec!["B"]);
        assert_eq!(impact.indirect_impact.len(), 1);
        assert_eq!(impact.indirect_impact[0].node.id, "A");
        assert_eq!(impact.indirect_impact[0].depth, 2);
        assert_eq!(impact.total_affected, 2);
        assert_eq!(impact.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_three_node_call_cycle() {
        let g = chain(&["X", "Y", "Z"], &[("X", "Y"), ("Y", "Z"), ("Z", "X")]);
        let report = DependencyAnalyzer::new(&g).detect_circular_dependencies(&[], 50);

        assert_eq!(report.total_cycles, 1);
        let cycle = &report.cycles[0];
        assert_eq!(cycle.cycle_type, analysis::CycleType::Call);
        assert_eq!(cycle.severity, analysis::Severity::Medium);
        assert_eq!(cycle.length, 3);
    }

    #[test]
    fn test_usages_of_unreferenced_node() {
        let g = chain(&["lonely"], &[]);
        let usages = QueryEngine::new(&g).find_usages("lonely");
        assert!(usages.found);
        assert_eq!(usages.total_count, 0);
        assert!(usages.usages.is_empty());
    }

    // ─── End to end ─────────────────────────────────────────────

    #[test]
    fn test_extract_single_file() {
        let extraction = extract_file(Path::new("scripts/player.gd"), PLAYER).unwrap();
        let names: Vec<&str> = extraction
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Function)
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(names, vec!["_ready", "take_damage", "die", "_on_died", "unused_helper"]);
        assert!(extract_file(Path::new("notes.txt"), "").is_err());
    }

    #[test]
    fn test_project_queries() {
        let (_dir, config) = project();
        let (graph, summary) = build_graph(&config).unwrap();
        assert_eq!(summary.files_scanned, 2);
        assert!(summary.parse_errors.is_empty());

        let queries = QueryEngine::new(&graph);
        let die = function(&graph, "die");
        let callers = queries.find_callers(&die.id);
        let names: Vec<_> = callers.usages.iter().map(|u| u.node.name.as_str()).collect();
        assert_eq!(names, vec!["take_damage"]);

        match queries.answer("path from _ready to died", 10, 10) {
            QueryAnswer::Path(path) => {
                assert!(path.found);
                assert_eq!(path.shortest_length, Some(3));
            }
            other => panic!("unexpected answer: {:?}", other),
        }
    }

    #[test]
    fn test_project_analysis() {
        let (_dir, config) = project();
        let (graph, _) = build_graph(&config).unwrap();
        let analyzer = DependencyAnalyzer::new(&graph);

        let cycles = analyzer.detect_circular_dependencies(&[Relationship::Calls], 50);
        assert_eq!(cycles.total_cycles, 1);
        assert_eq!(cycles.cycles[0].length, 2);
        assert_eq!(cycles.cycles[0].severity, analysis::Severity::High);

        let entries = PatternSet::new(&config.analysis.entry_point_patterns).unwrap();
        let dead = analyzer.detect_dead_code(&entries);
        let names: Vec<_> = dead.unreachable_functions.iter().map(|n| n.name.as_str()).collect();
        assert!(names.contains(&"unused_helper"));
        assert!(names.contains(&"ping"));
        assert!(!names.contains(&"die"));

        let impact = analyzer.analyze_impact(&function(&graph, "die").id, 3);
        assert_eq!(impact.direct_impact.len(), 1);
        assert_eq!(impact.indirect_impact.len(), 1);
        assert_eq!(impact.indirect_impact[0].node.name, "_ready");
    }

    #[test]
    fn test_project_flows() {
        let (_dir, config) = project();
        let (graph, _) = build_graph(&config).unwrap();
        let tracer = FlowTracer::new(&graph);

        let health = tracer.trace_variable_flow("health", None);
        assert!(health.found);
        assert_eq!(health.writes.len(), 1);
        assert!(!health.reads.is_empty());
        assert!(!tracer.trace_variable_flow("health", Some("pingpong")).found);

        let died = tracer.trace_signal_flow("died");
        assert!(died.found);
        assert_eq!(died.emissions.len(), 1);
        assert_eq!(died.emissions[0].node.name, "die");
        assert!(died.handlers.iter().any(|h| h.node.name == "_on_died"));

        let exec = tracer.trace_execution_path("_ready", "die", 10);
        assert!(exec.found);
        assert_eq!(exec.shortest_length, Some(2));
    }

    #[test]
    fn test_cache_round_trip_preserves_answers() {
        let (_dir, config) = project();
        let (graph, _) = build_graph(&config).unwrap();
        graph.save(&config.resolve_cache_path()).unwrap();

        let cached = load_or_build(&config).unwrap();
        assert_eq!(cached.node_count(), graph.node_count());
        assert_eq!(cached.edge_count(), graph.edge_count());

        let before = DependencyAnalyzer::new(&graph).detect_circular_dependencies(&[], 50);
        let after = DependencyAnalyzer::new(&cached).detect_circular_dependencies(&[], 50);
        assert_eq!(before.total_cycles, after.total_cycles);
    }
}
