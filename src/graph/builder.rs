//! Graph builder: scans a project and builds the code graph.
//!
//! Walks the project root respecting .gitignore, keeps files selected by the
//! configured include/exclude globs, extracts each one in sorted path order,
//! and resolves symbolic edges once every file has been merged.

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::engine::CodeGraph;
use crate::config::ReachConfig;
use crate::error::Result;
use crate::parser::{extract_file, normalize_path, SourceLanguage};
use crate::pattern::PatternSet;

/// Build a code graph from the project described by `config`.
///
/// Per-file read failures land in [`IngestSummary::parse_errors`]; only an
/// invalid include/exclude pattern fails the whole build.
pub fn build_graph(config: &ReachConfig) -> Result<(CodeGraph, IngestSummary)> {
    let root = config.project.root.as_path();
    let files = collect_files(config)?;
    info!(root = %root.display(), files = files.len(), "building graph");

    let mut graph = CodeGraph::new();
    let mut summary = IngestSummary::default();

    for rel_path in &files {
        let shown = normalize_path(rel_path);
        summary.files_scanned += 1;
        match SourceLanguage::from_path(rel_path) {
            Some(SourceLanguage::Gdscript) => summary.script_files += 1,
            Some(SourceLanguage::Scene) => summary.scene_files += 1,
            None => {}
        }

        let source = match fs::read_to_string(root.join(rel_path)) {
            Ok(source) => source,
            Err(e) => {
                warn!(file = %shown, error = %e, "failed to read file");
                summary
                    .parse_errors
                    .push(format!("{}: failed to read file: {}", shown, e));
                continue;
            }
        };

        match extract_file(rel_path, &source) {
            Ok(extraction) => {
                summary.parse_errors.extend(
                    extraction
                        .errors
                        .iter()
                        .map(|e| format!("{}: {}", shown, e)),
                );
                summary.parse_warnings.extend(
                    extraction
                        .warnings
                        .iter()
                        .map(|w| format!("{}: {}", shown, w)),
                );
                graph.ingest(extraction);
            }
            Err(e) => summary.parse_errors.push(format!("{}: {}", shown, e)),
        }
    }

    let report = graph.resolve_pending();
    summary.unresolved_edges = report.unresolved.len();

    let stats = graph.stats();
    summary.total_nodes = stats.total_nodes;
    summary.total_edges = stats.total_edges;
    summary.nodes_by_kind = stats.nodes_by_kind;
    summary.edges_by_relationship = stats.edges_by_relationship;
    summary.ambiguous_nodes = stats.ambiguous_nodes;
    summary.low_confidence_edges = stats.low_confidence_edges;

    info!(
        nodes = summary.total_nodes,
        edges = summary.total_edges,
        errors = summary.parse_errors.len(),
        warnings = summary.parse_warnings.len(),
        "graph built"
    );
    Ok((graph, summary))
}

/// Load the cached graph when there is one, otherwise build and cache it.
/// A cache that fails to load or save is logged and bypassed.
pub fn load_or_build(config: &ReachConfig) -> Result<CodeGraph> {
    let cache_path = config.resolve_cache_path();
    if cache_path.exists() {
        match CodeGraph::load(&cache_path) {
            Ok(graph) => {
                info!(cache = %cache_path.display(), nodes = graph.node_count(), "graph loaded from cache");
                return Ok(graph);
            }
            Err(e) => warn!(error = %e, "cache load failed, rebuilding"),
        }
    }

    let (graph, _) = build_graph(config)?;
    if let Err(e) = graph.save(&cache_path) {
        warn!(error = %e, "failed to cache graph");
    }
    Ok(graph)
}

/// Project-relative paths of every file the build would ingest, sorted.
pub fn collect_files(config: &ReachConfig) -> Result<Vec<PathBuf>> {
    let root = config.project.root.as_path();
    let include = PatternSet::new(&config.parsing.include_patterns)?;
    let exclude = PatternSet::new(&config.parsing.exclude_patterns)?;

    let mut files: Vec<PathBuf> = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(Path::to_path_buf)
        })
        .filter(|rel| SourceLanguage::from_path(rel).is_some())
        .filter(|rel| {
            let rel = normalize_path(rel);
            include.matches_any(&rel) && !exclude.matches_any(&rel)
        })
        .collect();

    files.sort();
    debug!(count = files.len(), "collected source files");
    Ok(files)
}

/// Get statistics about what files would be parsed.
pub fn scan_stats(config: &ReachConfig) -> Result<ScanStats> {
    let mut stats = ScanStats::default();
    for file in collect_files(config)? {
        stats.total_files += 1;
        match SourceLanguage::from_path(&file) {
            Some(SourceLanguage::Gdscript) => stats.script_files += 1,
            Some(SourceLanguage::Scene) => stats.scene_files += 1,
            None => {}
        }
    }
    Ok(stats)
}

#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub total_files: usize,
    pub script_files: usize,
    pub scene_files: usize,
}

impl fmt::Display for ScanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Found {} source files (GDScript: {}, Scene: {})",
            self.total_files, self.script_files, self.scene_files
        )
    }
}

/// Everything an ingestion pass reports besides the graph itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestSummary {
    pub files_scanned: usize,
    pub script_files: usize,
    pub scene_files: usize,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub nodes_by_kind: BTreeMap<String, usize>,
    pub edges_by_relationship: BTreeMap<String, usize>,
    pub ambiguous_nodes: usize,
    /// Edges with `low` or `ambiguous` confidence.
    pub low_confidence_edges: usize,
    /// Symbolic edges left pointing at a placeholder id.
    pub unresolved_edges: usize,
    pub parse_errors: Vec<String>,
    pub parse_warnings: Vec<String>,
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Files: {} (GDScript: {}, Scene: {})",
            self.files_scanned, self.script_files, self.scene_files
        )?;
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
        writeln!(f, "Unresolved edges: {}", self.unresolved_edges)?;
        write!(
            f,
            "Errors: {}  Warnings: {}",
            self.parse_errors.len(),
            self.parse_warnings.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{NodeKind, Relationship};
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project() -> (TempDir, ReachConfig) {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "actors/actor.gd",
            "class_name Actor\nextends Node2D\n\nfunc hit():\n\tpass\n",
        );
        write(
            dir.path(),
            "actors/player.gd",
            "class_name Player\nextends Actor\n\nfunc _ready():\n\tcall(\"boost\")\n",
        );
        write(
            dir.path(),
            "main.tscn",
            "[gd_scene format=3]\n\n[node name=\"Main\" type=\"Node\"]\n",
        );
        write(dir.path(), "addons/plugin/tool.gd", "func x():\n\tpass\n");
        write(dir.path(), "README.md", "# not code\n");

        let mut config = ReachConfig::default();
        config.project.root = dir.path().to_path_buf();
        (dir, config)
    }

    #[test]
    fn test_collect_files_sorted_and_filtered() {
        let (_dir, config) = project();
        let files: Vec<String> = collect_files(&config)
            .unwrap()
            .iter()
            .map(|p| normalize_path(p))
            .collect();
        assert_eq!(files, vec!["actors/actor.gd", "actors/player.gd", "main.tscn"]);
    }

    #[test]
    fn test_build_graph_summary() {
        let (_dir, config) = project();
        let (graph, summary) = build_graph(&config).unwrap();

        assert_eq!(summary.files_scanned, 3);
        assert_eq!(summary.script_files, 2);
        assert_eq!(summary.scene_files, 1);
        assert_eq!(summary.total_nodes, graph.node_count());
        assert_eq!(summary.ambiguous_nodes, 1);
        assert_eq!(summary.low_confidence_edges, 1);
        assert_eq!(summary.parse_warnings.len(), 1);
        assert!(summary.parse_warnings[0].starts_with("actors/player.gd: "));
        // Node2D is not defined anywhere in the project
        assert_eq!(summary.unresolved_edges, 1);
        assert!(summary.to_string().contains("Files: 3 (GDScript: 2, Scene: 1)"));
    }

    #[test]
    fn test_unreadable_file_is_reported_not_fatal() {
        let (dir, config) = project();
        fs::write(dir.path().join("actors/broken.gd"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let (graph, summary) = build_graph(&config).unwrap();
        assert_eq!(summary.files_scanned, 4);
        assert_eq!(summary.parse_errors.len(), 1);
        assert!(summary.parse_errors[0].starts_with("actors/broken.gd: failed to read file"));
        assert!(!graph.find_by_name("Actor", None, None, true).is_empty());
    }

    #[test]
    fn test_inheritance_resolves_across_files() {
        let (_dir, config) = project();
        let (graph, _) = build_graph(&config).unwrap();

        let found = graph.find_by_name("Actor", Some(NodeKind::Class), None, true);
        let actor = found[0];
        let incoming = graph.incoming(&actor.id);
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].relationship, Relationship::Inherits);
        assert!(incoming[0].source_id.starts_with("class_actors_player_gd_Player"));
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let (_dir, config) = project();
        let (first, _) = build_graph(&config).unwrap();
        let (second, _) = build_graph(&config).unwrap();

        let ids = |g: &CodeGraph| g.nodes().map(|n| n.id.clone()).collect::<Vec<_>>();
        let edges = |g: &CodeGraph| g.edges().cloned().collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(edges(&first), edges(&second));
    }

    #[test]
    fn test_scan_stats() {
        let (_dir, config) = project();
        let stats = scan_stats(&config).unwrap();
        assert_eq!(stats.total_files, 3);
        assert_eq!(
            stats.to_string(),
            "Found 3 source files (GDScript: 2, Scene: 1)"
        );
    }

    #[test]
    fn test_load_or_build_writes_then_reads_cache() {
        let (dir, config) = project();
        let cache = config.resolve_cache_path();
        assert!(!cache.exists());

        let built = load_or_build(&config).unwrap();
        assert!(cache.exists());

        // a new file is invisible until the cache is rebuilt
        write(dir.path(), "late.gd", "func late():\n\tpass\n");
        let cached = load_or_build(&config).unwrap();
        assert_eq!(cached.node_count(), built.node_count());
        assert!(cached.find_by_name("late", None, None, true).is_empty());
    }

    #[test]
    fn test_include_patterns_narrow_the_build() {
        let (_dir, mut config) = project();
        config.parsing.include_patterns = vec!["**/*.tscn".to_string()];
        let (graph, summary) = build_graph(&config).unwrap();
        assert_eq!(summary.files_scanned, 1);
        assert!(graph.nodes().all(|n| n.file_path == "main.tscn"));
    }
}
