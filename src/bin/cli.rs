//! Reach CLI - dependency graph queries for GDScript projects.
//!
//! Usage:
//!   reach scan                          # Rebuild graph and cache
//!   reach find <name>                   # Find nodes
//!   reach path <from> <to>              # Paths between nodes
//!   reach impact <name>                 # Blast radius of a change
//!   reach trace signal <name>           # Signal flow
//!   reach <command> --json              # Machine-readable output

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::fmt::Display;

use reach::cli::{init_logging, log_level, Cli, Commands, TraceCommand};
use reach::{
    build_graph, load_or_build, DependencyAnalyzer, Direction, FlowTracer, NodeKind, PatternSet,
    QueryEngine, Relationship,
};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;
    init_logging(log_level(&config, cli.verbose));
    let json = cli.json;

    if let Commands::Scan { output } = &cli.command {
        let (graph, summary) = build_graph(&config)?;
        graph
            .save(&config.resolve_cache_path())
            .context("failed to write graph cache")?;
        if let Some(path) = output {
            graph.export_to(path, &config.project.root)?;
            eprintln!("Graph exported to {}", path.display());
        }
        return emit(json, &summary);
    }

    let graph = load_or_build(&config)?;
    let queries = QueryEngine::new(&graph);
    let analyzer = DependencyAnalyzer::new(&graph);
    let tracer = FlowTracer::new(&graph);
    let analysis = &config.analysis;

    match cli.command {
        Commands::Scan { .. } => Ok(()),

        Commands::Stats => emit(json, &graph.stats()),

        Commands::Export { file } => {
            graph.export_to(&file, &config.project.root)?;
            println!(
                "Exported {} nodes, {} edges to {}",
                graph.node_count(),
                graph.edge_count(),
                file.display()
            );
            Ok(())
        }

        Commands::Find {
            name,
            kind,
            file,
            exact,
        } => {
            let kind = kind.as_deref().map(parse_kind).transpose()?;
            emit(json, &queries.search(&name, kind, file.as_deref(), exact))
        }

        Commands::Inspect { id } => emit(json, &queries.node_context(&id)),

        Commands::Path {
            from,
            to,
            max_depth,
            max_paths,
        } => emit(
            json,
            &queries.find_path_by_name(
                &from,
                &to,
                max_depth.unwrap_or(analysis.max_path_depth),
                max_paths.unwrap_or(analysis.max_paths),
            ),
        ),

        Commands::Deps {
            name,
            direction,
            depth,
        } => {
            let direction: Direction = direction.parse().map_err(anyhow::Error::msg)?;
            let id = resolve(&queries, &name, None)?;
            emit(
                json,
                &queries.find_dependencies(
                    &id,
                    direction,
                    depth.unwrap_or(analysis.dependency_depth),
                ),
            )
        }

        Commands::Usages { name } => {
            let id = resolve(&queries, &name, None)?;
            emit(json, &queries.find_usages(&id))
        }

        Commands::Callers { name } => {
            let id = resolve(&queries, &name, Some(NodeKind::Function))?;
            emit(json, &queries.find_callers(&id))
        }

        Commands::Callees { name } => {
            let id = resolve(&queries, &name, Some(NodeKind::Function))?;
            emit(json, &queries.find_callees(&id))
        }

        Commands::Query { text } => emit(
            json,
            &queries.answer(&text, analysis.max_path_depth, analysis.max_paths),
        ),

        Commands::Cycles { relationships, max } => {
            let relationships = relationships
                .iter()
                .map(|r| r.parse::<Relationship>().map_err(anyhow::Error::msg))
                .collect::<Result<Vec<_>>>()?;
            emit(
                json,
                &analyzer.detect_circular_dependencies(
                    &relationships,
                    max.unwrap_or(analysis.max_cycles),
                ),
            )
        }

        Commands::DeadCode { entries } => {
            let patterns = if entries.is_empty() {
                PatternSet::new(&analysis.entry_point_patterns)?
            } else {
                PatternSet::new(&entries)?
            };
            emit(json, &analyzer.detect_dead_code(&patterns))
        }

        Commands::Impact { name, depth } => {
            let id = resolve(&queries, &name, None)?;
            emit(
                json,
                &analyzer.analyze_impact(&id, depth.unwrap_or(analysis.impact_depth)),
            )
        }

        Commands::Coupling { min } => emit(
            json,
            &analyzer.find_highly_coupled_nodes(min.unwrap_or(analysis.min_connections)),
        ),

        Commands::Trace { target } => match target {
            TraceCommand::Variable { name, file } => {
                emit(json, &tracer.trace_variable_flow(&name, file.as_deref()))
            }
            TraceCommand::Signal { name } => emit(json, &tracer.trace_signal_flow(&name)),
            TraceCommand::Execution {
                start,
                to,
                max_depth,
            } => emit(
                json,
                &tracer.trace_execution_path(
                    &start,
                    &to,
                    max_depth.unwrap_or(analysis.max_path_depth),
                ),
            ),
        },
    }
}

/// Print `value` as pretty JSON or with its `Display` rendering.
fn emit<T: Serialize + Display>(json: bool, value: &T) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", value);
    }
    Ok(())
}

fn parse_kind(kind: &str) -> Result<NodeKind> {
    kind.parse().map_err(anyhow::Error::msg)
}

fn resolve(queries: &QueryEngine<'_>, name: &str, kind: Option<NodeKind>) -> Result<String> {
    queries
        .resolve(name, kind)
        .map(|node| node.id.clone())
        .with_context(|| format!("no node named '{}'", name))
}
