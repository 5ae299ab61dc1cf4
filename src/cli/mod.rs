//! CLI definitions for `reach`.
//!
//! Commands:
//! - Build: scan, stats, export
//! - Query: find, inspect, path, deps, usages, callers, callees, query
//! - Analysis: cycles, dead-code, impact, coupling
//! - Flow: trace variable|signal|execution

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::ReachConfig;
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "reach")]
#[command(about = "Dependency graph and structural analysis for GDScript projects")]
#[command(version)]
pub struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Config file (default: <root>/.reach/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    // ─── Build ──────────────────────────────────────────────────────
    /// Scan the project, rebuild the graph and refresh the cache
    Scan {
        /// Also export the graph to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show graph statistics
    Stats,

    /// Export the graph as JSON
    Export {
        file: PathBuf,
    },

    // ─── Query ──────────────────────────────────────────────────────
    /// Find nodes by name
    Find {
        name: String,

        /// Only nodes of this kind (function, variable, signal, ...)
        #[arg(short, long)]
        kind: Option<String>,

        /// Only nodes in files whose path contains this
        #[arg(short, long)]
        file: Option<String>,

        /// Exact name match instead of substring
        #[arg(long)]
        exact: bool,
    },

    /// Show a node with its incoming and outgoing edges
    Inspect {
        id: String,
    },

    /// All paths between two nodes
    Path {
        from: String,
        to: String,

        #[arg(long)]
        max_depth: Option<usize>,

        #[arg(long)]
        max_paths: Option<usize>,
    },

    /// Transitive dependencies of a node
    Deps {
        name: String,

        /// forward, backward, or both
        #[arg(short, long, default_value = "both")]
        direction: String,

        #[arg(long)]
        depth: Option<usize>,
    },

    /// Everything that references a node
    Usages {
        name: String,
    },

    /// Functions calling a function
    Callers {
        name: String,
    },

    /// Functions called by a function
    Callees {
        name: String,
    },

    /// Natural-language query, e.g. "how does player reach enemy"
    Query {
        text: String,
    },

    // ─── Analysis ───────────────────────────────────────────────────
    /// Detect circular dependencies
    Cycles {
        /// Only follow these relationships (repeatable)
        #[arg(long = "relationship")]
        relationships: Vec<String>,

        #[arg(long)]
        max: Option<usize>,
    },

    /// Functions, classes and signals unreachable from entry points
    DeadCode {
        /// Entry point glob (repeatable; default from config)
        #[arg(long = "entry")]
        entries: Vec<String>,
    },

    /// What breaks if a node changes
    Impact {
        name: String,

        #[arg(long)]
        depth: Option<usize>,
    },

    /// Nodes with many connections
    Coupling {
        #[arg(long)]
        min: Option<usize>,
    },

    // ─── Flow ───────────────────────────────────────────────────────
    /// Trace data, signal or execution flow
    Trace {
        #[command(subcommand)]
        target: TraceCommand,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum TraceCommand {
    /// Writes and reads of a variable
    Variable {
        name: String,

        #[arg(short, long)]
        file: Option<String>,
    },

    /// Emitters, connections and handlers of a signal
    Signal {
        name: String,
    },

    /// Call chains between two functions
    Execution {
        start: String,

        #[arg(long)]
        to: String,

        #[arg(long)]
        max_depth: Option<usize>,
    },
}

impl Cli {
    /// Project root, canonicalized when it exists.
    pub fn project_root(&self) -> PathBuf {
        self.root.canonicalize().unwrap_or_else(|_| self.root.clone())
    }

    /// Config for the selected root: the `--config` file when given
    /// (which must parse), otherwise `<root>/.reach/config.toml`.
    pub fn load_config(&self) -> Result<ReachConfig> {
        let root = self.project_root();
        match &self.config {
            Some(path) => ReachConfig::for_project_with(&root, path),
            None => Ok(ReachConfig::for_project(&root)),
        }
    }
}

/// Install a stderr tracing subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

/// Level for a CLI run: `--verbose` forces debug.
pub fn log_level<'a>(config: &'a ReachConfig, verbose: bool) -> &'a str {
    if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("reach").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["find", "player", "--kind", "function", "--json", "-r", "game"]);
        assert!(cli.json);
        assert_eq!(cli.root, PathBuf::from("game"));
        assert_eq!(
            cli.command,
            Commands::Find {
                name: "player".into(),
                kind: Some("function".into()),
                file: None,
                exact: false,
            }
        );
    }

    #[test]
    fn test_repeatable_and_nested_commands() {
        let cli = parse(&["cycles", "--relationship", "calls", "--relationship", "emits"]);
        assert_eq!(
            cli.command,
            Commands::Cycles {
                relationships: vec!["calls".into(), "emits".into()],
                max: None,
            }
        );

        let cli = parse(&["trace", "execution", "_ready", "--to", "die", "--max-depth", "4"]);
        assert_eq!(
            cli.command,
            Commands::Trace {
                target: TraceCommand::Execution {
                    start: "_ready".into(),
                    to: "die".into(),
                    max_depth: Some(4),
                }
            }
        );

        let cli = parse(&["dead-code", "--entry", "**/boot.gd"]);
        assert_eq!(
            cli.command,
            Commands::DeadCode {
                entries: vec!["**/boot.gd".into()]
            }
        );
    }

    #[test]
    fn test_invalid_invocations() {
        assert!(Cli::try_parse_from(["reach"]).is_err());
        assert!(Cli::try_parse_from(["reach", "path", "only_one"]).is_err());
        assert!(Cli::try_parse_from(["reach", "trace", "execution", "a"]).is_err());
    }

    #[test]
    fn test_config_selection() {
        let dir = tempfile::tempdir().unwrap();
        let cli = parse(&["stats", "--root", dir.path().to_str().unwrap()]);
        let config = cli.load_config().unwrap();
        assert_eq!(config.project.root, dir.path().canonicalize().unwrap());
        assert_eq!(log_level(&config, false), "info");
        assert_eq!(log_level(&config, true), "debug");
        assert!(config.resolve_cache_path().starts_with(dir.path().canonicalize().unwrap()));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[analysis\n").unwrap();
        let cli = parse(&["stats", "--root", dir.path().to_str().unwrap(), "--config", bad.to_str().unwrap()]);
        assert!(cli.load_config().is_err());
    }
}
