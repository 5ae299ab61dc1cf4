//! Flow tracing: how a variable is written and read, how a signal travels
//! from emitters to handlers, and which call chains lead from one function
//! to another.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::graph::engine::CodeGraph;
use crate::graph::types::meta;
use crate::graph::{Confidence, Node, NodeKind, Relationship};
use crate::parser::truncate;
use crate::query::engine::{assemble_paths, build_path, enumerate_paths};
use crate::query::render::{write_more, MAX_SHOWN_PATHS};
use crate::query::{GraphPath, NodeRef};

/// What a step does to the traced entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    Define,
    Read,
    Write,
    Emit,
    Connect,
    Handle,
}

impl FlowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowAction::Define => "define",
            FlowAction::Read => "read",
            FlowAction::Write => "write",
            FlowAction::Emit => "emit",
            FlowAction::Connect => "connect",
            FlowAction::Handle => "handle",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStep {
    pub node: NodeRef,
    pub action: FlowAction,
    #[serde(default)]
    pub context: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code_snippet: String,
    pub confidence: Confidence,
}

impl FlowStep {
    fn definition(node: &Node) -> Self {
        Self {
            node: NodeRef::from(node),
            action: FlowAction::Define,
            context: String::new(),
            code_snippet: node.code_snippet.clone(),
            confidence: node.confidence,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableFlowResult {
    pub variable_name: String,
    pub found: bool,
    /// One per matching variable.
    pub definitions: Vec<FlowStep>,
    pub writes: Vec<FlowStep>,
    pub reads: Vec<FlowStep>,
    pub total_usages: usize,
}

/// A signal-to-handler binding, from code or from a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConnectionInfo {
    pub signal: String,
    pub handler: String,
    pub file_path: String,
    pub line_number: usize,
    pub defined_in_scene: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalFlowResult {
    pub signal_name: String,
    pub found: bool,
    pub definitions: Vec<FlowStep>,
    pub emissions: Vec<FlowStep>,
    pub connections: Vec<SignalConnectionInfo>,
    pub handlers: Vec<FlowStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPathResult {
    pub start_function: String,
    pub end_function: String,
    pub found: bool,
    /// Every call chain over all start/end matches, shortest first.
    pub paths: Vec<GraphPath>,
    pub total_paths: usize,
    pub shortest_length: Option<usize>,
    pub confidence: Confidence,
}

/// Flow traces over a [`CodeGraph`].
#[derive(Clone, Copy)]
pub struct FlowTracer<'g> {
    graph: &'g CodeGraph,
}

impl<'g> FlowTracer<'g> {
    pub fn new(graph: &'g CodeGraph) -> Self {
        Self { graph }
    }

    /// Writes and reads of every variable called `name`, optionally only
    /// in files whose path contains `file`.
    pub fn trace_variable_flow(&self, name: &str, file: Option<&str>) -> VariableFlowResult {
        let mut result = VariableFlowResult {
            variable_name: name.to_string(),
            found: false,
            definitions: Vec::new(),
            writes: Vec::new(),
            reads: Vec::new(),
            total_usages: 0,
        };

        for variable in self.matching(name, NodeKind::Variable, file) {
            result.found = true;
            result.definitions.push(FlowStep::definition(variable));

            let Some(idx) = self.graph.index_of(&variable.id) else {
                continue;
            };
            for (source, edge) in self.graph.in_edges_at(idx) {
                let action = match edge.relationship {
                    Relationship::Writes => FlowAction::Write,
                    Relationship::Reads => FlowAction::Read,
                    _ => continue,
                };
                let Some(node) = self.graph.node_at(source) else {
                    continue;
                };
                let step = FlowStep {
                    node: NodeRef::from(node),
                    action,
                    context: edge.context.clone(),
                    code_snippet: String::new(),
                    confidence: edge.confidence,
                };
                match action {
                    FlowAction::Write => result.writes.push(step),
                    _ => result.reads.push(step),
                }
            }
        }

        result.total_usages = result.writes.len() + result.reads.len();
        result
    }

    /// Emitters, connections, and handlers of the signal called `name`.
    ///
    /// Connections declared in scenes carry the signal name in metadata
    /// rather than an edge from the signal node, so every connection node is
    /// scanned as well. Connections are unique per (handler, file).
    pub fn trace_signal_flow(&self, name: &str) -> SignalFlowResult {
        let mut result = SignalFlowResult {
            signal_name: name.to_string(),
            found: false,
            definitions: Vec::new(),
            emissions: Vec::new(),
            connections: Vec::new(),
            handlers: Vec::new(),
        };
        let mut seen_connections: HashSet<(String, String)> = HashSet::new();
        let mut seen_handlers: HashSet<String> = HashSet::new();

        for signal in self.matching(name, NodeKind::Signal, None) {
            result.found = true;
            result.definitions.push(FlowStep::definition(signal));
            let Some(idx) = self.graph.index_of(&signal.id) else {
                continue;
            };

            for (source, edge) in self.graph.in_edges_at(idx) {
                if edge.relationship != Relationship::Emits {
                    continue;
                }
                if let Some(emitter) = self.graph.node_at(source) {
                    result.emissions.push(FlowStep {
                        node: NodeRef::from(emitter),
                        action: FlowAction::Emit,
                        context: edge.context.clone(),
                        code_snippet: String::new(),
                        confidence: edge.confidence,
                    });
                }
            }

            for (target, edge) in self.graph.out_edges_at(idx) {
                if edge.relationship != Relationship::ConnectsTo {
                    continue;
                }
                let Some(connection) = self.graph.node_at(target) else {
                    continue;
                };
                if connection.kind != NodeKind::SignalConnection {
                    continue;
                }
                self.push_connection(&mut result, &mut seen_connections, &signal.name, connection);

                for (handler_idx, _) in self.graph.out_edges_at(target) {
                    let Some(handler) = self.graph.node_at(handler_idx) else {
                        continue;
                    };
                    if handler.kind == NodeKind::Function && seen_handlers.insert(handler.id.clone()) {
                        result.handlers.push(FlowStep {
                            node: NodeRef::from(handler),
                            action: FlowAction::Handle,
                            context: connection.name.clone(),
                            code_snippet: String::new(),
                            confidence: handler.confidence,
                        });
                    }
                }
            }
        }

        let mut names: Vec<String> = result
            .definitions
            .iter()
            .map(|d| d.node.name.clone())
            .collect();
        names.push(name.to_string());
        for connection in self.graph.nodes() {
            if connection.kind != NodeKind::SignalConnection {
                continue;
            }
            let Some(signal) = connection.meta_str(meta::SIGNAL) else {
                continue;
            };
            if names.iter().any(|n| n == signal) {
                result.found = true;
                self.push_connection(&mut result, &mut seen_connections, signal, connection);
            }
        }

        result
    }

    /// Call chains from any function matching `start` to any function
    /// matching `end`, following `Calls` edges only.
    pub fn trace_execution_path(&self, start: &str, end: &str, max_depth: usize) -> ExecutionPathResult {
        let calls_only = |rel: Relationship| rel == Relationship::Calls;
        let starts = self.matching(start, NodeKind::Function, None);
        let ends = self.matching(end, NodeKind::Function, None);

        let mut paths: Vec<GraphPath> = Vec::new();
        for from in &starts {
            for to in &ends {
                let (Some(from), Some(to)) =
                    (self.graph.index_of(&from.id), self.graph.index_of(&to.id))
                else {
                    continue;
                };
                paths.extend(
                    enumerate_paths(self.graph, from, to, max_depth, &calls_only)
                        .iter()
                        .map(|nodes| build_path(self.graph, nodes, &calls_only)),
                );
            }
        }

        let assembled = assemble_paths(start, end, paths, usize::MAX);
        ExecutionPathResult {
            start_function: start.to_string(),
            end_function: end.to_string(),
            found: assembled.found,
            paths: assembled.paths,
            total_paths: assembled.total_paths,
            shortest_length: assembled.shortest_length,
            confidence: assembled.confidence,
        }
    }

    // ─── Internal Helpers ───────────────────────────────────────

    /// Exact name matches of `kind`, falling back to substring matches.
    fn matching(&self, name: &str, kind: NodeKind, file: Option<&str>) -> Vec<&'g Node> {
        let exact = self.graph.find_by_name(name, Some(kind), file, true);
        if exact.is_empty() {
            self.graph.find_by_name(name, Some(kind), file, false)
        } else {
            exact
        }
    }

    fn push_connection(
        &self,
        result: &mut SignalFlowResult,
        seen: &mut HashSet<(String, String)>,
        signal: &str,
        connection: &Node,
    ) {
        let handler = connection
            .meta_str(meta::HANDLER)
            .unwrap_or(&connection.name)
            .to_string();
        if !seen.insert((handler.clone(), connection.file_path.clone())) {
            return;
        }
        result.connections.push(SignalConnectionInfo {
            signal: signal.to_string(),
            handler,
            file_path: connection.file_path.clone(),
            line_number: connection.line_number,
            defined_in_scene: connection.meta_flag(meta::DEFINED_IN_SCENE),
        });
    }
}

// ─── Rendering ──────────────────────────────────────────────────

fn write_steps(f: &mut fmt::Formatter<'_>, title: &str, steps: &[FlowStep]) -> fmt::Result {
    if steps.is_empty() {
        return Ok(());
    }
    writeln!(f, "\n=== {} ({}) ===", title, steps.len())?;
    for step in steps {
        writeln!(f, "  [{}] in {}", step.action.as_str().to_uppercase(), step.node.name)?;
        writeln!(f, "       @ {}:{}", step.node.file_path, step.node.line_number)?;
        if !step.context.is_empty() {
            writeln!(f, "       {}", truncate(step.context.trim(), 60))?;
        }
    }
    Ok(())
}

impl fmt::Display for VariableFlowResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.found {
            return writeln!(f, "VARIABLE NOT FOUND: '{}'", self.variable_name);
        }
        writeln!(f, "VARIABLE FLOW: '{}'", self.variable_name)?;
        writeln!(f, "Total usages: {}", self.total_usages)?;

        writeln!(f, "\n=== DEFINITION ===")?;
        for def in &self.definitions {
            writeln!(f, "  {}: {}", def.node.kind, def.node.name)?;
            writeln!(f, "  @ {}:{}", def.node.file_path, def.node.line_number)?;
        }
        write_steps(f, "WRITES", &self.writes)?;
        write_steps(f, "READS", &self.reads)
    }
}

impl fmt::Display for SignalFlowResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.found {
            return writeln!(f, "SIGNAL NOT FOUND: '{}'", self.signal_name);
        }
        writeln!(f, "SIGNAL FLOW: '{}'", self.signal_name)?;

        if !self.definitions.is_empty() {
            writeln!(f, "\n=== DEFINITION ===")?;
            for def in &self.definitions {
                writeln!(f, "  signal {}", def.node.name)?;
                writeln!(f, "  @ {}:{}", def.node.file_path, def.node.line_number)?;
            }
        }

        if !self.emissions.is_empty() {
            writeln!(f, "\n=== EMITTED BY ({}) ===", self.emissions.len())?;
            for step in &self.emissions {
                writeln!(f, "  {}()", step.node.name)?;
                writeln!(f, "       @ {}:{}", step.node.file_path, step.node.line_number)?;
                if !step.context.is_empty() {
                    writeln!(f, "       {}", truncate(step.context.trim(), 60))?;
                }
            }
        }

        if !self.connections.is_empty() {
            writeln!(f, "\n=== CONNECTIONS ({}) ===", self.connections.len())?;
            for conn in &self.connections {
                writeln!(f, "  {} → {}()", conn.signal, conn.handler)?;
                writeln!(f, "       @ {}:{}", conn.file_path, conn.line_number)?;
                let origin = if conn.defined_in_scene { "scene" } else { "code" };
                writeln!(f, "       Defined in: {}", origin)?;
            }
        }

        if !self.handlers.is_empty() {
            writeln!(f, "\n=== HANDLERS ({}) ===", self.handlers.len())?;
            for step in &self.handlers {
                writeln!(f, "  {}()", step.node.name)?;
                writeln!(f, "       @ {}:{}", step.node.file_path, step.node.line_number)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ExecutionPathResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.found {
            return writeln!(
                f,
                "NO EXECUTION PATH: {} → {}",
                self.start_function, self.end_function
            );
        }
        writeln!(
            f,
            "EXECUTION PATH: {} → {}",
            self.start_function, self.end_function
        )?;
        writeln!(
            f,
            "Paths found: {}, Shortest: {} calls",
            self.total_paths,
            self.shortest_length.unwrap_or(0)
        )?;
        writeln!(f, "Confidence: {}", self.confidence)?;

        for (i, path) in self.paths.iter().take(MAX_SHOWN_PATHS).enumerate() {
            writeln!(f, "\n=== Path {} ===", i + 1)?;
            for (j, step) in path.steps.iter().enumerate() {
                let indent = "  ".repeat(j);
                let arrow = if j > 0 { "└─> " } else { "" };
                writeln!(f, "{}{}{}()", indent, arrow, step.node.name)?;
                writeln!(f, "{}    @ {}:{}", indent, step.node.file_path, step.node.line_number)?;
                if let Some(next) = path.steps.get(j + 1) {
                    writeln!(f, "{}    calls {}()", indent, next.node.name)?;
                }
            }
        }
        write_more(
            f,
            "\n",
            self.paths.len().min(MAX_SHOWN_PATHS),
            self.total_paths,
            "paths",
        )
    }
}
