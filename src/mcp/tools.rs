//! MCP tool implementations: maps tool calls to graph queries and analyses.

use serde_json::{json, Value};
use std::str::FromStr;

use super::types::{ToolDefinition, ToolsCallResult};
use crate::analysis::DependencyAnalyzer;
use crate::config::ReachConfig;
use crate::flow::FlowTracer;
use crate::graph::{CodeGraph, NodeKind, Relationship};
use crate::pattern::PatternSet;
use crate::query::{Direction, QueryAnswer, QueryEngine};

/// Return the list of all available tools with their JSON schemas.
pub fn list_tools() -> Vec<ToolDefinition> {
    let kinds: Vec<&str> = NodeKind::ALL.iter().map(|k| k.as_str()).collect();
    let relationships: Vec<&str> = Relationship::ALL.iter().map(|r| r.as_str()).collect();

    vec![
        ToolDefinition {
            name: "reach_find",
            description: "Find graph nodes (functions, variables, signals, scenes, ...) by name. \
                Case-insensitive substring match unless `exact` is set.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Name or part of a name" },
                    "kind": { "type": "string", "enum": kinds },
                    "file": { "type": "string", "description": "Optional file path substring" },
                    "exact": { "type": "boolean", "default": false }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "reach_path",
            description: "Enumerate every simple path between two nodes, shortest first, \
                with an aggregate confidence that drops when a hop is heuristic.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "from": { "type": "string", "description": "Source node id or name" },
                    "to": { "type": "string", "description": "Target node id or name" },
                    "max_depth": { "type": "integer" },
                    "max_paths": { "type": "integer" }
                },
                "required": ["from", "to"]
            }),
        },
        ToolDefinition {
            name: "reach_dependencies",
            description: "Breadth-first dependencies of a node: forward (what it affects), \
                backward (what affects it), or both.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Node id or name" },
                    "direction": { "type": "string", "enum": ["forward", "backward", "both"] },
                    "depth": { "type": "integer" }
                },
                "required": ["name"]
            }),
        },
        ToolDefinition {
            name: "reach_usages",
            description: "Who references a node. `mode` narrows to callers or callees of a function.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Node id or name" },
                    "mode": { "type": "string", "enum": ["usages", "callers", "callees"], "default": "usages" }
                },
                "required": ["name"]
            }),
        },
        ToolDefinition {
            name: "reach_impact",
            description: "Blast radius of changing a node: direct and indirect dependents, \
                affected files, and a risk level.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Node id or name" },
                    "depth": { "type": "integer" }
                },
                "required": ["name"]
            }),
        },
        ToolDefinition {
            name: "reach_cycles",
            description: "Detect circular dependencies, classified by type and severity.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "relationships": {
                        "type": "array",
                        "items": { "type": "string", "enum": relationships },
                        "description": "Only follow these edge types (default: all)"
                    },
                    "max_cycles": { "type": "integer" }
                }
            }),
        },
        ToolDefinition {
            name: "reach_dead_code",
            description: "Functions, classes, and signals unreachable from entry points \
                (entry files, lifecycle callbacks, scenes, scene signal connections).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entry_points": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Glob patterns for entry point files (default: configured)"
                    }
                }
            }),
        },
        ToolDefinition {
            name: "reach_coupling",
            description: "Nodes with at least `min_connections` incoming plus outgoing edges.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "min_connections": { "type": "integer" }
                }
            }),
        },
        ToolDefinition {
            name: "reach_trace_variable",
            description: "Every write and read of a class variable.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "file": { "type": "string", "description": "Optional file path substring" }
                },
                "required": ["name"]
            }),
        },
        ToolDefinition {
            name: "reach_trace_signal",
            description: "A signal's emitters, connections (code and scene), and handlers.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" }
                },
                "required": ["name"]
            }),
        },
        ToolDefinition {
            name: "reach_trace_execution",
            description: "Call chains from one function to another, over call edges only.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "from": { "type": "string" },
                    "to": { "type": "string" },
                    "max_depth": { "type": "integer" }
                },
                "required": ["from", "to"]
            }),
        },
        ToolDefinition {
            name: "reach_stats",
            description: "Node and edge counts by kind, ambiguity counts, dangling edges.",
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
    ]
}

/// Dispatch a tool call to the appropriate handler.
pub fn call_tool(
    graph: &CodeGraph,
    config: &ReachConfig,
    name: &str,
    arguments: &Value,
) -> ToolsCallResult {
    let outcome = match name {
        "reach_find" => handle_find(graph, arguments),
        "reach_path" => handle_path(graph, config, arguments),
        "reach_dependencies" => handle_dependencies(graph, config, arguments),
        "reach_usages" => handle_usages(graph, arguments),
        "reach_impact" => handle_impact(graph, config, arguments),
        "reach_cycles" => handle_cycles(graph, config, arguments),
        "reach_dead_code" => handle_dead_code(graph, config, arguments),
        "reach_coupling" => Ok(ToolsCallResult::json(
            &DependencyAnalyzer::new(graph).find_highly_coupled_nodes(usize_arg(
                arguments,
                "min_connections",
                config.analysis.min_connections,
            )),
        )),
        "reach_trace_variable" => required(arguments, "name").map(|n| {
            ToolsCallResult::json(
                &FlowTracer::new(graph).trace_variable_flow(n, str_arg(arguments, "file")),
            )
        }),
        "reach_trace_signal" => required(arguments, "name")
            .map(|n| ToolsCallResult::json(&FlowTracer::new(graph).trace_signal_flow(n))),
        "reach_trace_execution" => handle_trace_execution(graph, config, arguments),
        "reach_stats" => Ok(ToolsCallResult::json(&graph.stats())),
        _ => Err(ToolsCallResult::error(format!("Unknown tool: {}", name))),
    };
    outcome.unwrap_or_else(|e| e)
}

type ToolOutcome = Result<ToolsCallResult, ToolsCallResult>;

fn handle_find(graph: &CodeGraph, args: &Value) -> ToolOutcome {
    let query = required(args, "query")?;
    let kind: Option<NodeKind> = parsed(args, "kind")?;
    let exact = args.get("exact").and_then(Value::as_bool).unwrap_or(false);
    let result = QueryEngine::new(graph).search(query, kind, str_arg(args, "file"), exact);
    Ok(ToolsCallResult::json(&result))
}

fn handle_path(graph: &CodeGraph, config: &ReachConfig, args: &Value) -> ToolOutcome {
    let from = required(args, "from")?;
    let to = required(args, "to")?;
    let answer = QueryEngine::new(graph).find_path_by_name(
        from,
        to,
        usize_arg(args, "max_depth", config.analysis.max_path_depth),
        usize_arg(args, "max_paths", config.analysis.max_paths),
    );
    Ok(answer_result(answer))
}

fn handle_dependencies(graph: &CodeGraph, config: &ReachConfig, args: &Value) -> ToolOutcome {
    let engine = QueryEngine::new(graph);
    let node_id = resolve(&engine, required(args, "name")?, None)?;
    let direction: Direction = parsed(args, "direction")?.unwrap_or(Direction::Both);
    let depth = usize_arg(args, "depth", config.analysis.dependency_depth);
    Ok(ToolsCallResult::json(
        &engine.find_dependencies(&node_id, direction, depth),
    ))
}

fn handle_usages(graph: &CodeGraph, args: &Value) -> ToolOutcome {
    let engine = QueryEngine::new(graph);
    let name = required(args, "name")?;
    let result = match str_arg(args, "mode").unwrap_or("usages") {
        "usages" => engine.find_usages(&resolve(&engine, name, None)?),
        "callers" => engine.find_callers(&resolve(&engine, name, Some(NodeKind::Function))?),
        "callees" => engine.find_callees(&resolve(&engine, name, Some(NodeKind::Function))?),
        other => {
            return Err(ToolsCallResult::error(format!(
                "Invalid mode '{}' (expected usages, callers, or callees)",
                other
            )))
        }
    };
    Ok(ToolsCallResult::json(&result))
}

fn handle_impact(graph: &CodeGraph, config: &ReachConfig, args: &Value) -> ToolOutcome {
    let node_id = resolve(&QueryEngine::new(graph), required(args, "name")?, None)?;
    let depth = usize_arg(args, "depth", config.analysis.impact_depth);
    Ok(ToolsCallResult::json(
        &DependencyAnalyzer::new(graph).analyze_impact(&node_id, depth),
    ))
}

fn handle_cycles(graph: &CodeGraph, config: &ReachConfig, args: &Value) -> ToolOutcome {
    let relationships = string_list(args, "relationships")
        .iter()
        .map(|s| Relationship::from_str(s).map_err(ToolsCallResult::error))
        .collect::<Result<Vec<_>, _>>()?;
    let max_cycles = usize_arg(args, "max_cycles", config.analysis.max_cycles);
    Ok(ToolsCallResult::json(
        &DependencyAnalyzer::new(graph).detect_circular_dependencies(&relationships, max_cycles),
    ))
}

fn handle_dead_code(graph: &CodeGraph, config: &ReachConfig, args: &Value) -> ToolOutcome {
    let patterns = match args.get("entry_points") {
        Some(_) => string_list(args, "entry_points"),
        None => config.analysis.entry_point_patterns.clone(),
    };
    let entries =
        PatternSet::new(&patterns).map_err(|e| ToolsCallResult::error(e.to_string()))?;
    Ok(ToolsCallResult::json(
        &DependencyAnalyzer::new(graph).detect_dead_code(&entries),
    ))
}

fn handle_trace_execution(graph: &CodeGraph, config: &ReachConfig, args: &Value) -> ToolOutcome {
    let from = required(args, "from")?;
    let to = required(args, "to")?;
    let max_depth = usize_arg(args, "max_depth", config.analysis.max_path_depth);
    Ok(ToolsCallResult::json(
        &FlowTracer::new(graph).trace_execution_path(from, to, max_depth),
    ))
}

// ─── Argument Helpers ───────────────────────────────────────────

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn required<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolsCallResult> {
    str_arg(args, key)
        .ok_or_else(|| ToolsCallResult::error(format!("Missing required parameter: {}", key)))
}

fn usize_arg(args: &Value, key: &str, default: usize) -> usize {
    args.get(key)
        .and_then(Value::as_u64)
        .map_or(default, |v| v as usize)
}

fn parsed<T: FromStr<Err = String>>(args: &Value, key: &str) -> Result<Option<T>, ToolsCallResult> {
    str_arg(args, key)
        .map(|s| s.parse::<T>().map_err(ToolsCallResult::error))
        .transpose()
}

fn string_list(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn resolve(
    engine: &QueryEngine<'_>,
    name: &str,
    kind: Option<NodeKind>,
) -> Result<String, ToolsCallResult> {
    engine
        .resolve(name, kind)
        .map(|node| node.id.clone())
        .ok_or_else(|| ToolsCallResult::error(format!("No node named '{}'", name)))
}

fn answer_result(answer: QueryAnswer) -> ToolsCallResult {
    match answer {
        QueryAnswer::NotFound { message } => ToolsCallResult::error(message),
        other => ToolsCallResult::json(&other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};

    fn graph() -> CodeGraph {
        let mut g = CodeGraph::new();
        g.add_node(Node::new("f1", NodeKind::Function, "shoot", "gun.gd", 3, "gdscript"));
        g.add_node(Node::new("f2", NodeKind::Function, "spawn", "gun.gd", 9, "gdscript"));
        g.add_node(Node::new("s1", NodeKind::Signal, "fired", "gun.gd", 1, "gdscript"));
        g.add_edge(Edge::new("f1", "f2", Relationship::Calls));
        g.add_edge(Edge::new("f2", "f1", Relationship::Calls));
        g.add_edge(Edge::new("f1", "s1", Relationship::Emits));
        g
    }

    fn call(g: &CodeGraph, name: &str, args: Value) -> ToolsCallResult {
        call_tool(g, &ReachConfig::default(), name, &args)
    }

    fn body(result: &ToolsCallResult) -> Value {
        serde_json::from_str(result.first_text()).unwrap()
    }

    #[test]
    fn test_every_listed_tool_dispatches() {
        let g = graph();
        for tool in list_tools() {
            let result = call(&g, tool.name, json!({"name": "shoot", "query": "shoot", "from": "shoot", "to": "spawn"}));
            assert!(result.is_error.is_none(), "{} failed: {}", tool.name, result.first_text());
        }
    }

    #[test]
    fn test_find_and_path() {
        let g = graph();
        let found = body(&call(&g, "reach_find", json!({"query": "sp", "kind": "function"})));
        assert_eq!(found["total_count"], json!(1));

        let path = body(&call(&g, "reach_path", json!({"from": "shoot", "to": "spawn"})));
        assert_eq!(path["type"], json!("path"));
        assert_eq!(path["total_paths"], json!(1));
    }

    #[test]
    fn test_usages_modes_and_cycles() {
        let g = graph();
        let callers = body(&call(&g, "reach_usages", json!({"name": "spawn", "mode": "callers"})));
        assert_eq!(callers["usages"][0]["node"]["name"], json!("shoot"));

        let cycles = body(&call(&g, "reach_cycles", json!({"relationships": ["calls"]})));
        assert_eq!(cycles["total_cycles"], json!(1));
    }

    #[test]
    fn test_argument_errors() {
        let g = graph();
        assert_eq!(call(&g, "reach_find", json!({})).is_error, Some(true));
        assert_eq!(call(&g, "reach_find", json!({"query": "x", "kind": "widget"})).is_error, Some(true));
        assert_eq!(call(&g, "reach_impact", json!({"name": "nothing"})).is_error, Some(true));
        assert_eq!(call(&g, "reach_cycles", json!({"relationships": ["bogus"]})).is_error, Some(true));
        assert_eq!(call(&g, "reach_usages", json!({"name": "shoot", "mode": "x"})).is_error, Some(true));
        assert_eq!(call(&g, "reach_unknown", json!({})).is_error, Some(true));
    }
}
