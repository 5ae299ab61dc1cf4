//! MCP JSON-RPC 2.0 server: reads requests from stdin, writes responses to stdout.
//!
//! The MCP protocol uses newline-delimited JSON over STDIO.
//! Tracing output goes to stderr so it doesn't interfere with the protocol.

use std::io::{self, BufRead, Write};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::tools;
use super::types::*;
use crate::config::ReachConfig;
use crate::graph::CodeGraph;

/// Run the MCP server on stdin/stdout until stdin closes.
pub fn run(graph: Arc<RwLock<CodeGraph>>, config: ReachConfig) -> io::Result<()> {
    info!("MCP server starting");
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(&graph, &config, stdin.lock(), stdout.lock())?;
    info!("MCP server shutting down");
    Ok(())
}

/// Serve newline-delimited requests from `input`, one response line per
/// request on `output`. Notifications produce no output.
pub fn serve<R: BufRead, W: Write>(
    graph: &RwLock<CodeGraph>,
    config: &ReachConfig,
    input: R,
    mut output: W,
) -> io::Result<()> {
    for line in input.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "failed to read request stream");
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        debug!(request = %trimmed, "received request");

        let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
            Ok(request) => handle_request(graph, config, &request),
            Err(e) => {
                warn!(error = %e, "invalid JSON-RPC request");
                Some(JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
            }
        };

        if let Some(resp) = response {
            write_response(&mut output, &resp)?;
        }
    }
    Ok(())
}

/// Handle a single request; `None` for notifications.
fn handle_request(
    graph: &RwLock<CodeGraph>,
    config: &ReachConfig,
    request: &JsonRpcRequest,
) -> Option<JsonRpcResponse> {
    let id = request.id.clone();

    match request.method.as_str() {
        "initialize" => {
            info!("client initializing");
            let result = InitializeResult {
                protocol_version: PROTOCOL_VERSION,
                capabilities: ServerCapabilities {
                    tools: ToolCapability {},
                },
                server_info: ServerInfo {
                    name: "reach",
                    version: env!("CARGO_PKG_VERSION"),
                },
            };
            Some(JsonRpcResponse::from_serializable(id, &result))
        }

        method if method.starts_with("notifications/") => {
            debug!(method, "notification");
            None
        }

        "tools/list" => Some(JsonRpcResponse::from_serializable(
            id,
            &ToolsListResult {
                tools: tools::list_tools(),
            },
        )),

        "tools/call" => {
            let params: ToolsCallParams = match serde_json::from_value(request.params.clone()) {
                Ok(p) => p,
                Err(e) => {
                    return Some(JsonRpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        format!("Invalid params: {}", e),
                    ));
                }
            };
            debug!(tool = %params.name, "calling tool");

            let guard = match graph.read() {
                Ok(g) => g,
                Err(e) => {
                    return Some(JsonRpcResponse::error(
                        id,
                        INTERNAL_ERROR,
                        format!("Graph lock error: {}", e),
                    ));
                }
            };
            let result = tools::call_tool(&guard, config, &params.name, &params.arguments);
            Some(JsonRpcResponse::from_serializable(id, &result))
        }

        "ping" => Some(JsonRpcResponse::success(id, Value::Object(Default::default()))),

        _ => {
            warn!(method = %request.method, "unknown method");
            // requests without an id are notifications; never answer those
            id.as_ref()?;
            Some(JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ))
        }
    }
}

fn write_response(output: &mut impl Write, response: &JsonRpcResponse) -> io::Result<()> {
    let json = serde_json::to_string(response)?;
    debug!(response = %json, "sending response");
    writeln!(output, "{}", json)?;
    output.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node, NodeKind, Relationship};

    fn exchange(input: &str) -> Vec<Value> {
        let mut g = CodeGraph::new();
        g.add_node(Node::new("a", NodeKind::Function, "jump", "p.gd", 1, "gdscript"));
        g.add_node(Node::new("b", NodeKind::Function, "land", "p.gd", 5, "gdscript"));
        g.add_edge(Edge::new("a", "b", Relationship::Calls));
        let graph = RwLock::new(g);

        let mut out = Vec::new();
        serve(&graph, &ReachConfig::default(), input.as_bytes(), &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_handshake_and_tool_listing() {
        let replies = exchange(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\",\"params\":{}}\n\
             {\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n\
             \n\
             {\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/list\"}\n",
        );
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["result"]["serverInfo"]["name"], "reach");
        assert_eq!(replies[0]["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(replies[1]["id"], 2);
        assert_eq!(replies[1]["result"]["tools"].as_array().unwrap().len(), 12);
    }

    #[test]
    fn test_tool_call_reads_graph() {
        let replies = exchange(
            "{\"jsonrpc\":\"2.0\",\"id\":\"x\",\"method\":\"tools/call\",\
             \"params\":{\"name\":\"reach_usages\",\"arguments\":{\"name\":\"land\",\"mode\":\"callers\"}}}\n",
        );
        let text = replies[0]["result"]["content"][0]["text"].as_str().unwrap();
        let body: Value = serde_json::from_str(text).unwrap();
        assert_eq!(body["total_count"], 1);
        assert_eq!(body["usages"][0]["node"]["name"], "jump");
    }

    #[test]
    fn test_protocol_errors() {
        let replies = exchange(
            "not json\n\
             {\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"bogus\"}\n\
             {\"jsonrpc\":\"2.0\",\"method\":\"bogus\"}\n\
             {\"jsonrpc\":\"2.0\",\"id\":4,\"method\":\"tools/call\",\"params\":{}}\n\
             {\"jsonrpc\":\"2.0\",\"id\":5,\"method\":\"ping\"}\n",
        );
        assert_eq!(replies.len(), 4);
        assert_eq!(replies[0]["error"]["code"], PARSE_ERROR);
        assert_eq!(replies[1]["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(replies[2]["error"]["code"], INVALID_PARAMS);
        assert_eq!(replies[3]["result"], serde_json::json!({}));
    }
}
