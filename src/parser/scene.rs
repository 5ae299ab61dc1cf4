//! Scene (`.tscn`) extractor.
//!
//! Collects the header, external resources, the node tree, and signal
//! connections in one pass, then emits graph nodes for each.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

use super::{last_segment, node_id, normalize_path, Extractor, SourceLanguage};
use crate::graph::types::*;

fn pattern(src: &str) -> Regex {
    Regex::new(src).expect("static scene pattern must compile")
}

static HEADER: Lazy<Regex> = Lazy::new(|| {
    pattern(r#"^\[gd_scene(?:\s+load_steps=(\d+))?\s+format=(\d+)(?:\s+uid="([^"]+)")?\]"#)
});
static EXT_RESOURCE: Lazy<Regex> = Lazy::new(|| {
    pattern(r#"^\[ext_resource\s+type="([^"]+)"(?:\s+uid="([^"]+)")?\s+path="([^"]+)"\s+id="([^"]+)"\]"#)
});
static EXT_RESOURCE_ALT: Lazy<Regex> = Lazy::new(|| {
    pattern(r#"^\[ext_resource\s+path="([^"]+)"\s+type="([^"]+)"\s+id="([^"]+)"\]"#)
});
static NODE: Lazy<Regex> = Lazy::new(|| {
    pattern(r#"^\[node\s+name="([^"]+)"\s+type="([^"]+)"(?:\s+parent="([^"]*)")?[^\]]*\]"#)
});
static NODE_INSTANCE: Lazy<Regex> = Lazy::new(|| {
    pattern(r#"^\[node\s+name="([^"]+)"(?:\s+parent="([^"]*)")?\s+instance=ExtResource\(\s*"([^"]+)"\s*\)[^\]]*\]"#)
});
static NODE_INSTANCE_ALT: Lazy<Regex> = Lazy::new(|| {
    pattern(r#"^\[node\s+name="([^"]+)"\s+instance=ExtResource\(\s*"([^"]+)"\s*\)(?:\s+parent="([^"]*)")?[^\]]*\]"#)
});
static SCRIPT_ATTACH: Lazy<Regex> =
    Lazy::new(|| pattern(r#"script\s*=\s*ExtResource\(\s*"([^"]+)"\s*\)"#));
static CONNECTION: Lazy<Regex> = Lazy::new(|| {
    pattern(r#"^\[connection\s+signal="([^"]+)"\s+from="([^"]+)"\s+to="([^"]+)"\s+method="([^"]+)"(?:\s+flags=(\d+))?[^\]]*\]"#)
});
static PROPERTY: Lazy<Regex> = Lazy::new(|| pattern(r"^(\w+)\s*=\s*(.+)$"));

const LANG: &str = "scene";

/// Extractor for `.tscn` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneExtractor;

#[derive(Debug, Clone)]
struct ExtResource {
    id: String,
    kind: String,
    path: String,
    uid: Option<String>,
}

#[derive(Debug, Clone)]
struct TreeNode {
    name: String,
    node_type: String,
    parent: Option<String>,
    instance: Option<String>,
    script: Option<String>,
    properties: Map<String, Value>,
    line: usize,
}

impl TreeNode {
    fn new(name: &str, node_type: &str, parent: Option<&str>, line: usize) -> Self {
        Self {
            name: name.to_string(),
            node_type: node_type.to_string(),
            parent: parent.filter(|p| !p.is_empty()).map(str::to_string),
            instance: None,
            script: None,
            properties: Map::new(),
            line,
        }
    }
}

impl Extractor for SceneExtractor {
    fn language(&self) -> SourceLanguage {
        SourceLanguage::Scene
    }

    fn extract(&self, content: &str, file_path: &Path) -> FileExtraction {
        let path = normalize_path(file_path);
        let lines: Vec<&str> = content.lines().collect();
        let mut out = FileExtraction::new(path.as_str());

        let stem = file_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        let mut scene = Node::new(
            node_id(NodeKind::Scene, &path, &stem, 1),
            NodeKind::Scene,
            stem.as_str(),
            path.as_str(),
            1,
            LANG,
        )
        .with_snippet(lines.first().copied().unwrap_or(""))
        .with_meta("scene_path", path.as_str())
        .with_meta("godot_path", format!("res://{}", path));
        let scene_id = scene.id.clone();

        let mut resources: Vec<ExtResource> = Vec::new();
        let mut tree: Vec<TreeNode> = Vec::new();
        let mut in_node = false;

        for (idx, line) in lines.iter().enumerate() {
            let n = idx + 1;
            let stripped = line.trim();
            if stripped.is_empty() {
                continue;
            }

            if stripped.starts_with('[') {
                in_node = false;

                if let Some(c) = HEADER.captures(stripped) {
                    let load_steps = c.get(1).and_then(|m| m.as_str().parse::<u64>().ok());
                    let format = c[2].parse::<u64>().ok();
                    let uid = c.get(3).map(|m| m.as_str().to_string());
                    scene = scene
                        .with_meta("uid", uid)
                        .with_meta("load_steps", load_steps)
                        .with_meta("format", format);
                } else if let Some(c) = EXT_RESOURCE.captures(stripped) {
                    resources.push(ExtResource {
                        kind: c[1].to_string(),
                        uid: c.get(2).map(|m| m.as_str().to_string()),
                        path: c[3].to_string(),
                        id: c[4].to_string(),
                    });
                } else if let Some(c) = EXT_RESOURCE_ALT.captures(stripped) {
                    resources.push(ExtResource {
                        path: c[1].to_string(),
                        kind: c[2].to_string(),
                        id: c[3].to_string(),
                        uid: None,
                    });
                } else if let Some(c) = NODE.captures(stripped) {
                    tree.push(TreeNode::new(&c[1], &c[2], c.get(3).map(|m| m.as_str()), n));
                    in_node = true;
                } else if let Some(c) = NODE_INSTANCE.captures(stripped) {
                    let mut node = TreeNode::new(&c[1], "(instance)", c.get(2).map(|m| m.as_str()), n);
                    node.instance = Some(c[3].to_string());
                    tree.push(node);
                    in_node = true;
                } else if let Some(c) = NODE_INSTANCE_ALT.captures(stripped) {
                    let mut node = TreeNode::new(&c[1], "(instance)", c.get(3).map(|m| m.as_str()), n);
                    node.instance = Some(c[2].to_string());
                    tree.push(node);
                    in_node = true;
                } else if let Some(c) = CONNECTION.captures(stripped) {
                    let conn = connection_node(&path, &c, stripped, n);
                    out.edges.push(
                        Edge::new(scene_id.as_str(), conn.id.as_str(), Relationship::Contains)
                            .with_context(format!("Scene connection at line {}", n)),
                    );
                    out.nodes.push(conn);
                }
                continue;
            }

            if !in_node {
                continue;
            }
            if let Some(current) = tree.last_mut() {
                if let Some(c) = SCRIPT_ATTACH.captures(stripped) {
                    current.script = Some(c[1].to_string());
                } else if let Some(c) = PROPERTY.captures(stripped) {
                    current
                        .properties
                        .insert(c[1].to_string(), Value::String(c[2].to_string()));
                }
            }
        }

        let by_id: HashMap<&str, &ExtResource> =
            resources.iter().map(|r| (r.id.as_str(), r)).collect();

        for node in &tree {
            emit_tree_node(&mut out, &path, &scene_id, node, &by_id);
        }

        for res in resources.iter().filter(|r| r.kind != "Script") {
            let id_name = format!("ext_{}_{}", res.id, res.path.replace('/', "_"));
            let node = Node::new(
                node_id(NodeKind::Resource, &path, &id_name, 1),
                NodeKind::Resource,
                last_segment(&res.path),
                path.as_str(),
                1,
                LANG,
            )
            .with_meta("resource_path", res.path.as_str())
            .with_meta("resource_type", res.kind.as_str())
            .with_meta("ext_resource_id", res.id.as_str())
            .with_meta("uid", res.uid.clone());
            out.edges.push(
                Edge::new(scene_id.as_str(), node.id.as_str(), Relationship::References)
                    .with_context(format!("External resource: {}", res.kind)),
            );
            out.nodes.push(node);
        }

        out.nodes.insert(0, scene);
        out
    }
}

fn connection_node(path: &str, c: &regex::Captures<'_>, snippet: &str, n: usize) -> Node {
    let (signal, from, to, method) = (&c[1], &c[2], &c[3], &c[4]);
    let mut node = Node::new(
        node_id(
            NodeKind::SignalConnection,
            path,
            &format!("{}_{}_to_{}", from, signal, method),
            n,
        ),
        NodeKind::SignalConnection,
        format!("{}.{} -> {}.{}", from, signal, to, method),
        path,
        n,
        LANG,
    )
    .with_snippet(snippet)
    .with_meta(meta::SIGNAL, signal)
    .with_meta("from_node", from)
    .with_meta("to_node", to)
    .with_meta("method", method)
    .with_meta(meta::HANDLER, method)
    .with_meta(meta::DEFINED_IN_SCENE, true);
    if let Some(flags) = c.get(5).and_then(|m| m.as_str().parse::<u64>().ok()) {
        node = node.with_meta("flags", flags);
    }
    node
}

fn emit_tree_node(
    out: &mut FileExtraction,
    path: &str,
    scene_id: &str,
    node: &TreeNode,
    resources: &HashMap<&str, &ExtResource>,
) {
    let id = node_id(NodeKind::NodeReference, path, &node.name, node.line);

    let instanced = match node.instance.as_deref() {
        Some(res_id) => match resources.get(res_id) {
            Some(res) => Some(res.path.clone()),
            None => {
                out.warnings.push(format!(
                    "Unknown instance resource '{}' on node '{}' (line {})",
                    res_id, node.name, node.line
                ));
                None
            }
        },
        None => None,
    };

    out.nodes.push(
        Node::new(id.as_str(), NodeKind::NodeReference, node.name.as_str(), path, node.line, LANG)
            .with_snippet(format!("[node name=\"{}\" type=\"{}\"]", node.name, node.node_type))
            .with_meta("node_type", node.node_type.as_str())
            .with_meta("parent_path", node.parent.clone())
            .with_meta("is_instance", node.instance.is_some())
            .with_meta("instanced_scene", instanced.clone())
            .with_meta("properties", Value::Object(node.properties.clone())),
    );
    out.edges.push(
        Edge::new(scene_id, id.as_str(), Relationship::Contains).with_context("Node in scene tree"),
    );

    if let Some(script_id) = node.script.as_deref() {
        match resources.get(script_id) {
            Some(script) => {
                let script_node = Node::new(
                    node_id(NodeKind::Resource, path, &script.path.replace('/', "_"), node.line),
                    NodeKind::Resource,
                    last_segment(&script.path),
                    path,
                    node.line,
                    LANG,
                )
                .with_meta("resource_path", script.path.as_str())
                .with_meta("resource_type", "Script")
                .with_meta("attached_to_node", node.name.as_str());
                out.edges.push(
                    Edge::new(id.as_str(), script_node.id.as_str(), Relationship::AttachesTo)
                        .with_context(format!("Script attached to {}", node.name)),
                );
                out.nodes.push(script_node);
            }
            None => out.warnings.push(format!(
                "Unknown script resource '{}' on node '{}' (line {})",
                script_id, node.name, node.line
            )),
        }
    }

    if let Some(scene_path) = instanced {
        let inst = Node::new(
            node_id(NodeKind::Resource, path, &scene_path.replace('/', "_"), node.line),
            NodeKind::Resource,
            last_segment(&scene_path),
            path,
            node.line,
            LANG,
        )
        .with_meta("resource_path", scene_path.as_str())
        .with_meta("resource_type", "PackedScene")
        .with_meta("instanced_as", node.name.as_str());
        out.edges.push(
            Edge::new(scene_id, inst.id.as_str(), Relationship::Instantiates)
                .with_context(format!("Scene instances {}", scene_path)),
        );
        out.nodes.push(inst);
    }
}
