//! GDScript extractor.
//!
//! Two passes over the file: the first collects definitions (class, signals,
//! functions, class-level variables and constants), the second scans function
//! bodies for calls, emissions, connections, variable access, resource loads,
//! and node references. Everything is line and regex based.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::{
    code_snippet, last_segment, node_id, normalize_path, truncate, Extractor, SourceLanguage,
    LIFECYCLE_CALLBACKS,
};
use crate::graph::types::*;

fn pattern(src: &str) -> Regex {
    Regex::new(src).expect("static GDScript pattern must compile")
}

static CLASS_NAME: Lazy<Regex> = Lazy::new(|| pattern(r"^class_name\s+(\w+)"));
static EXTENDS: Lazy<Regex> = Lazy::new(|| pattern(r"^extends\s+(\w+)"));
static FUNC_DEF: Lazy<Regex> = Lazy::new(|| {
    pattern(r"^(\s*)(static\s+)?func\s+(\w+)\s*\(([^)]*)\)(?:\s*->\s*(\w+))?\s*:")
});
static SIGNAL_DEF: Lazy<Regex> =
    Lazy::new(|| pattern(r"^signal\s+(\w+)(?:\s*\(([^)]*)\))?"));

static EXPORT_VAR: Lazy<Regex> = Lazy::new(|| {
    pattern(r"^@export(?:_\w+)?(?:\([^)]*\))?\s+var\s+(\w+)(?:\s*:\s*(\w+))?(?:\s*:?=\s*(.+))?")
});
static ONREADY_VAR: Lazy<Regex> =
    Lazy::new(|| pattern(r"^@onready\s+var\s+(\w+)(?:\s*:\s*(\w+))?\s*:?=\s*(.+)"));
static VAR_DECL: Lazy<Regex> =
    Lazy::new(|| pattern(r"^var\s+(\w+)(?:\s*:\s*(\w+))?(?:\s*:?=\s*(.+))?"));
static CONST_DECL: Lazy<Regex> =
    Lazy::new(|| pattern(r"^const\s+(\w+)(?:\s*:\s*(\w+))?\s*:?=\s*(.+)"));

static EMIT_NEW: Lazy<Regex> = Lazy::new(|| pattern(r"(\w+)\.emit\s*\(([^)]*)\)"));
static EMIT_OLD: Lazy<Regex> =
    Lazy::new(|| pattern(r#"emit_signal\s*\(\s*["'](\w+)["'](?:\s*,\s*([^)]*))?\)"#));
static CONNECT_NEW: Lazy<Regex> = Lazy::new(|| pattern(r"(\w+)\.connect\s*\(\s*(\w+)"));

static PRELOAD: Lazy<Regex> =
    Lazy::new(|| pattern(r#"preload\s*\(\s*["']([^"']+)["']\s*\)"#));
static LOAD: Lazy<Regex> = Lazy::new(|| pattern(r#"\bload\s*\(\s*["']([^"']+)["']\s*\)"#));

static DOLLAR_PATH: Lazy<Regex> = Lazy::new(|| pattern(r"\$([A-Za-z0-9_/]+)"));
static GET_NODE: Lazy<Regex> =
    Lazy::new(|| pattern(r#"get_node\s*\(\s*["']([^"']+)["']\s*\)"#));
static GET_NODE_VAR: Lazy<Regex> = Lazy::new(|| pattern(r"get_node\s*\(\s*(\w+)\s*\)"));

static METHOD_CALL: Lazy<Regex> = Lazy::new(|| pattern(r"(\w+)\s*\("));
static DYNAMIC_CALL: Lazy<Regex> = Lazy::new(|| pattern(r#"\bcall\s*\(\s*["']?(\w+)"#));

/// Names that never produce a `Calls` edge.
static BUILTINS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    let common = [
        "print", "push_error", "push_warning", "str", "int", "float", "bool", "typeof", "len",
        "range", "abs", "min", "max", "clamp", "lerp", "get", "set", "has", "keys", "values",
        "append", "remove", "erase", "is_instance_valid", "is_instance_of", "await", "sin", "cos",
        "tan", "sqrt", "pow", "floor", "ceil", "round", "add_child", "remove_child",
        "get_parent", "get_children", "queue_free", "get_tree", "get_viewport",
    ];
    LIFECYCLE_CALLBACKS.iter().copied().chain(common).collect()
});

const LANG: &str = "gdscript";
const CONTEXT_LEN: usize = 60;

/// Extractor for `.gd` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct GdscriptExtractor;

impl Extractor for GdscriptExtractor {
    fn language(&self) -> SourceLanguage {
        SourceLanguage::Gdscript
    }

    fn extract(&self, content: &str, file_path: &Path) -> FileExtraction {
        let path = normalize_path(file_path);
        let mut scan = ScriptScan::new(&path, content);
        scan.collect_definitions();
        scan.collect_relationships();
        scan.out
    }
}

struct ClassVariable {
    name: String,
    id: String,
    write: Regex,
    word: Regex,
}

impl ClassVariable {
    fn new(name: &str, id: &str) -> Option<Self> {
        let escaped = regex::escape(name);
        Some(Self {
            name: name.to_string(),
            id: id.to_string(),
            write: Regex::new(&format!(r"\b{}\s*=", escaped)).ok()?,
            word: Regex::new(&format!(r"\b{}\b", escaped)).ok()?,
        })
    }
}

struct ScriptScan<'a> {
    path: &'a str,
    lines: Vec<&'a str>,
    out: FileExtraction,
    signals: HashMap<String, String>,
    functions: HashMap<String, String>,
    variables: Vec<ClassVariable>,
}

impl<'a> ScriptScan<'a> {
    fn new(path: &'a str, content: &'a str) -> Self {
        Self {
            path,
            lines: content.lines().collect(),
            out: FileExtraction::new(path),
            signals: HashMap::new(),
            functions: HashMap::new(),
            variables: Vec::new(),
        }
    }

    fn node(&self, kind: NodeKind, id_name: &str, name: &str, line: usize, context: usize) -> Node {
        Node::new(
            node_id(kind, self.path, id_name, line),
            kind,
            name,
            self.path,
            line,
            LANG,
        )
        .with_snippet(code_snippet(&self.lines, line, context))
    }

    // ─── Pass 1: definitions ────────────────────────────────────

    fn collect_definitions(&mut self) {
        let mut class: Option<(String, String, usize)> = None;
        let mut parent: Option<(String, usize)> = None;
        let mut in_function = false;

        for idx in 0..self.lines.len() {
            let line = self.lines[idx];
            let n = idx + 1;
            let stripped = line.trim();
            if stripped.is_empty() || stripped.starts_with('#') {
                continue;
            }
            if in_function && !is_indented(line) {
                in_function = false;
            }

            if let Some(c) = CLASS_NAME.captures(stripped) {
                let name = c[1].to_string();
                let node = self
                    .node(NodeKind::Class, &name, &name, n, 2)
                    .with_meta("is_class_name", true);
                class = Some((name, node.id.clone(), n));
                self.out.nodes.push(node);
                continue;
            }

            if let Some(c) = EXTENDS.captures(stripped) {
                parent = Some((c[1].to_string(), n));
                continue;
            }

            if let Some(c) = SIGNAL_DEF.captures(stripped) {
                let name = c[1].to_string();
                let params = parse_params(c.get(2).map_or("", |m| m.as_str()));
                let node = self
                    .node(NodeKind::Signal, &name, &name, n, 2)
                    .with_meta("params", params);
                self.signals.insert(name, node.id.clone());
                self.out.nodes.push(node);
                continue;
            }

            if let Some(c) = FUNC_DEF.captures(line) {
                let name = c[3].to_string();
                let params = parse_params(c.get(4).map_or("", |m| m.as_str()));
                let return_type = c.get(5).map(|m| m.as_str().to_string());
                let node = self
                    .node(NodeKind::Function, &name, &name, n, 5)
                    .with_meta("params", params)
                    .with_meta("return_type", return_type)
                    .with_meta("is_static", c.get(2).is_some())
                    .with_meta("is_private", name.starts_with('_'));
                self.functions.insert(name, node.id.clone());
                self.out.nodes.push(node);
                in_function = true;
                continue;
            }

            if in_function {
                continue;
            }

            if let Some(node) = self.constant_resource(stripped, n) {
                self.out.nodes.push(node);
                continue;
            }

            if let Some(node) = self.class_variable(line, stripped, n) {
                if let Some(var) = ClassVariable::new(&node.name, &node.id) {
                    self.variables.push(var);
                }
                self.out.nodes.push(node);
            }
        }

        if let (Some((class_name, class_id, _)), Some((parent_name, line))) = (class, parent) {
            self.out.pending.push(PendingEdge {
                source_id: class_id,
                target: SymbolKey::new(NodeKind::Class, parent_name.clone()),
                relationship: Relationship::Inherits,
                context: format!("{} extends {} (line {})", class_name, parent_name, line),
                confidence: Confidence::Medium,
            });
        }
    }

    fn constant_resource(&self, stripped: &str, n: usize) -> Option<Node> {
        let c = CONST_DECL.captures(stripped)?;
        let res = PRELOAD.captures(c.get(3)?.as_str())?;
        let name = &c[1];
        Some(
            self.node(NodeKind::Resource, name, name, n, 2)
                .with_meta("resource_path", &res[1])
                .with_meta("load_type", "preload")
                .with_meta("is_constant", true),
        )
    }

    fn class_variable(&self, line: &str, stripped: &str, n: usize) -> Option<Node> {
        let (c, exported, onready) = if let Some(c) = EXPORT_VAR.captures(stripped) {
            (c, true, false)
        } else if let Some(c) = ONREADY_VAR.captures(stripped) {
            (c, false, true)
        } else {
            (VAR_DECL.captures(stripped)?, false, false)
        };

        let name = &c[1];
        let var_type = c.get(2).map(|m| m.as_str().to_string());
        let initial = c.get(3).map(|m| m.as_str().trim());
        let scope = if is_indented(line) { "inner" } else { "class" };

        let mut node = self
            .node(NodeKind::Variable, name, name, n, 2)
            .with_meta("type", var_type)
            .with_meta("initial_value", initial.map(|v| truncate(v, 50)))
            .with_meta("scope", scope)
            .with_meta("is_exported", exported)
            .with_meta("is_onready", onready);

        if onready {
            if let Some(path) = initial.and_then(|v| DOLLAR_PATH.captures(v)) {
                node = node.with_meta("node_path", &path[1]);
            }
        }
        Some(node)
    }

    // ─── Pass 2: relationships inside function bodies ───────────

    fn collect_relationships(&mut self) {
        let mut current: Option<(String, String)> = None;

        for idx in 0..self.lines.len() {
            let line = self.lines[idx];
            let n = idx + 1;
            let stripped = line.trim();
            if stripped.is_empty() || stripped.starts_with('#') {
                continue;
            }

            if let Some(c) = FUNC_DEF.captures(line) {
                let name = c[3].to_string();
                let id = node_id(NodeKind::Function, self.path, &name, n);
                current = Some((name, id));
                continue;
            }
            if !is_indented(line) {
                current = None;
                continue;
            }
            if let Some((name, id)) = current.clone() {
                self.scan_body_line(&name, &id, stripped, n);
            }
        }
    }

    fn scan_body_line(&mut self, func_name: &str, func_id: &str, stripped: &str, n: usize) {
        let context = format!("line {}: {}", n, truncate(stripped, CONTEXT_LEN));

        for re in [&*EMIT_NEW, &*EMIT_OLD] {
            for c in re.captures_iter(stripped) {
                if let Some(signal_id) = self.signals.get(&c[1]) {
                    self.out.edges.push(
                        Edge::new(func_id, signal_id.as_str(), Relationship::Emits)
                            .with_context(context.clone()),
                    );
                }
            }
        }

        for c in CONNECT_NEW.captures_iter(stripped) {
            self.signal_connection(&c[1], &c[2], n);
        }

        for c in METHOD_CALL.captures_iter(stripped) {
            let called = &c[1];
            if BUILTINS.contains(called) || called == func_name {
                continue;
            }
            if let Some(target) = self.functions.get(called) {
                self.out.edges.push(
                    Edge::new(func_id, target.as_str(), Relationship::Calls)
                        .with_context(context.clone()),
                );
            }
        }

        let line_ctx = format!("line {}", n);
        for var in &self.variables {
            if !stripped.contains(&var.name) {
                continue;
            }
            let relationship = if var.write.is_match(stripped) && !stripped.contains("==") {
                Relationship::Writes
            } else if var.word.is_match(stripped) {
                Relationship::Reads
            } else {
                continue;
            };
            self.out.edges.push(
                Edge::new(func_id, var.id.as_str(), relationship)
                    .with_context(line_ctx.clone())
                    .with_confidence(Confidence::Medium),
            );
        }

        for (re, load_type) in [(&*PRELOAD, "preload"), (&*LOAD, "load")] {
            for c in re.captures_iter(stripped) {
                self.resource_reference(func_id, &c[1], load_type, n);
            }
        }

        for re in [&*DOLLAR_PATH, &*GET_NODE] {
            for c in re.captures_iter(stripped) {
                self.node_reference(func_id, &c[1], n);
            }
        }

        for c in DYNAMIC_CALL.captures_iter(stripped) {
            let method = &c[1];
            self.out
                .warnings
                .push(format!("Dynamic call at line {}: call(\"{}\")", n, method));
            let node = self
                .node(
                    NodeKind::Ambiguous,
                    &format!("dynamic_call_{}", method),
                    &format!("call(\"{}\")", method),
                    n,
                    2,
                )
                .with_meta("reason", "dynamic_method_call")
                .with_meta("method_name", method)
                .with_confidence(Confidence::Ambiguous);
            self.ambiguous(func_id, node, &context);
        }

        for c in GET_NODE_VAR.captures_iter(stripped) {
            let var = &c[1];
            self.out
                .warnings
                .push(format!("Variable node path at line {}: get_node({})", n, var));
            let node = self
                .node(
                    NodeKind::Ambiguous,
                    &format!("dynamic_node_{}", var),
                    &format!("get_node({})", var),
                    n,
                    2,
                )
                .with_meta("reason", "variable_node_path")
                .with_meta("variable", var)
                .with_confidence(Confidence::Ambiguous);
            self.ambiguous(func_id, node, &context);
        }
    }

    fn signal_connection(&mut self, signal: &str, handler: &str, n: usize) {
        let node = self
            .node(
                NodeKind::SignalConnection,
                &format!("{}_to_{}", signal, handler),
                &format!("{} -> {}", signal, handler),
                n,
                2,
            )
            .with_meta(meta::SIGNAL, signal)
            .with_meta(meta::HANDLER, handler);
        let conn_id = node.id.clone();
        self.out.nodes.push(node);

        let context = format!("line {}", n);
        if let Some(signal_id) = self.signals.get(signal) {
            self.out.edges.push(
                Edge::new(signal_id.as_str(), conn_id.as_str(), Relationship::ConnectsTo)
                    .with_context(context.clone()),
            );
        }
        if let Some(handler_id) = self.functions.get(handler) {
            self.out.edges.push(
                Edge::new(conn_id.as_str(), handler_id.as_str(), Relationship::ConnectsTo)
                    .with_context(context),
            );
        }
    }

    fn resource_reference(&mut self, source_id: &str, res_path: &str, load_type: &str, n: usize) {
        let mut node = self
            .node(
                NodeKind::Resource,
                &res_path.replace('/', "_"),
                last_segment(res_path),
                n,
                2,
            )
            .with_meta("resource_path", res_path)
            .with_meta("load_type", load_type);
        if let Some(project_path) = res_path.strip_prefix("res://") {
            node = node.with_meta("project_path", project_path);
        }
        let target = node.id.clone();
        self.out.nodes.push(node);
        self.out.edges.push(
            Edge::new(source_id, target, Relationship::References)
                .with_context(format!("{}(\"{}\") at line {}", load_type, res_path, n)),
        );
    }

    fn node_reference(&mut self, source_id: &str, node_path: &str, n: usize) {
        let node = self
            .node(
                NodeKind::NodeReference,
                &node_path.replace('/', "_"),
                last_segment(node_path),
                n,
                2,
            )
            .with_meta("node_path", node_path);
        let target = node.id.clone();
        self.out.nodes.push(node);
        self.out.edges.push(
            Edge::new(source_id, target, Relationship::References)
                .with_context(format!("${} at line {}", node_path, n)),
        );
    }

    /// Record an unresolvable dynamic target, linked with an ambiguous edge.
    fn ambiguous(&mut self, source_id: &str, node: Node, context: &str) {
        let target = node.id.clone();
        self.out.nodes.push(node);
        self.out.edges.push(
            Edge::new(source_id, target, Relationship::References)
                .with_context(context)
                .with_confidence(Confidence::Ambiguous),
        );
    }
}

fn is_indented(line: &str) -> bool {
    line.starts_with(|c: char| c.is_whitespace())
}

/// `a: int, b = 2` -> `[{"name": "a", "type": "int"}, {"name": "b", "type": null}]`
fn parse_params(params: &str) -> Value {
    let list: Vec<Value> = params
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let decl = p.split('=').next().unwrap_or(p).trim();
            match decl.split_once(':') {
                Some((name, ty)) => json!({ "name": name.trim(), "type": ty.trim() }),
                None => json!({ "name": decl, "type": Value::Null }),
            }
        })
        .collect();
    Value::Array(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYER: &str = r#"class_name Player
extends Actor

signal health_changed(new_value: int)
signal died

const Bullet = preload("res://scenes/bullet.tscn")

@export var speed: float = 200.0
@onready var sprite = $Sprite2D
var health: int = 100

func _ready():
	died.connect(_on_died)
	health_changed.emit(health)

func take_damage(amount: int) -> void:
	health -= amount
	health = health - amount
	if health == 0:
		die()

func die():
	emit_signal("died")
	var fx = load("res://fx/boom.tscn")
	$Anim/Player.play("die")
	call("cleanup")
	get_node(target_path)

func _on_died():
	print("dead")
"#;

    fn extract() -> FileExtraction {
        GdscriptExtractor.extract(PLAYER, Path::new("scripts/player.gd"))
    }

    fn find<'a>(ext: &'a FileExtraction, kind: NodeKind, name: &str) -> &'a Node {
        ext.nodes
            .iter()
            .find(|n| n.kind == kind && n.name == name)
            .unwrap_or_else(|| panic!("missing {:?} {}", kind, name))
    }

    fn has_edge(ext: &FileExtraction, from: &str, to: &str, rel: Relationship) -> bool {
        ext.edges
            .iter()
            .any(|e| e.source_id == from && e.target_id == to && e.relationship == rel)
    }

    #[test]
    fn test_definitions() {
        let ext = extract();
        let class = find(&ext, NodeKind::Class, "Player");
        assert_eq!(class.id, "class_scripts_player_gd_Player_1");
        assert!(class.meta_flag("is_class_name"));

        let take = find(&ext, NodeKind::Function, "take_damage");
        assert_eq!(take.line_number, 17);
        assert_eq!(take.metadata["return_type"], "void");
        assert_eq!(take.metadata["params"][0]["type"], "int");

        let speed = find(&ext, NodeKind::Variable, "speed");
        assert!(speed.meta_flag("is_exported"));
        let sprite = find(&ext, NodeKind::Variable, "sprite");
        assert_eq!(sprite.meta_str("node_path"), Some("Sprite2D"));

        let bullet = find(&ext, NodeKind::Resource, "Bullet");
        assert!(bullet.meta_flag("is_constant"));

        let signal = find(&ext, NodeKind::Signal, "health_changed");
        assert_eq!(signal.metadata["params"][0]["name"], "new_value");
    }

    #[test]
    fn test_inheritance_is_pending() {
        let ext = extract();
        assert_eq!(ext.pending.len(), 1);
        let pending = &ext.pending[0];
        assert_eq!(pending.target, SymbolKey::new(NodeKind::Class, "Actor"));
        assert_eq!(pending.relationship, Relationship::Inherits);
        assert_eq!(pending.confidence, Confidence::Medium);
    }

    #[test]
    fn test_calls_emits_and_variable_access() {
        let ext = extract();
        let take = &find(&ext, NodeKind::Function, "take_damage").id;
        let die = &find(&ext, NodeKind::Function, "die").id;
        let ready = &find(&ext, NodeKind::Function, "_ready").id;
        let health = &find(&ext, NodeKind::Variable, "health").id;
        let died = &find(&ext, NodeKind::Signal, "died").id;
        let changed = &find(&ext, NodeKind::Signal, "health_changed").id;

        assert!(has_edge(&ext, take, die, Relationship::Calls));
        assert!(has_edge(&ext, die, died, Relationship::Emits));
        assert!(has_edge(&ext, ready, changed, Relationship::Emits));
        assert!(has_edge(&ext, take, health, Relationship::Writes));
        assert!(has_edge(&ext, take, health, Relationship::Reads));
        assert!(has_edge(&ext, ready, health, Relationship::Reads));
        // print() is builtin, play() is not a known function
        assert!(!ext
            .edges
            .iter()
            .any(|e| e.relationship == Relationship::Calls && e.source_id == *die));
    }

    #[test]
    fn test_signal_connection_links_signal_and_handler() {
        let ext = extract();
        let conn = find(&ext, NodeKind::SignalConnection, "died -> _on_died");
        assert_eq!(conn.meta_str(meta::SIGNAL), Some("died"));
        assert_eq!(conn.meta_str(meta::HANDLER), Some("_on_died"));

        let died = &find(&ext, NodeKind::Signal, "died").id;
        let handler = &find(&ext, NodeKind::Function, "_on_died").id;
        assert!(has_edge(&ext, died, &conn.id, Relationship::ConnectsTo));
        assert!(has_edge(&ext, &conn.id, handler, Relationship::ConnectsTo));
    }

    #[test]
    fn test_resources_node_refs_and_ambiguity() {
        let ext = extract();
        let die = &find(&ext, NodeKind::Function, "die").id;

        let boom = find(&ext, NodeKind::Resource, "boom.tscn");
        assert_eq!(boom.meta_str("load_type"), Some("load"));
        assert!(has_edge(&ext, die, &boom.id, Relationship::References));

        let anim = find(&ext, NodeKind::NodeReference, "Player");
        assert_eq!(anim.meta_str("node_path"), Some("Anim/Player"));

        let dynamic = find(&ext, NodeKind::Ambiguous, "call(\"cleanup\")");
        assert_eq!(dynamic.confidence, Confidence::Ambiguous);
        find(&ext, NodeKind::Ambiguous, "get_node(target_path)");
        assert_eq!(ext.warnings.len(), 2);
        assert!(ext
            .edges
            .iter()
            .any(|e| e.target_id == dynamic.id && e.confidence == Confidence::Ambiguous));
    }

    #[test]
    fn test_ids_are_deterministic() {
        let a = extract();
        let b = extract();
        let ids = |e: &FileExtraction| e.nodes.iter().map(|n| n.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
        assert_eq!(a.edges, b.edges);
    }

    #[test]
    fn test_parse_params() {
        let params = parse_params("a: int, b = 2, ");
        assert_eq!(params.as_array().unwrap().len(), 2);
        assert_eq!(params[1]["name"], "b");
        assert!(params[1]["type"].is_null());
        assert_eq!(parse_params("  "), json!([]));
    }
}
