//! Natural-language query routing.
//!
//! Maps free text such as "what calls take_damage" onto one of the engine
//! queries. Names are resolved with `find_by_name`; when several nodes
//! match, the first few candidates are tried in order.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use super::engine::QueryEngine;
use super::types::*;
use crate::graph::{Node, NodeKind};

/// Candidates tried per name when a query needs a concrete node.
const MAX_CANDIDATES: usize = 3;
/// Depth used for "depends on" questions.
const INTENT_DEPENDENCY_DEPTH: usize = 3;

static PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:from|between)\s+["']?(\w+)["']?\s+(?:to|and)\s+["']?(\w+)"#)
        .expect("path intent regex")
});
static USED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)where\s+is\s+["']?([^'"]+?)["']?\s+used"#).expect("usage intent regex")
});
static CALLERS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)what\s+calls\s+["']?([^'"?]+)"#).expect("callers intent regex")
});
static CALLEES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)what\s+does\s+["']?([^'"]+?)["']?\s+call"#).expect("callees intent regex")
});
static DEPS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:dependencies\s+of|dependencies|depends\s+on)\s+["']?([^'"?]+)"#)
        .expect("dependency intent regex")
});

/// The answer to a free-text query.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryAnswer {
    Path(PathResult),
    Usages(UsageResult),
    Callers(UsageResult),
    Callees(UsageResult),
    Dependencies(DependencyResult),
    Search(SearchResult),
    NotFound { message: String },
}

impl fmt::Display for QueryAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryAnswer::Path(r) => fmt::Display::fmt(r, f),
            QueryAnswer::Usages(r) | QueryAnswer::Callers(r) | QueryAnswer::Callees(r) => {
                fmt::Display::fmt(r, f)
            }
            QueryAnswer::Dependencies(r) => fmt::Display::fmt(r, f),
            QueryAnswer::Search(r) => fmt::Display::fmt(r, f),
            QueryAnswer::NotFound { message } => writeln!(f, "{}", message),
        }
    }
}

impl<'g> QueryEngine<'g> {
    /// Route a free-text question to the matching query.
    pub fn answer(&self, text: &str, max_depth: usize, max_paths: usize) -> QueryAnswer {
        let text = text.trim();
        let lower = text.to_lowercase();

        if lower.contains("path") || lower.contains("from") || lower.contains("between") {
            if let Some(caps) = PATH_RE.captures(text) {
                return self.find_path_by_name(&caps[1], &caps[2], max_depth, max_paths);
            }
        }

        if let Some(caps) = USED_RE.captures(text) {
            let name = caps[1].trim();
            let candidates = self.candidates(name, None);
            if candidates.is_empty() {
                return not_found(name);
            }
            // the first candidate that is actually used, else the first one
            let usages = candidates
                .iter()
                .map(|node| self.find_usages(&node.id))
                .find(|r| r.total_count > 0)
                .unwrap_or_else(|| self.find_usages(&candidates[0].id));
            return QueryAnswer::Usages(usages);
        }

        if let Some(caps) = CALLERS_RE.captures(text) {
            let name = caps[1].trim();
            return match self.candidates(name, Some(NodeKind::Function)).first() {
                Some(node) => QueryAnswer::Callers(self.find_callers(&node.id)),
                None => not_found(name),
            };
        }

        if let Some(caps) = CALLEES_RE.captures(text) {
            let name = caps[1].trim();
            return match self.candidates(name, Some(NodeKind::Function)).first() {
                Some(node) => QueryAnswer::Callees(self.find_callees(&node.id)),
                None => not_found(name),
            };
        }

        if let Some(caps) = DEPS_RE.captures(text) {
            let name = caps[1].trim();
            return match self.candidates(name, None).first() {
                Some(node) => QueryAnswer::Dependencies(self.find_dependencies(
                    &node.id,
                    Direction::Both,
                    INTENT_DEPENDENCY_DEPTH,
                )),
                None => not_found(name),
            };
        }

        QueryAnswer::Search(self.search(text, None, None, false))
    }

    /// Path search between names: up to three candidates per side are
    /// tried in order and the first pair with a path wins.
    pub fn find_path_by_name(
        &self,
        from: &str,
        to: &str,
        max_depth: usize,
        max_paths: usize,
    ) -> QueryAnswer {
        let sources = self.candidates(from, None);
        let targets = self.candidates(to, None);
        if sources.is_empty() {
            return not_found(from);
        }
        if targets.is_empty() {
            return not_found(to);
        }

        for source in &sources {
            for target in &targets {
                let result = self.find_path(&source.id, &target.id, max_depth, max_paths);
                if result.found {
                    return QueryAnswer::Path(result);
                }
            }
        }
        QueryAnswer::NotFound {
            message: format!("No path found between '{}' and '{}'", from, to),
        }
    }

    /// A node with this exact id, else exact name matches, else substring
    /// matches, capped.
    fn candidates(&self, name: &str, kind: Option<NodeKind>) -> Vec<&'g Node> {
        if let Some(node) = self.graph().get_node(name) {
            if kind.map_or(true, |k| node.kind == k) {
                return vec![node];
            }
        }
        let mut found = self.find_by_name(name, kind, None, true);
        if found.is_empty() {
            found = self.find_by_name(name, kind, None, false);
        }
        found.truncate(MAX_CANDIDATES);
        found
    }
}

fn not_found(name: &str) -> QueryAnswer {
    QueryAnswer::NotFound {
        message: format!("No node named '{}'", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CodeGraph, Edge, Relationship};

    fn graph() -> CodeGraph {
        let mut g = CodeGraph::new();
        for (id, name) in [("f1", "fire"), ("f2", "spawn_bullet"), ("f3", "reload")] {
            g.add_node(Node::new(id, NodeKind::Function, name, "gun.gd", 1, "gdscript"));
        }
        g.add_node(Node::new("v1", NodeKind::Variable, "ammo", "gun.gd", 1, "gdscript"));
        g.add_edge(Edge::new("f1", "f2", Relationship::Calls));
        g.add_edge(Edge::new("f1", "v1", Relationship::Reads));
        g.add_edge(Edge::new("f3", "v1", Relationship::Writes));
        g
    }

    #[test]
    fn test_path_intent() {
        let g = graph();
        let answer = QueryEngine::new(&g).answer("path from fire to spawn_bullet", 10, 10);
        match answer {
            QueryAnswer::Path(r) => assert_eq!(r.total_paths, 1),
            other => panic!("unexpected answer: {:?}", other),
        }
    }

    #[test]
    fn test_usage_and_call_intents() {
        let g = graph();
        let q = QueryEngine::new(&g);

        match q.answer("where is ammo used?", 10, 10) {
            QueryAnswer::Usages(r) => assert_eq!(r.total_count, 2),
            other => panic!("unexpected answer: {:?}", other),
        }
        match q.answer("what calls spawn_bullet?", 10, 10) {
            QueryAnswer::Callers(r) => assert_eq!(r.usages[0].node.name, "fire"),
            other => panic!("unexpected answer: {:?}", other),
        }
        match q.answer("what does fire call", 10, 10) {
            QueryAnswer::Callees(r) => assert_eq!(r.total_count, 1),
            other => panic!("unexpected answer: {:?}", other),
        }
    }

    #[test]
    fn test_dependency_intent_and_fallback_search() {
        let g = graph();
        let q = QueryEngine::new(&g);

        match q.answer("dependencies of reload", 10, 10) {
            QueryAnswer::Dependencies(r) => {
                let names: Vec<_> = r.dependencies.iter().map(|d| d.node.name.as_str()).collect();
                assert_eq!(names, vec!["ammo", "fire", "spawn_bullet"]);
            }
            other => panic!("unexpected answer: {:?}", other),
        }
        assert!(matches!(q.answer("bullet", 10, 10), QueryAnswer::Search(r) if r.total_count == 1));
        assert!(matches!(
            q.answer("what calls nothing_here", 10, 10),
            QueryAnswer::NotFound { .. }
        ));
    }
}
