//! Human-readable rendering of query results.
//!
//! Each result type gets a `Display` impl; the helpers here are shared with
//! the analysis and flow renderers.

use std::fmt;

use super::types::*;
use crate::graph::Confidence;
use crate::parser::truncate;

/// Paths printed before the "... and N more" note.
pub const MAX_SHOWN_PATHS: usize = 5;
/// Per-group entries printed before the "... and N more" note.
pub const MAX_SHOWN_ENTRIES: usize = 10;

/// `kind: name @ file:line`
pub fn node_line(node: &NodeRef) -> String {
    format!(
        "{}: {} @ {}:{}",
        node.kind, node.name, node.file_path, node.line_number
    )
}

/// Writes `... and N more {what}` when `total > shown`.
pub fn write_more(
    f: &mut fmt::Formatter<'_>,
    indent: &str,
    shown: usize,
    total: usize,
    what: &str,
) -> fmt::Result {
    if total > shown {
        let what = if what.is_empty() { String::new() } else { format!(" {}", what) };
        writeln!(f, "{}... and {} more{}", indent, total - shown, what)?;
    }
    Ok(())
}

/// A path as an indented step list.
pub fn write_path(f: &mut fmt::Formatter<'_>, index: usize, path: &GraphPath) -> fmt::Result {
    writeln!(f, "=== Path {} ({} hops) ===", index, path.length)?;
    for (i, step) in path.steps.iter().enumerate() {
        if i == 0 {
            writeln!(f, "[1] {}", node_line(&step.node))?;
        } else {
            writeln!(f, "    └─ {}", node_line(&step.node))?;
        }
        if let Some(rel) = step.relationship {
            let weak = match step.edge_confidence {
                Some(c) if c != Confidence::High => format!(" ({})", c),
                _ => String::new(),
            };
            writeln!(f, "       --{}{}-->", rel, weak)?;
        }
    }
    Ok(())
}

impl fmt::Display for PathResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.found {
            return writeln!(f, "No path found from {} to {}", self.source, self.target);
        }
        let src = self
            .paths
            .first()
            .and_then(|p| p.steps.first())
            .map_or(self.source.as_str(), |s| s.node.name.as_str());
        let tgt = self
            .paths
            .first()
            .and_then(|p| p.steps.last())
            .map_or(self.target.as_str(), |s| s.node.name.as_str());

        writeln!(f, "PATH FOUND: {} → {}", src, tgt)?;
        writeln!(
            f,
            "Total paths: {}, Shortest: {} hops",
            self.total_paths,
            self.shortest_length.unwrap_or(0)
        )?;
        writeln!(f, "Confidence: {}", self.confidence)?;

        let shown = self.paths.len().min(MAX_SHOWN_PATHS);
        for (i, path) in self.paths.iter().take(shown).enumerate() {
            writeln!(f)?;
            write_path(f, i + 1, path)?;
        }
        write_more(f, "\n", shown, self.total_paths, "paths")
    }
}

impl fmt::Display for DependencyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.found {
            return writeln!(f, "Node not found: {}", self.node_id);
        }
        writeln!(
            f,
            "DEPENDENCIES: {}",
            self.node_name.as_deref().unwrap_or(&self.node_id)
        )?;
        writeln!(f, "Direction: {}", self.direction)?;
        writeln!(f, "Depth: {}, Total: {}", self.depth, self.total_count)?;

        let max_depth = self.dependencies.iter().map(|d| d.depth).max().unwrap_or(0);
        for level in 1..=max_depth {
            let at_level: Vec<&Dependency> =
                self.dependencies.iter().filter(|d| d.depth == level).collect();
            writeln!(f, "\n--- Depth {} ---", level)?;
            for dep in at_level.iter().take(MAX_SHOWN_ENTRIES) {
                let arrow = match dep.direction {
                    Direction::Backward => "<-",
                    _ => "->",
                };
                writeln!(f, "  {} [{}] {}", arrow, dep.relationship, node_line(&dep.node))?;
            }
            write_more(f, "  ", at_level.len().min(MAX_SHOWN_ENTRIES), at_level.len(), "")?;
        }
        Ok(())
    }
}

impl fmt::Display for UsageResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.found {
            return writeln!(f, "Node not found: {}", self.node_id);
        }
        let label = match (self.relationship_filter, self.direction) {
            (Some(_), Direction::Forward) => "CALLEES OF",
            (Some(_), _) => "CALLERS OF",
            (None, Direction::Forward) => "OUTGOING FROM",
            (None, _) => "USAGES OF",
        };
        let kind = self.node_kind.map(|k| k.as_str()).unwrap_or("node");
        writeln!(
            f,
            "{}: {} '{}'",
            label,
            kind,
            self.node_name.as_deref().unwrap_or(&self.node_id)
        )?;
        writeln!(f, "Total usages: {}", self.total_count)?;

        // group by relationship, first-seen order
        let mut groups: Vec<(String, Vec<&Usage>)> = Vec::new();
        for usage in &self.usages {
            let rel = usage.relationship.to_string();
            match groups.iter_mut().find(|(r, _)| *r == rel) {
                Some((_, list)) => list.push(usage),
                None => groups.push((rel, vec![usage])),
            }
        }

        for (rel, usages) in &groups {
            writeln!(f, "\n--- {} ({}) ---", rel, usages.len())?;
            for usage in usages.iter().take(MAX_SHOWN_ENTRIES) {
                write!(f, "  {}", node_line(&usage.node))?;
                if usage.confidence != Confidence::High {
                    write!(f, " [{}]", usage.confidence)?;
                }
                writeln!(f)?;
                if !usage.context.is_empty() {
                    writeln!(f, "    Context: {}", truncate(usage.context.trim(), 60))?;
                }
            }
            write_more(f, "  ", usages.len().min(MAX_SHOWN_ENTRIES), usages.len(), "")?;
        }
        Ok(())
    }
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.matches.is_empty() {
            return writeln!(f, "No matches for '{}'", self.query);
        }
        writeln!(f, "Found {} match(es) for '{}':", self.total_count, self.query)?;
        for node in &self.matches {
            writeln!(f, "  {}", node_line(node))?;
            writeln!(f, "    id: {}", node.id)?;
        }
        Ok(())
    }
}

impl fmt::Display for NodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(node) = &self.node else {
            return writeln!(f, "Node not found: {}", self.node_id);
        };
        writeln!(f, "{}: {}", node.kind, node.name)?;
        writeln!(f, "  id:         {}", node.id)?;
        writeln!(f, "  location:   {}:{}", node.file_path, node.line_number)?;
        writeln!(f, "  confidence: {}", node.confidence)?;
        for (key, value) in &node.metadata {
            writeln!(f, "  {}: {}", key, value)?;
        }
        if !node.code_snippet.is_empty() {
            writeln!(f, "\n{}", node.code_snippet)?;
        }

        writeln!(f, "\nIncoming ({}):", self.incoming.len())?;
        for usage in &self.incoming {
            writeln!(f, "  <- [{}] {}", usage.relationship, node_line(&usage.node))?;
        }
        writeln!(f, "Outgoing ({}):", self.outgoing.len())?;
        for usage in &self.outgoing {
            writeln!(f, "  -> [{}] {}", usage.relationship, node_line(&usage.node))?;
        }
        Ok(())
    }
}
