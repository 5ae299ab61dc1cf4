//! Pattern-based extractors for scripts and scenes.
//!
//! Each extractor turns one file's text into a [`FileExtraction`]. Extractors
//! never touch the filesystem; the builder reads files and passes contents in.

pub mod gdscript;
pub mod language;
pub mod scene;

use std::path::Path;

use crate::error::{ReachError, Result};
use crate::graph::types::{FileExtraction, NodeKind};

pub use gdscript::GdscriptExtractor;
pub use language::SourceLanguage;
pub use scene::SceneExtractor;

/// Callbacks the engine runtime invokes without a visible caller.
pub const LIFECYCLE_CALLBACKS: &[&str] = &[
    "_ready",
    "_process",
    "_physics_process",
    "_input",
    "_unhandled_input",
    "_notification",
    "_init",
    "_enter_tree",
    "_exit_tree",
];

pub fn is_lifecycle_callback(name: &str) -> bool {
    LIFECYCLE_CALLBACKS.contains(&name)
}

/// One extractor per source format.
pub trait Extractor {
    fn language(&self) -> SourceLanguage;

    /// Extract nodes and edges from `content`. `file_path` is the
    /// project-relative path recorded on every node.
    fn extract(&self, content: &str, file_path: &Path) -> FileExtraction;
}

/// Pick the extractor for a path by extension.
pub fn extractor_for(path: &Path) -> Option<Box<dyn Extractor>> {
    match SourceLanguage::from_path(path)? {
        SourceLanguage::Gdscript => Some(Box::new(GdscriptExtractor)),
        SourceLanguage::Scene => Some(Box::new(SceneExtractor)),
    }
}

/// Extract a file whose contents are already in memory.
pub fn extract_file(file_path: &Path, content: &str) -> Result<FileExtraction> {
    let extractor =
        extractor_for(file_path).ok_or_else(|| ReachError::UnsupportedFormat(file_path.into()))?;
    Ok(extractor.extract(content, file_path))
}

// ─── Helpers shared by extractors ───────────────────────────────

/// Path as stored on nodes: `/` separators.
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Deterministic node id: `{kind}_{file_id}_{safe_name}_{line}`.
pub fn node_id(kind: NodeKind, file_path: &str, name: &str, line: usize) -> String {
    let file_id: String = file_path
        .chars()
        .map(|c| match c {
            '/' | '\\' | '.' => '_',
            c => c,
        })
        .collect();
    let safe_name: String = name
        .chars()
        .map(|c| match c {
            '.' | '/' | ' ' => '_',
            c => c,
        })
        .collect();
    format!("{}_{}_{}_{}", kind.as_str(), file_id, safe_name, line)
}

/// Lines around a 1-indexed line, `context` lines each side.
pub fn code_snippet(lines: &[&str], line: usize, context: usize) -> String {
    if lines.is_empty() || line == 0 {
        return String::new();
    }
    let idx = line - 1;
    let start = idx.saturating_sub(context);
    let end = (idx + context + 1).min(lines.len());
    if start >= end {
        return String::new();
    }
    lines[start..end].join("\n")
}

/// First `max` characters of `s`.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Last `/` segment of a path-like string.
pub(crate) fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_format() {
        assert_eq!(
            node_id(NodeKind::Function, "scripts/player.gd", "take_damage", 12),
            "function_scripts_player_gd_take_damage_12"
        );
        assert_eq!(
            node_id(NodeKind::SignalConnection, "a.tscn", "Btn.pressed to x", 3),
            "signal_connection_a_tscn_Btn_pressed_to_x_3"
        );
    }

    #[test]
    fn test_code_snippet_clamps() {
        let lines = vec!["a", "b", "c", "d"];
        assert_eq!(code_snippet(&lines, 1, 1), "a\nb");
        assert_eq!(code_snippet(&lines, 4, 2), "b\nc\nd");
        assert_eq!(code_snippet(&lines, 9, 1), "");
        assert_eq!(code_snippet(&[], 1, 2), "");
    }

    #[test]
    fn test_extract_file_rejects_unknown_extension() {
        let err = extract_file(Path::new("notes.txt"), "hello").unwrap_err();
        assert!(matches!(err, ReachError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_lifecycle_names() {
        assert!(is_lifecycle_callback("_ready"));
        assert!(!is_lifecycle_callback("_helper"));
    }
}
