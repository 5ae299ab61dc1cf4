//! Source format detection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Formats the extractors understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLanguage {
    /// `.gd` scripts.
    Gdscript,
    /// `.tscn` scene descriptions.
    Scene,
}

impl SourceLanguage {
    /// Detect language from file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "gd" => Some(SourceLanguage::Gdscript),
            "tscn" => Some(SourceLanguage::Scene),
            _ => None,
        }
    }

    /// Tag stored in `Node::source_language`.
    pub fn tag(&self) -> &'static str {
        match self {
            SourceLanguage::Gdscript => "gdscript",
            SourceLanguage::Scene => "scene",
        }
    }

    /// Get the display name.
    pub fn name(&self) -> &'static str {
        match self {
            SourceLanguage::Gdscript => "GDScript",
            SourceLanguage::Scene => "Scene",
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
