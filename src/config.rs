//! Project configuration, read from `.reach/config.toml`.
//!
//! Every section is optional; missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;

/// Directory holding config and cache, relative to the project root.
pub const REACH_DIR: &str = ".reach";
pub const CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_INCLUDE_PATTERNS: &[&str] = &["**/*.gd", "**/*.tscn"];
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "**/node_modules/**",
    "**/.godot/**",
    "**/build/**",
    "**/.git/**",
    "**/addons/**",
];
pub const DEFAULT_ENTRY_POINT_PATTERNS: &[&str] =
    &["**/autoload/*.gd", "**/main.tscn", "**/main.gd"];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReachConfig {
    pub project: ProjectConfig,
    pub parsing: ParsingConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    /// Project root. Relative values are resolved against the directory
    /// that contains `.reach/`.
    pub root: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "REACH".to_string(),
            root: PathBuf::from("."),
        }
    }
}

/// Which files the builder looks at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            include_patterns: strings(DEFAULT_INCLUDE_PATTERNS),
            exclude_patterns: strings(DEFAULT_EXCLUDE_PATTERNS),
        }
    }
}

/// Default bounds for queries and analyses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Globs for files whose nodes seed dead-code reachability.
    pub entry_point_patterns: Vec<String>,
    pub max_path_depth: usize,
    pub max_paths: usize,
    pub max_cycles: usize,
    pub dependency_depth: usize,
    pub impact_depth: usize,
    pub min_connections: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            entry_point_patterns: strings(DEFAULT_ENTRY_POINT_PATTERNS),
            max_path_depth: 10,
            max_paths: 10,
            max_cycles: 50,
            dependency_depth: 5,
            impact_depth: 3,
            min_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache file, relative to `.reach/`.
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("graph.json"),
        }
    }
}

impl ReachConfig {
    /// Load config from a file, or return defaults if the file is missing
    /// or invalid. Problems are logged, not returned.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }
        match Self::load_strict(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from a file. A missing file still yields defaults;
    /// unreadable or malformed files are errors.
    pub fn load_strict(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load `<root>/.reach/config.toml` and resolve the project root against `root`.
    pub fn for_project(root: &Path) -> Self {
        let mut config = Self::load(&root.join(REACH_DIR).join(CONFIG_FILE));
        config.project.root = resolve_against(root, &config.project.root);
        config
    }

    /// Same as [`ReachConfig::for_project`] but with an explicit config file.
    pub fn for_project_with(root: &Path, config_path: &Path) -> Result<Self> {
        let mut config = Self::load_strict(config_path)?;
        config.project.root = resolve_against(root, &config.project.root);
        Ok(config)
    }

    /// The `.reach/` directory under the project root.
    pub fn reach_dir(&self) -> PathBuf {
        self.project.root.join(REACH_DIR)
    }

    /// Absolute cache file location.
    pub fn resolve_cache_path(&self) -> PathBuf {
        if self.cache.path.is_absolute() {
            self.cache.path.clone()
        } else {
            self.reach_dir().join(&self.cache.path)
        }
    }

    /// Render the defaults as a TOML document.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn resolve_against(base: &Path, root: &Path) -> PathBuf {
    if root.is_absolute() {
        root.to_path_buf()
    } else if root == Path::new(".") || root.as_os_str().is_empty() {
        base.to_path_buf()
    } else {
        base.join(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ReachConfig::default();
        assert_eq!(config.analysis.max_path_depth, 10);
        assert_eq!(config.analysis.min_connections, 10);
        assert_eq!(config.parsing.include_patterns, vec!["**/*.gd", "**/*.tscn"]);
        assert_eq!(config.cache.path, PathBuf::from("graph.json"));
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = ReachConfig::from_toml(
            r#"
            [analysis]
            max_cycles = 5

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.analysis.max_cycles, 5);
        assert_eq!(config.analysis.impact_depth, 3);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.project.name, "REACH");
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = ReachConfig::load_strict(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.analysis.max_paths, 10);
    }

    #[test]
    fn test_invalid_file_strict_errors_lenient_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[analysis\nmax_cycles = ").unwrap();

        assert!(ReachConfig::load_strict(&path).is_err());
        assert_eq!(ReachConfig::load(&path).analysis.max_cycles, 50);
    }

    #[test]
    fn test_for_project_resolves_root_and_cache() {
        let dir = TempDir::new().unwrap();
        let reach = dir.path().join(REACH_DIR);
        std::fs::create_dir_all(&reach).unwrap();
        std::fs::write(
            reach.join(CONFIG_FILE),
            "[project]\nroot = \"game\"\n[cache]\npath = \"g.json\"\n",
        )
        .unwrap();

        let config = ReachConfig::for_project(dir.path());
        assert_eq!(config.project.root, dir.path().join("game"));
        assert_eq!(
            config.resolve_cache_path(),
            dir.path().join("game").join(REACH_DIR).join("g.json")
        );
    }

    #[test]
    fn test_default_toml_round_trips() {
        let text = ReachConfig::default_toml();
        let parsed = ReachConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.analysis.dependency_depth, 5);
    }
}
