//! Glob patterns for file selection and entry-point discovery.
//!
//! Backed by the `ignore` crate's override globs, so patterns follow
//! gitignore rules: `**/` matches zero or more leading directories, `*` and
//! `?` never cross a `/`, and a pattern without a `/` matches at any depth.
//! Paths are project-relative with `/` separators.

use ignore::overrides::{Override, OverrideBuilder};

use crate::error::{ReachError, Result};

/// A list of globs; a path matches the set if any member matches.
#[derive(Debug, Clone)]
pub struct PatternSet {
    sources: Vec<String>,
    globs: Override,
}

impl PatternSet {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = OverrideBuilder::new(".");
        let mut sources = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            builder.add(pattern).map_err(|e| invalid(pattern, e))?;
            sources.push(pattern.to_string());
        }
        let globs = builder
            .build()
            .map_err(|e| invalid(&sources.join(", "), e))?;
        Ok(Self { sources, globs })
    }

    /// Match a path. Backslashes are treated as separators.
    pub fn matches_any(&self, path: &str) -> bool {
        if self.sources.is_empty() {
            return false;
        }
        let path = path.replace('\\', "/");
        // the matcher only takes relative paths
        let path = path.trim_start_matches('/');
        self.globs.matched(path, false).is_whitelist()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn patterns(&self) -> &[String] {
        &self.sources
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            globs: Override::empty(),
        }
    }
}

fn invalid(pattern: &str, e: ignore::Error) -> ReachError {
    ReachError::Pattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    }
}
