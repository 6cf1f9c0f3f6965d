//! Include/exclude pattern matching.
//!
//! Patterns are regular expressions evaluated against the full path string of
//! an entry, not just its file name. A set matches when any of its patterns
//! matches.

use std::path::Path;

use regex::Regex;

use crate::error::{Result, WatcherError};

/// An ordered set of compiled path patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// Compile every pattern in order.
    ///
    /// `dir` only names the owning directory in the error; the first pattern
    /// that fails to compile aborts the whole set.
    pub fn compile<S: AsRef<str>>(dir: &str, patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|source| WatcherError::InvalidPattern {
                    dir: dir.to_string(),
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Check whether any pattern matches the path.
    pub fn matches(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let path = path.to_string_lossy();
        self.patterns.iter().any(|regex| regex.is_match(&path))
    }

    /// Whether the set holds no patterns.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Number of patterns in the set.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[cfg(test)]
    fn sources(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }
}
