//! Path filters for `add`.
//!
//! A pattern set holds globs and regular expressions. A path relative to the
//! added root is kept when any of them matches it. Globs let `*` cross
//! directory separators, so `*.txt` keeps `notes/a.txt` as well as `a.txt`.
//! Regular expressions must match at the start of the path but may stop
//! short of its end.

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;

use crate::error::ApiError;

/// A single filter: a glob, or an already compiled regular expression.
///
/// A `Regex` is anchored at the start of the relative path only: `notes/`
/// keeps `notes/a.txt`, while `txt` keeps nothing under `notes/`.
#[derive(Debug, Clone)]
pub enum Pattern {
    Glob(String),
    Regex(Regex),
}

impl Pattern {
    pub fn glob(pattern: &str) -> Self {
        Pattern::Glob(pattern.to_string())
    }
}

impl From<&str> for Pattern {
    fn from(pattern: &str) -> Self {
        Pattern::glob(pattern)
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Pattern::Regex(re)
    }
}

/// Compiled form of a list of `Pattern`s.
#[derive(Debug)]
pub(crate) struct PatternSet {
    globs: GlobSet,
    regexes: Vec<Regex>,
}

impl PatternSet {
    pub(crate) fn new(patterns: &[Pattern]) -> Result<Self, ApiError> {
        let mut builder = GlobSetBuilder::new();
        let mut regexes = Vec::new();
        for pattern in patterns {
            match pattern {
                Pattern::Glob(glob) => {
                    let compiled = Glob::new(glob).map_err(|e| ApiError::InvalidPattern {
                        pattern: glob.clone(),
                        reason: e.kind().to_string(),
                    })?;
                    builder.add(compiled);
                }
                Pattern::Regex(re) => regexes.push(re.clone()),
            }
        }
        let globs = builder.build().map_err(|e| ApiError::InvalidPattern {
            pattern: patterns
                .iter()
                .filter_map(|p| match p {
                    Pattern::Glob(g) => Some(g.as_str()),
                    Pattern::Regex(_) => None,
                })
                .collect::<Vec<_>>()
                .join(", "),
            reason: e.to_string(),
        })?;
        Ok(Self { globs, regexes })
    }

    /// `relative` uses `/` as separator whatever the platform.
    pub(crate) fn matches(&self, relative: &str) -> bool {
        self.globs.is_match(relative)
            || self
                .regexes
                .iter()
                .any(|re| re.find(relative).is_some_and(|m| m.start() == 0))
    }
}
