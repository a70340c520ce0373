//! CI log noise filtering.
//!
//! Build logs carry ephemeral output that differs between any two runs
//! (progress counters, download chatter, timestamps). Left in place it would
//! dominate every diff, so each raw log is reduced to its stable lines first.

use regex::Regex;

use crate::constants::noise::{DROP_PATTERNS, NOISE_PATTERNS_VERSION, TIMESTAMP_PREFIX};
use crate::errors::HunkError;
use crate::types::{LogLines, PatternSource};

/// Versioned, immutable set of noise patterns.
///
/// Any change to the pattern list changes downstream dataset content, so the
/// set carries a version that is recorded next to generated data.
#[derive(Clone, Debug)]
pub struct NoisePatterns {
    version: u32,
    strip_prefix: Option<Regex>,
    drop: Vec<Regex>,
}

impl NoisePatterns {
    /// Compile a pattern set from source strings.
    pub fn new(
        version: u32,
        strip_prefix: Option<&str>,
        drop: &[PatternSource],
    ) -> Result<Self, HunkError> {
        let strip_prefix = strip_prefix.map(compile).transpose()?;
        let drop = drop
            .iter()
            .map(|source| compile(source))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            version,
            strip_prefix,
            drop,
        })
    }

    /// The built-in pattern set used for dataset generation.
    pub fn builtin() -> Result<Self, HunkError> {
        let drop: Vec<PatternSource> = DROP_PATTERNS.iter().map(|p| p.to_string()).collect();
        Self::new(NOISE_PATTERNS_VERSION, Some(TIMESTAMP_PREFIX), &drop)
    }

    /// Pattern set version.
    pub fn version(&self) -> u32 {
        self.version
    }

    fn strip<'a>(&self, line: &'a str) -> &'a str {
        match &self.strip_prefix {
            Some(re) => match re.find(line) {
                Some(found) if found.start() == 0 => &line[found.end()..],
                _ => line,
            },
            None => line,
        }
    }

    fn is_noise(&self, line: &str) -> bool {
        self.drop.iter().any(|re| re.is_match(line))
    }
}

fn compile(source: &str) -> Result<Regex, HunkError> {
    Regex::new(source)
        .map_err(|err| HunkError::Configuration(format!("invalid noise pattern '{source}': {err}")))
}

/// Pure line filter over raw log text.
#[derive(Clone, Debug)]
pub struct NoiseFilter {
    patterns: NoisePatterns,
}

impl NoiseFilter {
    /// Build a filter around an explicit pattern set.
    pub fn new(patterns: NoisePatterns) -> Self {
        Self { patterns }
    }

    /// Build a filter with the built-in pattern set.
    pub fn builtin() -> Result<Self, HunkError> {
        Ok(Self::new(NoisePatterns::builtin()?))
    }

    /// Patterns in use.
    pub fn patterns(&self) -> &NoisePatterns {
        &self.patterns
    }

    /// Clean one line, returning `None` when it should be dropped.
    pub fn clean_line<'a>(&self, raw: &'a str) -> Option<&'a str> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let stripped = self.patterns.strip(trimmed).trim();
        if stripped.is_empty() || self.patterns.is_noise(stripped) {
            return None;
        }
        Some(stripped)
    }

    /// Reduce a raw log to its stable lines, preserving order.
    pub fn clean(&self, raw: &str) -> LogLines {
        raw.split('\n')
            .filter_map(|line| self.clean_line(line))
            .map(str::to_string)
            .collect()
    }
}
