//! Debug-key include/exclude matching
//!
//! Patterns are literal text plus `*` (zero or more of any character) and
//! are anchored at both ends. A key is active when it matches at least one
//! include pattern and no exclude pattern. Nothing is active by default.

use regex::Regex;
use tracing::debug;

/// Compiled include/exclude debug-key patterns
#[derive(Debug, Clone, Default)]
pub struct DebugMatcher {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl DebugMatcher {
    /// Compile include and exclude pattern lists
    ///
    /// Empty patterns are discarded.
    pub fn new<I, E>(include: I, exclude: E) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let matcher = Self {
            include: compile_all(include),
            exclude: compile_all(exclude),
        };
        debug!(
            include = matcher.include.len(),
            exclude = matcher.exclude.len(),
            "compiled debug patterns"
        );
        matcher
    }

    /// Parse a `DEBUG`-style pattern string
    ///
    /// Patterns are separated by commas or whitespace; a leading `-` moves
    /// the pattern to the exclude list, e.g. `"db:*,-db:noisy http"`.
    pub fn parse(patterns: &str) -> Self {
        let mut include = Vec::new();
        let mut exclude = Vec::new();

        for token in patterns.split(|c: char| c == ',' || c.is_whitespace()) {
            match token.strip_prefix('-') {
                Some(rest) => exclude.push(rest),
                None => include.push(token),
            }
        }

        Self::new(include, exclude)
    }

    /// Check if debug output for `key` is enabled
    pub fn is_active(&self, key: &str) -> bool {
        self.include.iter().any(|re| re.is_match(key))
            && !self.exclude.iter().any(|re| re.is_match(key))
    }

    /// True when no include pattern was compiled
    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
    }
}

fn compile_all<T>(patterns: T) -> Vec<Regex>
where
    T: IntoIterator,
    T::Item: AsRef<str>,
{
    patterns
        .into_iter()
        .filter_map(|p| compile(p.as_ref()))
        .collect()
}

/// Translate one glob into an anchored regex
fn compile(pattern: &str) -> Option<Regex> {
    if pattern.is_empty() {
        return None;
    }

    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");

    // Escaped literals plus `.*` always form a valid expression; `s` lets
    // `*` span newlines
    Regex::new(&format!("(?s)^{}$", body)).ok()
}
