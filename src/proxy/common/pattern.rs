// Allow-list glob patterns
// Only `*` is special; it matches any run of characters, including none.

use regex::{Regex, RegexBuilder};

/// Compile a glob pattern into an anchored, case-insensitive regex
pub fn compile(pattern: &str) -> Option<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");

    match RegexBuilder::new(&format!("^{}$", body))
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
    {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("Ignoring uncompilable pattern {:?}: {}", pattern, e);
            None
        }
    }
}

/// Whether `subject` matches the whole of `pattern`
pub fn matches(pattern: &str, subject: &str) -> bool {
    compile(pattern).is_some_and(|re| re.is_match(subject))
}

/// An empty list places no restriction; otherwise one pattern must match.
pub fn matches_any<S: AsRef<str>>(patterns: &[S], subject: &str) -> bool {
    patterns.is_empty() || patterns.iter().any(|p| matches(p.as_ref(), subject))
}
