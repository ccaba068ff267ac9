// ==============================================================================
// sample_name.rs - Sample Name Resolution
// ==============================================================================
// Description: Derive canonical sample identifiers from pipeline output file
//              names by stripping tool-specific suffixes
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use regex::Regex;

/// Text removed from a file name when resolving its sample name
#[derive(Debug, Clone)]
pub enum RemovalRule {
    /// Every occurrence of the substring is deleted
    Literal(String),
    /// Every match of the pattern is deleted
    Pattern(Regex),
}

impl RemovalRule {
    pub fn literal(text: impl Into<String>) -> Self {
        RemovalRule::Literal(text.into())
    }

    /// Compile a pattern rule
    ///
    /// Rules are fixed per data source, so an invalid pattern is a
    /// programming error surfaced through the returned `Result`.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(RemovalRule::Pattern(Regex::new(pattern)?))
    }

    pub fn apply(&self, text: &str) -> String {
        match self {
            RemovalRule::Literal(literal) => text.replace(literal.as_str(), ""),
            RemovalRule::Pattern(regex) => regex.replace_all(text, "").into_owned(),
        }
    }
}

/// Suffixes left by the usual alignment/QC tools
pub const DEFAULT_SUFFIXES: &[&str] = &[
    ".pass",
    ".mapped",
    ".trim",
    ".ivar_trim",
    ".mkD",
    ".sorted",
    ".bam",
    ".flagstat",
    ".stats",
    ".txt",
    ".idxstats",
    ".depths.tsv",
    "-depths.tsv",
    ".tsv",
    ".mosdepth",
    ".per-base",
    ".bed",
    ".gz",
];

pub fn default_rules() -> Vec<RemovalRule> {
    literal_rules(DEFAULT_SUFFIXES)
}

pub fn literal_rules(suffixes: &[&str]) -> Vec<RemovalRule> {
    suffixes.iter().map(|s| RemovalRule::literal(*s)).collect()
}

/// Resolve the sample name for `filename`
///
/// Rules are applied in order, each one to the output of the previous.
/// An empty rule list selects [`default_rules`]. The result is not checked
/// for emptiness or uniqueness; colliding names are the same sample.
///
/// # Example
/// ```
/// use viral_report::sample_name::{extract_sample_name, RemovalRule};
///
/// let rules = vec![RemovalRule::pattern(r"\.fastp\.json$").unwrap()];
/// assert_eq!(extract_sample_name("Sample1.fastp.json", &rules), "Sample1");
/// ```
pub fn extract_sample_name(filename: &str, rules: &[RemovalRule]) -> String {
    if rules.is_empty() {
        return apply_rules(filename, &default_rules());
    }
    apply_rules(filename, rules)
}

fn apply_rules(filename: &str, rules: &[RemovalRule]) -> String {
    rules
        .iter()
        .fold(filename.to_string(), |name, rule| rule.apply(&name))
}
