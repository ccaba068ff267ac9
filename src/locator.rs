// ==============================================================================
// locator.rs - Per-Sample File Discovery
// ==============================================================================
// Description: Find one output file per sample beneath a workflow output
//              directory using ordered glob patterns
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use globset::{GlobBuilder, GlobMatcher};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::models::SampleId;
use crate::sample_name::{extract_sample_name, RemovalRule};

/// File discovery errors
#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("Input directory does not exist or is not a directory: {0}")]
    MissingRoot(PathBuf),

    #[error("Invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Invalid sample name rule: {0}")]
    InvalidRule(#[from] regex::Error),
}

/// How multiple glob patterns are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Aggregate the matches of every pattern
    #[default]
    AllPatterns,
    /// Stop at the first pattern that matches at least one file
    FirstMatchingPattern,
}

/// Picks one file when several resolve to the same sample
pub trait SelectorStrategy: Send + Sync {
    /// Choose from `candidates` (in discovery order, never empty)
    fn select(&self, candidates: &[PathBuf]) -> Option<PathBuf>;

    fn name(&self) -> &'static str;
}

/// Keep the first file discovered
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstMatch;

impl SelectorStrategy for FirstMatch {
    fn select(&self, candidates: &[PathBuf]) -> Option<PathBuf> {
        candidates.first().cloned()
    }

    fn name(&self) -> &'static str {
        "first-match"
    }
}

/// Pick the candidate with the highest score
///
/// Ties go to the earliest candidate. A candidate whose score cannot be
/// computed ranks below every scored one; if none can be scored the first
/// candidate is returned.
pub fn select_by_score<K, F>(candidates: &[PathBuf], score: F) -> Option<PathBuf>
where
    K: Ord,
    F: Fn(&Path) -> Option<K>,
{
    let mut best: Option<(&PathBuf, Option<K>)> = None;

    for candidate in candidates {
        let candidate_score = score(candidate);
        let replace = match &best {
            None => true,
            Some((_, best_score)) => candidate_score > *best_score,
        };
        if replace {
            best = Some((candidate, candidate_score));
        }
    }

    best.map(|(path, _)| path.clone())
}

/// Locates one file per sample
pub struct FileLocator {
    patterns: Vec<String>,
    rules: Vec<RemovalRule>,
    mode: SearchMode,
    selector: Box<dyn SelectorStrategy>,
}

impl FileLocator {
    /// Create a locator over `patterns` with default sample-name rules,
    /// [`SearchMode::AllPatterns`] and the [`FirstMatch`] selector
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            rules: Vec::new(),
            mode: SearchMode::default(),
            selector: Box::new(FirstMatch),
        }
    }

    pub fn with_rules(mut self, rules: Vec<RemovalRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_selector(mut self, selector: impl SelectorStrategy + 'static) -> Self {
        self.selector = Box::new(selector);
        self
    }

    /// Map each sample found beneath `root` to exactly one file
    ///
    /// # Returns
    /// * `Ok(map)` - sample -> selected file (empty when nothing matched)
    /// * `Err(LocatorError)` - root missing or a pattern is invalid
    pub fn locate(&self, root: &Path) -> Result<BTreeMap<SampleId, PathBuf>, LocatorError> {
        let candidates = self.candidates(root)?;

        let mut selected = BTreeMap::new();
        for (sample, files) in candidates {
            if files.len() > 1 {
                debug!(
                    "{} candidate files for sample '{}', selecting with {}",
                    files.len(),
                    sample,
                    self.selector.name()
                );
            }
            if let Some(path) = self.selector.select(&files) {
                selected.insert(sample, path);
            }
        }

        Ok(selected)
    }

    /// Group every matching file by resolved sample name, in discovery order
    pub fn candidates(&self, root: &Path) -> Result<BTreeMap<SampleId, Vec<PathBuf>>, LocatorError> {
        if !root.is_dir() {
            return Err(LocatorError::MissingRoot(root.to_path_buf()));
        }

        let mut grouped: BTreeMap<SampleId, Vec<PathBuf>> = BTreeMap::new();

        for pattern in &self.patterns {
            let matcher = compile_glob(pattern)?;
            let matches = glob_files(root, &matcher);
            debug!("Pattern '{}' matched {} files under {:?}", pattern, matches.len(), root);

            let found_any = !matches.is_empty();
            for path in matches {
                let file_name = match path.file_name() {
                    Some(name) => name.to_string_lossy().to_string(),
                    None => continue,
                };
                let sample = extract_sample_name(&file_name, &self.rules);
                let files = grouped.entry(sample).or_default();
                if !files.contains(&path) {
                    files.push(path);
                }
            }

            if found_any && self.mode == SearchMode::FirstMatchingPattern {
                break;
            }
        }

        Ok(grouped)
    }
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher, LocatorError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|source| LocatorError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// One recursive traversal of `root`, matching root-relative file paths
fn glob_files(root: &Path, matcher: &GlobMatcher) -> Vec<PathBuf> {
    let mut matches = Vec::new();

    // Workflow engines publish outputs as symlinks, so links are followed
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable path during discovery: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = match entry.path().strip_prefix(root) {
            Ok(relative) => relative,
            Err(_) => continue,
        };

        if matcher.is_match(relative) {
            matches.push(entry.into_path());
        }
    }

    matches
}
