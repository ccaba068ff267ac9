// ==============================================================================
// parsers/flagstat.rs - Samtools Flagstat Parser
// ==============================================================================
// Description: Total and mapped read counts from `samtools flagstat` reports
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Format:
//   1000 + 0 in total (QC-passed reads + QC-failed reads)
//   0 + 0 secondary
//   950 + 0 mapped (95.00% : N/A)
// ==============================================================================

use regex::Regex;
use std::collections::BTreeMap;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::locator::{select_by_score, FileLocator, LocatorError, SelectorStrategy};
use crate::models::{MappingRecord, SampleId};
use crate::parsers::open_text;
use crate::run_log::RunLog;

const SOURCE: &str = "flagstat";

pub const GLOB_PATTERNS: &[&str] = &["**/*.flagstat"];

#[derive(Error, Debug)]
pub enum FlagstatError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),
}

/// Parse `(total, mapped)` read counts
///
/// A line contributes only if it starts with a count. Missing lines leave
/// the count at 0; a later matching line overwrites an earlier one.
pub fn parse_flagstat(reader: impl BufRead) -> Result<(u64, u64), FlagstatError> {
    let leading_count = Regex::new(r"^(\d+)")?;
    let mut total = 0;
    let mut mapped = 0;

    for line in reader.lines() {
        let line = line?;
        let Some(count) = leading_count
            .captures(&line)
            .and_then(|caps| caps[1].parse::<u64>().ok())
        else {
            continue;
        };

        if line.contains("in total") {
            total = count;
        }
        if line.contains(" mapped (") {
            mapped = count;
        }
    }

    Ok((total, mapped))
}

pub fn read_flagstat(path: &Path) -> Result<(u64, u64), FlagstatError> {
    parse_flagstat(open_text(path)?)
}

/// Prefer the flagstat report with the most reads, then the most mapped reads
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxReadCount;

impl SelectorStrategy for MaxReadCount {
    fn select(&self, candidates: &[PathBuf]) -> Option<PathBuf> {
        select_by_score(candidates, |path| read_flagstat(path).ok())
    }

    fn name(&self) -> &'static str {
        "max-read-count"
    }
}

/// Mapping summary for every sample with a flagstat report under `root`
pub fn collect(root: &Path, log: &mut RunLog) -> Result<BTreeMap<SampleId, MappingRecord>, LocatorError> {
    let files = FileLocator::new(GLOB_PATTERNS)
        .with_selector(MaxReadCount)
        .locate(root)?;

    let mut out = BTreeMap::new();
    for (sample, path) in files {
        match read_flagstat(&path) {
            Ok((total, mapped)) => {
                out.insert(sample.clone(), MappingRecord::new(sample, total, mapped));
            }
            Err(e) => log.warn(
                SOURCE,
                Some(&sample),
                format!("Skipping flagstat {}: {}", path.display(), e),
            ),
        }
    }

    Ok(out)
}
