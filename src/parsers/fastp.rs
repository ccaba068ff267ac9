// ==============================================================================
// parsers/fastp.rs - fastp JSON Report Parser
// ==============================================================================
// Description: Raw read counts from fastp JSON reports, used to correct the
//              total read count reported by the aligner
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::locator::{FileLocator, LocatorError};
use crate::models::SampleId;
use crate::parsers::open_text;
use crate::run_log::RunLog;
use crate::sample_name::RemovalRule;

const SOURCE: &str = "fastp";

pub const GLOB_PATTERNS: &[&str] = &["**/*.fastp.json"];

const TOTAL_READS_POINTER: &str = "/summary/before_filtering/total_reads";

#[derive(Error, Debug)]
pub enum FastpError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing or non-integer summary.before_filtering.total_reads")]
    MissingTotalReads,
}

pub fn sample_name_rules() -> Result<Vec<RemovalRule>, regex::Error> {
    Ok(vec![RemovalRule::pattern(r"\.fastp\.json$")?])
}

/// Total reads before filtering
pub fn read_total_reads(path: &Path) -> Result<u64, FastpError> {
    let json: Value = serde_json::from_reader(open_text(path)?)?;
    json.pointer(TOTAL_READS_POINTER)
        .and_then(Value::as_u64)
        .ok_or(FastpError::MissingTotalReads)
}

/// Total read counts for every sample with a fastp report under `root`
pub fn collect(root: &Path, log: &mut RunLog) -> Result<BTreeMap<SampleId, u64>, LocatorError> {
    let files = FileLocator::new(GLOB_PATTERNS)
        .with_rules(sample_name_rules()?)
        .locate(root)?;

    let mut out = BTreeMap::new();
    for (sample, path) in files {
        match read_total_reads(&path) {
            Ok(total) => {
                out.insert(sample, total);
            }
            Err(e) => log.error(
                SOURCE,
                Some(&sample),
                format!("Could not read total reads from {}: {}", path.display(), e),
            ),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_total_reads() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("fastp")).unwrap();
        fs::write(
            dir.path().join("fastp/Sample1.fastp.json"),
            r#"{"summary": {"before_filtering": {"total_reads": 123456, "total_bases": 1}}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("fastp/Sample2.fastp.json"),
            r#"{"summary": {"after_filtering": {"total_reads": 1}}}"#,
        )
        .unwrap();

        let mut log = RunLog::new();
        let totals = collect(dir.path(), &mut log).unwrap();

        assert_eq!(totals.len(), 1);
        assert_eq!(totals["Sample1"], 123456);
        assert_eq!(log.notices().len(), 1);
        assert_eq!(log.notices()[0].sample.as_deref(), Some("Sample2"));
    }

    #[test]
    fn test_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("S.fastp.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(read_total_reads(&path), Err(FastpError::JsonError(_))));
    }
}
