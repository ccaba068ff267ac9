// ==============================================================================
// parsers/consensus.rs - Consensus FASTA Parser
// ==============================================================================
// Description: Per-sample consensus sequences from iVar/bcftools consensus
//              FASTA output, plain or gzipped
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use noodles::fasta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::locator::{FileLocator, LocatorError};
use crate::models::SampleId;
use crate::parsers::open_text;
use crate::run_log::RunLog;
use crate::sample_name::RemovalRule;
use crate::table::{Cell, Column, SheetName, Table};

const SOURCE: &str = "consensus";

pub const GLOB_PATTERNS: &[&str] = &["**/ivar/**/*.consensus.fa*", "**/*.consensus.fa*"];

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("No sequences in FASTA file")]
    Empty,
}

/// A consensus sequence renamed after its sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusSequence {
    pub name: String,
    pub sequence: String,
}

pub fn sample_name_rules() -> Result<Vec<RemovalRule>, regex::Error> {
    Ok(vec![
        RemovalRule::pattern(r"\.AF0\.\d+")?,
        RemovalRule::literal(".consensus"),
        RemovalRule::literal(".fasta"),
        RemovalRule::literal(".fa"),
    ])
}

/// Sequences of one consensus FASTA, named `sample` or `sample-N` when the
/// file holds more than one record
pub fn read_consensus(path: &Path, sample: &str) -> Result<Vec<ConsensusSequence>, ConsensusError> {
    let mut reader = fasta::io::Reader::new(open_text(path)?);

    let mut sequences = Vec::new();
    for result in reader.records() {
        let record = result?;
        sequences.push(String::from_utf8_lossy(record.sequence().as_ref()).into_owned());
    }

    match sequences.len() {
        0 => Err(ConsensusError::Empty),
        1 => Ok(vec![ConsensusSequence {
            name: sample.to_string(),
            sequence: sequences.remove(0),
        }]),
        _ => Ok(sequences
            .into_iter()
            .enumerate()
            .map(|(i, sequence)| ConsensusSequence {
                name: format!("{}-{}", sample, i + 1),
                sequence,
            })
            .collect()),
    }
}

/// Consensus sequences for every sample with a consensus FASTA under `root`
pub fn collect(
    root: &Path,
    log: &mut RunLog,
) -> Result<BTreeMap<SampleId, Vec<ConsensusSequence>>, LocatorError> {
    let files = FileLocator::new(GLOB_PATTERNS)
        .with_rules(sample_name_rules()?)
        .locate(root)?;

    let mut out = BTreeMap::new();
    for (sample, path) in files {
        match read_consensus(&path, &sample) {
            Ok(sequences) => {
                if sequences.len() > 1 {
                    log.info(
                        SOURCE,
                        Some(&sample),
                        format!(
                            "{} contains {} sequences; naming them {}-1..{}-{}",
                            path.display(),
                            sequences.len(),
                            sample,
                            sample,
                            sequences.len()
                        ),
                    );
                }
                out.insert(sample, sequences);
            }
            Err(e) => log.warn(
                SOURCE,
                Some(&sample),
                format!("Skipping consensus FASTA {}: {}", path.display(), e),
            ),
        }
    }

    Ok(out)
}

/// The Consensus sheet, one row per sequence in sample order
pub fn to_table(by_sample: &BTreeMap<SampleId, Vec<ConsensusSequence>>) -> Option<Table> {
    if by_sample.is_empty() {
        return None;
    }

    let mut table = Table::new(
        SheetName::Consensus,
        vec![
            Column::new("Sequence Name", "Consensus sequence name (sample name, numbered if a sample has several)"),
            Column::new("Sequence", "Consensus sequence"),
        ],
    );
    for seq in by_sample.values().flatten() {
        table.push_row(vec![Cell::text(&seq.name), Cell::text(&seq.sequence)]);
    }

    Some(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_single_record_renamed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Sample1.consensus.fasta");
        fs::write(&path, ">Consensus_Sample1 threshold=0.75\nACGT\nNNAC\n").unwrap();

        let seqs = read_consensus(&path, "Sample1").unwrap();
        assert_eq!(
            seqs,
            vec![ConsensusSequence {
                name: "Sample1".to_string(),
                sequence: "ACGTNNAC".to_string(),
            }]
        );
    }

    #[test]
    fn test_multi_record_numbered() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Sample1.consensus.fa");
        fs::write(&path, ">a\nAC\n>b\nGT\n").unwrap();

        let names: Vec<String> = read_consensus(&path, "Sample1")
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Sample1-1", "Sample1-2"]);
    }

    #[test]
    fn test_collect_strips_suffixes() {
        let dir = TempDir::new().unwrap();
        let ivar = dir.path().join("ivar/consensus");
        fs::create_dir_all(&ivar).unwrap();
        fs::write(ivar.join("Sample2.AF0.75.consensus.fa"), ">x\nAAAA\n").unwrap();
        fs::write(ivar.join("Sample1.AF0.75.consensus.fa"), ">y\nCCCC\n").unwrap();

        let mut log = RunLog::new();
        let by_sample = collect(dir.path(), &mut log).unwrap();
        let table = to_table(&by_sample).unwrap();

        assert_eq!(table.column_names(), vec!["Sequence Name", "Sequence"]);
        assert_eq!(table.rows[0], vec![Cell::text("Sample1"), Cell::text("CCCC")]);
        assert_eq!(table.rows[1][0], Cell::text("Sample2"));
    }

    #[test]
    fn test_empty_fasta_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("S.consensus.fa"), "").unwrap();

        let mut log = RunLog::new();
        assert!(collect(dir.path(), &mut log).unwrap().is_empty());
        assert!(!log.is_empty());
        assert!(to_table(&BTreeMap::new()).is_none());
    }
}
