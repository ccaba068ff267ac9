// ==============================================================================
// parsers/depth.rs - Depth of Coverage Parser
// ==============================================================================
// Description: Per-position read depth from mosdepth per-base BED files, with a
//              BAM pileup fallback when no BED output exists
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Format (mosdepth per-base, tab-delimited, no header, 0-based half-open):
//   MN908947.3	0	54	0
//   MN908947.3	54	63	12
// ==============================================================================

use noodles::bam;
use noodles::sam::alignment::record::cigar::op::Kind;
use std::collections::BTreeMap;
use std::io::{self, BufRead};
use std::path::Path;
use thiserror::Error;

use crate::coverage::{depth_array, DepthInterval};
use crate::locator::{FileLocator, LocatorError, SearchMode};
use crate::models::{CoverageRecord, SampleId};
use crate::parsers::open_text;
use crate::run_log::RunLog;
use crate::sample_name::literal_rules;

const SOURCE: &str = "depth";

/// Per-base BED outputs first; BAM files only when no BED file exists anywhere
pub const GLOB_PATTERNS: &[&str] = &[
    "**/mosdepth/**/*.genome.per-base.bed.gz",
    "**/mosdepth/**/*.per-base.bed.gz",
    "**/*.trim*.bam",
    "**/*.bam",
];

pub const SAMPLE_NAME_CLEANUP: &[&str] = &[
    ".genome.per-base.bed.gz",
    ".per-base.bed.gz",
    ".bam",
    ".trim",
    ".mkD",
    ".fgbio",
    ".clipbam",
    ".ivar_trim",
    ".sorted",
    ".sort",
    ".bam",
];

/// Depth parsing errors
#[derive(Error, Debug)]
pub enum DepthError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Invalid per-base BED line {line}: {reason}")]
    InvalidLine { line: usize, reason: String },

    #[error("BAM header has no reference sequences")]
    NoReference,
}

/// Read the intervals of a mosdepth per-base BED file (plain or gzipped)
///
/// Only the first contig is kept; the report describes a single reference
/// genome. Blank lines are ignored.
pub fn read_per_base_bed(path: &Path) -> Result<Vec<DepthInterval>, DepthError> {
    let reader = open_text(path)?;
    parse_per_base_bed(reader)
}

fn parse_per_base_bed(reader: impl BufRead) -> Result<Vec<DepthInterval>, DepthError> {
    let mut intervals = Vec::new();
    let mut contig: Option<String> = None;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let invalid = |reason: &str| DepthError::InvalidLine {
            line: idx + 1,
            reason: reason.to_string(),
        };

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 4 {
            return Err(invalid("expected 4 tab-separated fields"));
        }

        match &contig {
            None => contig = Some(fields[0].to_string()),
            Some(name) if name != fields[0] => break,
            Some(_) => {}
        }

        let start = fields[1].trim().parse().map_err(|_| invalid("bad start"))?;
        let end = fields[2].trim().parse().map_err(|_| invalid("bad end"))?;
        let depth = fields[3].trim().parse().map_err(|_| invalid("bad depth"))?;

        intervals.push(DepthInterval { start, end, depth });
    }

    Ok(intervals)
}

/// Per-position depth over the first reference sequence of a BAM file
///
/// Counts bases of aligned reads (CIGAR `M`, `=`, `X`). Deletions and
/// reference skips advance the position without adding depth. Unmapped,
/// secondary, QC-failed and duplicate records are skipped.
pub fn bam_depths(path: &Path) -> Result<Vec<u32>, DepthError> {
    let mut reader = bam::io::reader::Builder::default().build_from_path(path)?;
    let header = reader.read_header()?;

    let (_, reference) = header
        .reference_sequences()
        .first()
        .ok_or(DepthError::NoReference)?;
    let length = reference.length().get();

    let mut diff = vec![0i64; length + 1];

    for result in reader.records() {
        let record = result?;

        let flags = record.flags();
        if flags.is_unmapped() || flags.is_secondary() || flags.is_qc_fail() || flags.is_duplicate() {
            continue;
        }

        match record.reference_sequence_id() {
            Some(Ok(0)) => {}
            Some(Err(e)) => return Err(e.into()),
            _ => continue,
        }

        let Some(start) = record.alignment_start().transpose()? else {
            continue;
        };

        let mut ops = Vec::new();
        for op in record.cigar().iter() {
            let op = op?;
            ops.push((op.kind(), op.len()));
        }

        add_aligned_blocks(&mut diff, usize::from(start) - 1, &ops);
    }

    Ok(prefix_depths(&diff, length))
}

/// Mark the reference spans covered by aligned bases in a difference array
fn add_aligned_blocks(diff: &mut [i64], start: usize, ops: &[(Kind, usize)]) {
    let limit = diff.len().saturating_sub(1);
    let mut pos = start;

    for &(kind, len) in ops {
        match kind {
            Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch => {
                let from = pos.min(limit);
                let to = (pos + len).min(limit);
                if from < to {
                    diff[from] += 1;
                    diff[to] -= 1;
                }
                pos += len;
            }
            Kind::Deletion | Kind::Skip => pos += len,
            _ => {}
        }
    }
}

fn prefix_depths(diff: &[i64], length: usize) -> Vec<u32> {
    let mut running = 0i64;
    diff.iter()
        .take(length)
        .map(|delta| {
            running += delta;
            u32::try_from(running.max(0)).unwrap_or(u32::MAX)
        })
        .collect()
}

/// Dense depth array for one depth source file
pub fn read_depths(path: &Path) -> Result<Vec<u32>, DepthError> {
    let is_bam = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("bam"))
        .unwrap_or(false);

    if is_bam {
        bam_depths(path)
    } else {
        Ok(depth_array(&read_per_base_bed(path)?))
    }
}

/// Coverage summary for every sample with a depth source under `root`
pub fn collect(
    root: &Path,
    low_coverage_threshold: u32,
    log: &mut RunLog,
) -> Result<BTreeMap<SampleId, CoverageRecord>, LocatorError> {
    let files = FileLocator::new(GLOB_PATTERNS)
        .with_rules(literal_rules(SAMPLE_NAME_CLEANUP))
        .with_mode(SearchMode::FirstMatchingPattern)
        .locate(root)?;

    let mut out = BTreeMap::new();
    for (sample, path) in files {
        match read_depths(&path) {
            Ok(depths) => {
                log.debug(
                    SOURCE,
                    Some(&sample),
                    format!("{} positions from {}", depths.len(), path.display()),
                );
                let record = CoverageRecord::from_depths(sample.clone(), &depths, low_coverage_threshold);
                out.insert(sample, record);
            }
            Err(e) => log.warn(
                SOURCE,
                Some(&sample),
                format!("Skipping depth file {}: {}", path.display(), e),
            ),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    const BED: &str = "MN908947.3\t0\t3\t1\nMN908947.3\t3\t6\t2\nMN908947.3\t6\t10\t3\n";

    fn write_gz(path: &Path, contents: &str) {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(contents.as_bytes()).unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, encoder.finish().unwrap()).unwrap();
    }

    #[test]
    fn test_parse_per_base_bed() {
        let intervals = parse_per_base_bed(BED.as_bytes()).unwrap();
        assert_eq!(intervals.len(), 3);
        assert_eq!(depth_array(&intervals), vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 3]);
    }

    #[test]
    fn test_parse_per_base_bed_first_contig_only() {
        let data = format!("{BED}other\t0\t100\t50\n");
        let intervals = parse_per_base_bed(data.as_bytes()).unwrap();
        assert_eq!(intervals.len(), 3);
    }

    #[test]
    fn test_parse_per_base_bed_invalid() {
        let result = parse_per_base_bed("chr\t0\tx\t1\n".as_bytes());
        assert!(matches!(result, Err(DepthError::InvalidLine { line: 1, .. })));
    }

    #[test]
    fn test_aligned_blocks_skip_deletions() {
        let mut diff = vec![0i64; 11];
        // 3M 2D 3M starting at 0; 2I contributes nothing
        add_aligned_blocks(
            &mut diff,
            0,
            &[(Kind::Match, 3), (Kind::Insertion, 2), (Kind::Deletion, 2), (Kind::Match, 3)],
        );
        // 2S 4= starting at 4; soft clip does not advance
        add_aligned_blocks(&mut diff, 4, &[(Kind::SoftClip, 2), (Kind::SequenceMatch, 4)]);

        assert_eq!(prefix_depths(&diff, 10), vec![1, 1, 1, 0, 1, 2, 2, 2, 0, 0]);
    }

    #[test]
    fn test_aligned_blocks_clamped_to_reference() {
        let mut diff = vec![0i64; 6];
        add_aligned_blocks(&mut diff, 3, &[(Kind::Match, 10)]);
        assert_eq!(prefix_depths(&diff, 5), vec![0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_collect_from_mosdepth() {
        let dir = TempDir::new().unwrap();
        write_gz(&dir.path().join("mosdepth/Sample1.per-base.bed.gz"), BED);
        write_gz(
            &dir.path().join("mosdepth/nested/Sample2.per-base.bed.gz"),
            "ref\t0\t10\t0\n",
        );
        // BAMs are ignored once any per-base BED file exists
        fs::write(dir.path().join("Sample3.trim.sorted.bam"), b"not a bam").unwrap();

        let mut log = RunLog::new();
        let records = collect(dir.path(), 2, &mut log).unwrap();

        assert_eq!(records.keys().collect::<Vec<_>>(), vec!["Sample1", "Sample2"]);
        let s1 = &records["Sample1"];
        assert_eq!(s1.ref_seq_length(), 10);
        assert_eq!(s1.n_low_coverage(), 3);
        assert_eq!(s1.median_coverage(), 2);
        assert_eq!(records["Sample2"].zero_coverage_coords(), "1-10");
    }

    #[test]
    fn test_collect_skips_unreadable_bam() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Sample1.trim.sorted.bam"), b"garbage").unwrap();

        let mut log = RunLog::new();
        let records = collect(dir.path(), 10, &mut log).unwrap();

        assert!(records.is_empty());
        assert_eq!(log.notices().len(), 1);
        assert_eq!(log.notices()[0].sample.as_deref(), Some("Sample1"));
    }
}
