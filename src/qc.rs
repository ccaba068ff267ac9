// ==============================================================================
// qc.rs - Sample QC Classification
// ==============================================================================
// Description: PASS/FAIL classification of samples from coverage depth and
//              breadth, and the Stats & QC sheet
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{CoverageRecord, MappingRecord, QcRecord, QcStatus, QualityRequirements, SampleId};
use crate::table::{Cell, Column, SheetName, Table};

/// Classify one sample against `reqs`
///
/// PASS requires both the median depth and the genome coverage to reach
/// their minimums. A sample without coverage data fails both checks. The
/// comment is left empty whenever breadth passes, even if depth failed.
/// Ct values are carried through and never affect the outcome.
pub fn classify(
    sample: &str,
    coverage: Option<&CoverageRecord>,
    mapping: Option<&MappingRecord>,
    ct_value: Option<f64>,
    reqs: &QualityRequirements,
) -> QcRecord {
    let pass_depth = coverage.is_some_and(|c| c.median_coverage() >= reqs.min_median_depth);
    let pass_breadth = coverage.is_some_and(|c| c.genome_coverage() >= reqs.min_genome_coverage);

    let status = if pass_depth && pass_breadth {
        QcStatus::Pass
    } else {
        QcStatus::Fail
    };

    let mut comments = Vec::new();
    if !pass_depth {
        comments.push(format!("Median depth below {}", reqs.min_median_depth));
    }
    if !pass_breadth {
        comments.push(format!("Genome coverage below {:.0}%", reqs.min_genome_coverage * 100.0));
    }
    let comment = if pass_breadth { String::new() } else { comments.join("; ") };

    QcRecord {
        sample: sample.to_string(),
        ct_value,
        coverage: coverage.cloned(),
        mapping: mapping.cloned(),
        status,
        comment,
    }
}

/// QC records for every sample seen in either the depth or mapping data,
/// sorted by sample name
pub fn qc_records(
    depth: &BTreeMap<SampleId, CoverageRecord>,
    mapping: &BTreeMap<SampleId, MappingRecord>,
    ct_values: &BTreeMap<SampleId, f64>,
    reqs: &QualityRequirements,
) -> Vec<QcRecord> {
    let samples: BTreeSet<&SampleId> = depth.keys().chain(mapping.keys()).collect();

    samples
        .into_iter()
        .map(|sample| {
            classify(
                sample,
                depth.get(sample),
                mapping.get(sample),
                ct_values.get(sample).copied(),
                reqs,
            )
        })
        .collect()
}

fn qc_columns(include_ct: bool, low_coverage_threshold: u32) -> Vec<Column> {
    let t = low_coverage_threshold;
    let mut columns = vec![Column::new("Sample", "Sample name")];
    if include_ct {
        columns.push(Column::new(
            "Ct Value",
            "Real-time PCR cycle threshold (Ct) value supplied for the sample",
        ));
    }
    columns.extend([
        Column::new("QC Status", "Whether the sample passed (PASS) or failed (FAIL) quality control"),
        Column::new("QC Comment", "Reasons the sample failed quality control"),
        Column::new(
            "% Genome Coverage",
            format!("Fraction of the reference genome sequenced to a depth of at least {}X", t),
        ),
        Column::new("Mean Coverage Depth", "Mean read depth across the reference genome"),
        Column::new("Median Coverage Depth", "Median read depth across the reference genome"),
        Column::new("# Total Reads", "Total number of reads sequenced for the sample"),
        Column::new("# Mapped Reads", "Number of reads mapped to the reference genome"),
        Column::new("# 0X positions", "Number of reference positions with no read coverage"),
        Column::new(
            format!("# <{}X positions", t),
            format!("Number of reference positions with less than {}X read coverage", t),
        ),
        Column::new(
            "0X Coverage Regions",
            "1-based inclusive reference ranges with no read coverage",
        ),
        Column::new(
            format!("<{}X Coverage Regions", t),
            format!("1-based inclusive reference ranges with less than {}X read coverage", t),
        ),
    ]);
    columns
}

/// The Stats & QC sheet
///
/// The Ct Value column is only present when at least one sample has a Ct.
pub fn qc_table(records: &[QcRecord], reqs: &QualityRequirements) -> Table {
    let include_ct = records.iter().any(|r| r.ct_value.is_some());
    let mut table = Table::new(SheetName::QcStats, qc_columns(include_ct, reqs.low_coverage_threshold));

    for record in records {
        let coverage = record.coverage.as_ref();
        let mapping = record.mapping.as_ref();

        let mut row = vec![Cell::text(&record.sample)];
        if include_ct {
            row.push(record.ct_value.into());
        }
        row.extend([
            Cell::text(record.status.as_str()),
            Cell::text(&record.comment),
            coverage.map(|c| c.genome_coverage()).into(),
            coverage.map(|c| c.mean_coverage()).into(),
            coverage.map(|c| c.median_coverage()).into(),
            mapping.map(|m| m.n_total_reads).into(),
            mapping.map(|m| m.n_mapped_reads).into(),
            coverage.map(|c| c.n_zero_coverage()).into(),
            coverage.map(|c| c.n_low_coverage()).into(),
            Cell::opt_text(coverage.map(|c| c.zero_coverage_coords())),
            Cell::opt_text(coverage.map(|c| c.low_coverage_coords())),
        ]);
        table.push_row(row);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage(sample: &str, depth: u32, zero_tail: usize) -> CoverageRecord {
        let mut depths = vec![depth; 100 - zero_tail];
        depths.extend(vec![0; zero_tail]);
        CoverageRecord::from_depths(sample, &depths, 10)
    }

    #[test]
    fn test_pass() {
        let reqs = QualityRequirements::default();
        let cov = coverage("S1", 50, 2);
        let record = classify("S1", Some(&cov), None, None, &reqs);
        assert_eq!(record.status, QcStatus::Pass);
        assert_eq!(record.comment, "");
    }

    #[test]
    fn test_low_depth_comment_cleared_when_breadth_passes() {
        let reqs = QualityRequirements::default();
        let cov = coverage("S1", 20, 0);
        let record = classify("S1", Some(&cov), None, None, &reqs);
        assert_eq!(record.status, QcStatus::Fail);
        assert_eq!(record.comment, "");
    }

    #[test]
    fn test_both_fail() {
        let reqs = QualityRequirements::default();
        let cov = coverage("S1", 20, 10);
        let record = classify("S1", Some(&cov), None, None, &reqs);
        assert_eq!(record.status, QcStatus::Fail);
        assert_eq!(record.comment, "Median depth below 30; Genome coverage below 95%");
    }

    #[test]
    fn test_breadth_only_fail() {
        let reqs = QualityRequirements::default();
        let cov = coverage("S1", 100, 10);
        let record = classify("S1", Some(&cov), None, None, &reqs);
        assert_eq!(record.status, QcStatus::Fail);
        assert_eq!(record.comment, "Genome coverage below 95%");
    }

    #[test]
    fn test_missing_coverage_fails_both() {
        let reqs = QualityRequirements::default();
        let mapping = MappingRecord::new("S9", 1000, 900);
        let record = classify("S9", None, Some(&mapping), Some(25.0), &reqs);
        assert_eq!(record.status, QcStatus::Fail);
        assert_eq!(record.comment, "Median depth below 30; Genome coverage below 95%");
        assert_eq!(record.ct_value, Some(25.0));
    }

    #[test]
    fn test_ct_value_never_changes_outcome() {
        let reqs = QualityRequirements::default();
        let cases = [
            coverage("S1", 50, 0),
            coverage("S1", 20, 0),
            coverage("S1", 100, 10),
            coverage("S1", 5, 50),
        ];

        for cov in &cases {
            let without = classify("S1", Some(cov), None, None, &reqs);
            for ct in [12.0, 30.0, 45.5] {
                let with = classify("S1", Some(cov), None, Some(ct), &reqs);
                assert_eq!(with.status, without.status);
                assert_eq!(with.comment, without.comment);
                assert_eq!(with.ct_value, Some(ct));
            }
        }

        let without = classify("S2", None, None, None, &reqs);
        let with = classify("S2", None, None, Some(18.0), &reqs);
        assert_eq!((with.status, with.comment), (without.status, without.comment));
    }

    #[test]
    fn test_records_union_sorted() {
        let reqs = QualityRequirements::default();
        let depth = BTreeMap::from([("B".to_string(), coverage("B", 50, 0))]);
        let mapping = BTreeMap::from([
            ("C".to_string(), MappingRecord::new("C", 10, 5)),
            ("A".to_string(), MappingRecord::new("A", 10, 5)),
        ]);
        let records = qc_records(&depth, &mapping, &BTreeMap::new(), &reqs);
        let samples: Vec<&str> = records.iter().map(|r| r.sample.as_str()).collect();
        assert_eq!(samples, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_table_columns() {
        let reqs = QualityRequirements::default();
        let depth = BTreeMap::from([("S1".to_string(), coverage("S1", 50, 0))]);
        let records = qc_records(&depth, &BTreeMap::new(), &BTreeMap::new(), &reqs);

        let table = qc_table(&records, &reqs);
        assert_eq!(table.columns.len(), 12);
        assert_eq!(table.columns[9].name, "# <10X positions");
        assert_eq!(table.rows[0][1], Cell::text("PASS"));
        assert_eq!(table.rows[0][6], Cell::Empty);
        assert!(table.columns.iter().all(|c| c.description.is_some()));

        let ct = BTreeMap::from([("S1".to_string(), 21.5)]);
        let records = qc_records(&depth, &BTreeMap::new(), &ct, &reqs);
        let table = qc_table(&records, &reqs);
        assert_eq!(table.columns[1].name, "Ct Value");
        assert_eq!(table.rows[0][1], Cell::Float(21.5));
    }
}
