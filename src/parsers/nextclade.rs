// ==============================================================================
// parsers/nextclade.rs - Nextclade CSV Parser
// ==============================================================================
// Description: Clade assignments and QC metrics from per-sample Nextclade
//              semicolon-delimited CSV output
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use std::collections::BTreeMap;
use std::path::Path;

use crate::locator::{FileLocator, LocatorError};
use crate::models::SampleId;
use crate::parsers::{CsvTableError, DelimitedTable};
use crate::run_log::RunLog;
use crate::sample_name::RemovalRule;
use crate::table::{Cell, Column, SheetName, Table};

const SOURCE: &str = "nextclade";

pub const GLOB_PATTERNS: &[&str] = &["**/nextclade/*.csv"];

/// (Nextclade column, report header, description), in report order
pub const NEXTCLADE_COLUMNS: &[(&str, &str, &str)] = &[
    ("seqName", "Sample", "Sample name."),
    ("clade", "Clade", "The result of the clade assignment of a sequence, as defined by Nextstrain."),
    // status
    ("qc.overallStatus", "QC: Overall Status", "Overall quality control assessment status by Nextclade"),
    ("qc.missingData.status", "QC: Missing Data Status", "Missing data status according to Nextclade quality control assessment."),
    ("qc.mixedSites.status", "QC: Mixed Sites Status", "Mixed sites status according to Nextclade quality control assessment."),
    ("qc.privateMutations.status", "QC: Private Mutations Status", "Private mutations status according to Nextclade quality control assessment."),
    ("qc.snpClusters.status", "QC: Mutation Clusters Status", "Mutation clusters status according to Nextclade quality control assessment."),
    // totals
    ("totalGaps", "# Gaps", "Number of `-` characters (gaps) in the sequence."),
    ("totalInsertions", "# Insertions", "Number of insertions in the sequence."),
    ("totalMissing", "# Missing", "Number of missing sites in the sequence."),
    ("totalMutations", "# Mutations", "Number of mutations in the sequence relative to Wuhan-Hu-1 (MN908947.3) SARS-CoV-2 sequence."),
    ("totalNonACGTNs", "# non-ACGTN", "Number of non-nucleotide (A, C, G, or T) or N characters in the sequence."),
    ("totalPcrPrimerChanges", "# PCR primer changes", "Total number of changes to known PCR primers as a result of mutations."),
    ("totalAminoacidSubstitutions", "# Amino Acid Substitutions", "Number of amino acid substitution mutations in the sequence."),
    ("totalAminoacidDeletions", "# Amino Acid Deletions", "Number of amino acid deletion mutations in the sequence."),
    ("qc.missingData.totalMissing", "QC: # Missing Data", "Number of missing data sites according to Nextclade quality control assessment."),
    ("qc.mixedSites.totalMixedSites", "QC: # Mixed Sites", "Number of mixed sites according to Nextclade quality control assessment."),
    ("qc.privateMutations.total", "QC: # Private Mutations", "Number of private mutations according to Nextclade quality control assessment."),
    ("qc.snpClusters.totalSNPs", "QC: # Mutation Clusters", "Number of mutation clusters according to Nextclade quality control assessment."),
    ("qc.privateMutations.excess", "QC: Private Mutations Excess", "Number of excess private mutations according to Nextclade quality control assessment."),
    // lists
    ("substitutions", "Substitutions", "List of substitution mutations in the sequence."),
    ("deletions", "Deletions", "List of deletion mutations in the sequence."),
    ("insertions", "Insertions", "List of insertion mutations in the sequence."),
    ("missing", "Missing", "List of missing sites in the sequence."),
    ("nonACGTNs", "nonACGTNs", "List of non-ACGTN sites in the sequence."),
    ("pcrPrimerChanges", "PCR primer changes", "List of PCR primer changes in the sequence."),
    ("aaSubstitutions", "Amino Acid Substitutions", "List of amino acid substitution mutations in the sequence."),
    ("aaDeletions", "Amino Acid Deletions", "List of amino acid deletion mutations in the sequence."),
    ("qc.snpClusters.clusteredSNPs", "QC: Mutation Clusters", "Clustered mutations according to Nextclade quality control assessment."),
    // thresholds
    ("qc.missingData.missingDataThreshold", "QC: Missing Data Threshold", "Missing data threshold according to Nextclade quality control assessment."),
    ("qc.mixedSites.mixedSitesThreshold", "QC: Mixed Sites Threshold", "Threshold for number of mixed sites for Nextclade quality control assessment."),
    ("qc.privateMutations.cutoff", "QC: Private Mutations Cutoff", "Cutoff for number of private mutations for Nextclade quality control assessment."),
    // scores
    ("qc.overallScore", "QC: Overall Score", "Overall quality control assessment score by Nextclade"),
    ("qc.missingData.score", "QC: Missing Data Score", "Missing data score according to Nextclade quality control assessment."),
    ("qc.mixedSites.score", "QC: Mixed Sites Score", "Mixed sites score according to Nextclade quality control assessment."),
    ("qc.privateMutations.score", "QC: Private Mutations Score", "Private mutations score according to Nextclade quality control assessment."),
    ("qc.snpClusters.score", "QC: Mutation Clusters Score", "Mutation clusters score according to Nextclade quality control assessment."),
    // alignment
    ("alignmentEnd", "Alignment End", "Nextalign alignment end index."),
    ("alignmentScore", "Alignment Score", "Nextalign alignment score."),
    ("alignmentStart", "Alignment Start", "Nextalign alignment start."),
    ("errors", "Nextclade errors", "Nextclade errors"),
];

/// One sample's Nextclade rows, keyed by Nextclade column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NextcladeResult {
    pub sample: SampleId,
    pub rows: Vec<BTreeMap<String, String>>,
}

pub fn sample_name_rules() -> Result<Vec<RemovalRule>, regex::Error> {
    Ok(vec![RemovalRule::pattern(r"\.csv$")?])
}

/// Read one Nextclade CSV; the sample column is set to `sample`
pub fn read_nextclade_csv(path: &Path, sample: &str) -> Result<NextcladeResult, CsvTableError> {
    let csv = DelimitedTable::read(path, b';')?;
    Ok(from_table(csv, sample))
}

fn from_table(csv: DelimitedTable, sample: &str) -> NextcladeResult {
    let rows = csv
        .rows
        .iter()
        .map(|row| {
            let mut fields: BTreeMap<String, String> = csv
                .headers
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect();
            fields.insert("seqName".to_string(), sample.to_string());
            fields
        })
        .collect();

    NextcladeResult {
        sample: sample.to_string(),
        rows,
    }
}

/// Nextclade results for every sample with a Nextclade CSV under `root`
pub fn collect(root: &Path, log: &mut RunLog) -> Result<BTreeMap<SampleId, NextcladeResult>, LocatorError> {
    let files = FileLocator::new(GLOB_PATTERNS)
        .with_rules(sample_name_rules()?)
        .locate(root)?;
    log.info(SOURCE, None, format!("Found {} Nextclade CSV files. Parsing...", files.len()));

    let mut out = BTreeMap::new();
    for (sample, path) in files {
        match read_nextclade_csv(&path, &sample) {
            Ok(result) => {
                out.insert(sample, result);
            }
            Err(e) => log.warn(
                SOURCE,
                Some(&sample),
                format!("Skipping Nextclade CSV {}: {}", path.display(), e),
            ),
        }
    }

    Ok(out)
}

/// The Nextclade sheet
///
/// Only known Nextclade columns present in at least one file are kept, in
/// the fixed report order. Rows are sorted by sample.
pub fn to_table(results: &BTreeMap<SampleId, NextcladeResult>) -> Option<Table> {
    let rows: Vec<&BTreeMap<String, String>> = results.values().flat_map(|r| r.rows.iter()).collect();
    if rows.is_empty() {
        return None;
    }

    let present: Vec<&(&str, &str, &str)> = NEXTCLADE_COLUMNS
        .iter()
        .filter(|(name, _, _)| rows.iter().any(|row| row.contains_key(*name)))
        .collect();

    let columns = present
        .iter()
        .map(|&&(_, title, description)| Column::new(title, description))
        .collect();
    let mut table = Table::new(SheetName::Nextclade, columns);

    for row in rows {
        table.push_row(
            present
                .iter()
                .map(|(name, _, _)| match row.get(*name) {
                    Some(value) if *name == "seqName" => Cell::text(value),
                    Some(value) => Cell::infer(value),
                    None => Cell::Empty,
                })
                .collect(),
        );
    }

    Some(table)
}
