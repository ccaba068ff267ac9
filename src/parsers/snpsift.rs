// ==============================================================================
// parsers/snpsift.rs - SnpSift Annotation Table Parser
// ==============================================================================
// Description: Variant effect annotations from `SnpSift extractFields` tables
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Format (tab-delimited with header):
//   CHROM  POS    REF  ALT  AC     ANN[*].GENE  ANN[*].EFFECT     ANN[*].AA ...
//   MN...  23403  A    G    2,98   S,S          missense_variant  p.Asp614Gly
// Per-annotation columns (`XXX[*].FIELD`) keep only their first value.
// ==============================================================================

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::locator::{select_by_score, FileLocator, LocatorError, SelectorStrategy};
use crate::models::{AnnotatedVariant, SampleId};
use crate::parsers::DelimitedTable;
use crate::run_log::RunLog;
use crate::sample_name::RemovalRule;
use crate::variants::mutation_label;

const SOURCE: &str = "snpsift";

pub const GLOB_PATTERNS: &[&str] = &["**/ivar/**/*.snpSift.table.txt", "**/*.snpSift.table.txt"];

#[derive(Error, Debug)]
pub enum SnpSiftError {
    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),
}

/// Column lookup over a SnpSift table with per-annotation names simplified
struct SimplifiedColumns {
    by_name: HashMap<String, usize>,
    allele_counts: Option<usize>,
}

impl SimplifiedColumns {
    fn new(headers: &[String]) -> Self {
        let mut by_name = HashMap::new();
        let mut allele_counts = None;

        for (idx, header) in headers.iter().enumerate() {
            if header == "AC" {
                allele_counts = Some(idx);
                continue;
            }
            let name = match header.find("[*].") {
                Some(at) if at > 0 => header[at + 4..].to_lowercase(),
                _ => header.clone(),
            };
            // First occurrence of a simplified name wins
            by_name.entry(name).or_insert(idx);
        }

        Self { by_name, allele_counts }
    }

    /// First comma-separated value of `name` in `row`
    fn get<'a>(&self, row: &'a [String], name: &str) -> Option<&'a str> {
        let value = row.get(*self.by_name.get(name)?)?;
        value.split(',').next().map(str::trim)
    }

    fn require(&self, name: &'static str) -> Result<(), SnpSiftError> {
        if self.by_name.contains_key(name) {
            Ok(())
        } else {
            Err(SnpSiftError::MissingColumn(name))
        }
    }
}

/// Split an `AC` value (`"ref,alt"`) into counts and the derived frequency
fn allele_counts(value: &str) -> (Option<u64>, Option<u64>, Option<f64>) {
    let mut parts = value.splitn(2, ',');
    let ref_ac = parts.next().and_then(|v| v.trim().parse::<u64>().ok());
    let alt_ac = parts.next().and_then(|v| v.trim().parse::<u64>().ok());
    let af = match (ref_ac, alt_ac) {
        (Some(r), Some(a)) if r + a > 0 => Some(a as f64 / (r + a) as f64),
        _ => None,
    };
    (ref_ac, alt_ac, af)
}

/// Annotated variants of one sample's SnpSift table
///
/// Rows with an unparseable position are logged and skipped.
pub fn annotated_variants(
    table: &DelimitedTable,
    sample: &str,
    log: &mut RunLog,
) -> Result<Vec<AnnotatedVariant>, SnpSiftError> {
    if table.is_empty() {
        return Ok(Vec::new());
    }

    let columns = SimplifiedColumns::new(&table.headers);
    for required in ["POS", "REF", "ALT"] {
        columns.require(required)?;
    }

    let mut out = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let owned = |name: &str| columns.get(row, name).map(str::to_string);

        let Some(pos) = columns.get(row, "POS").and_then(|p| p.parse::<u64>().ok()) else {
            log.warn(SOURCE, Some(sample), format!("Skipping row with invalid POS: {:?}", row));
            continue;
        };
        let ref_allele = owned("REF").unwrap_or_default();
        let alt_allele = owned("ALT").unwrap_or_default();

        let (ref_ac, alt_ac, af) = columns
            .allele_counts
            .and_then(|idx| row.get(idx))
            .map(|v| allele_counts(v))
            .unwrap_or((None, None, None));

        let gene = owned("gene");
        let effect = owned("effect");
        let aa = owned("aa").or_else(|| owned("hgvs_p"));
        let aa_pos = owned("aa_pos");

        let mutation = mutation_label(
            gene.as_deref().unwrap_or(""),
            &ref_allele,
            &alt_allele,
            pos,
            aa_pos.as_deref(),
            aa.as_deref().unwrap_or("."),
            effect.as_deref().unwrap_or(""),
        );

        out.push(AnnotatedVariant {
            sample: sample.to_string(),
            chrom: owned("CHROM"),
            pos,
            ref_allele,
            alt_allele,
            gene,
            impact: owned("impact"),
            effect,
            aa,
            aa_pos,
            aa_len: owned("aa_len"),
            ref_ac,
            alt_ac,
            af,
            mutation,
        });
    }

    Ok(out)
}

pub fn read_snpsift_table(path: &Path) -> Result<DelimitedTable, SnpSiftError> {
    Ok(DelimitedTable::read(path, b'\t')?)
}

/// Prefer the SnpSift table with the most rows
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxTableRows;

impl SelectorStrategy for MaxTableRows {
    fn select(&self, candidates: &[PathBuf]) -> Option<PathBuf> {
        select_by_score(candidates, |path| read_snpsift_table(path).ok().map(|t| t.rows.len()))
    }

    fn name(&self) -> &'static str {
        "max-table-rows"
    }
}

pub fn sample_name_rules() -> Result<Vec<RemovalRule>, regex::Error> {
    Ok(vec![
        RemovalRule::pattern(r"\.snpSift\.table\.txt$")?,
        RemovalRule::pattern(r"\.AF0\.\d+")?,
    ])
}

/// Annotated variants for every sample with a SnpSift table under `root`
pub fn collect(
    root: &Path,
    log: &mut RunLog,
) -> Result<BTreeMap<SampleId, Vec<AnnotatedVariant>>, LocatorError> {
    let files = FileLocator::new(GLOB_PATTERNS)
        .with_rules(sample_name_rules()?)
        .with_selector(MaxTableRows)
        .locate(root)?;

    let mut out = BTreeMap::new();
    for (sample, path) in files {
        let parsed = read_snpsift_table(&path).and_then(|t| annotated_variants(&t, &sample, log));
        match parsed {
            Ok(variants) if variants.is_empty() => log.warn(
                SOURCE,
                Some(&sample),
                format!("Sample \"{}\" has no entries in SnpSift table \"{}\"", sample, path.display()),
            ),
            Ok(variants) => {
                out.insert(sample, variants);
            }
            Err(e) => log.warn(
                SOURCE,
                Some(&sample),
                format!("Skipping SnpSift table {}: {}", path.display(), e),
            ),
        }
    }

    Ok(out)
}
