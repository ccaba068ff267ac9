// ==============================================================================
// parsers/vcf.rs - Variant Caller VCF Parser
// ==============================================================================
// Description: Per-sample variant rows from iVar and allelic-depth (Longshot,
//              Clair3, bcftools) VCF files
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// References:
// - VCF 4.2 format: https://samtools.github.io/hts-specs/VCFv4.2.pdf
// - noodles-vcf: https://docs.rs/noodles-vcf/0.82.0/noodles_vcf/
// - iVar variants: https://andersen-lab.github.io/ivar/html/manualpage.html
// ==============================================================================
// The caller dialect decides where allele depths live:
//   iVar          FORMAT REF_DP / ALT_DP / ALT_FREQ
//   Clair3        FORMAT AD (ref,alt) and AF
//   bcftools      FORMAT AD (ref,alt)
//   Longshot      INFO AC (ref,alt)
// ==============================================================================

use noodles_vcf as vcf;
use noodles_vcf::header::record::value::Collection;
use noodles_vcf::variant::record::AlternateBases;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::locator::{select_by_score, FileLocator, LocatorError, SelectorStrategy};
use crate::models::{CallerVariant, SampleId};
use crate::parsers::open_text;
use crate::run_log::RunLog;
use crate::sample_name::RemovalRule;
use crate::variants::{parse_format_fields, try_parse_number, FieldValue};

const SOURCE: &str = "vcf";

pub const GLOB_PATTERNS: &[&str] = &["**/ivar/*.vcf.gz", "**/*.vcf", "**/*.vcf.gz"];

/// VCF parsing errors
#[derive(Error, Debug)]
pub enum VcfError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid VCF header: {0}")]
    InvalidHeader(io::Error),

    #[error("Variant caller '{0}' is not implemented")]
    UnsupportedCaller(String),

    #[error("Record at POS {pos}: missing or invalid field {field}")]
    MissingField { pos: String, field: &'static str },
}

/// Variant caller that produced a VCF, as far as its depth fields go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantCaller {
    IVar,
    Longshot,
    Clair3,
    Bcftools,
    /// Unnamed caller reporting FORMAT AD
    AllelicDepth,
}

impl VariantCaller {
    /// Caller named by a `##source=` value
    pub fn from_source(source: &str) -> Option<Self> {
        let lower = source.trim().to_lowercase();
        if lower.starts_with("ivar") {
            Some(VariantCaller::IVar)
        } else if lower.starts_with("longshot") {
            Some(VariantCaller::Longshot)
        } else if lower.starts_with("clair3") {
            Some(VariantCaller::Clair3)
        } else if lower.starts_with("bcftools") {
            Some(VariantCaller::Bcftools)
        } else {
            None
        }
    }

    pub fn is_ivar(&self) -> bool {
        matches!(self, VariantCaller::IVar)
    }
}

impl fmt::Display for VariantCaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariantCaller::IVar => "iVar",
            VariantCaller::Longshot => "Longshot",
            VariantCaller::Clair3 => "Clair3",
            VariantCaller::Bcftools => "bcftools",
            VariantCaller::AllelicDepth => "allelic-depth",
        };
        f.write_str(name)
    }
}

/// VCF records with the header facts needed to pick a dialect
#[derive(Debug, Clone, Default)]
pub struct VcfTable {
    /// Value of the last `##source=` line
    pub source: Option<String>,
    /// Any `##bcftools...` meta line present
    pub bcftools_meta: bool,
    pub records: Vec<vcf::Record>,
    /// Records that could not be split into VCF fields, by record number
    pub unreadable: Vec<(usize, String)>,
}

impl VcfTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Decide the caller dialect
    ///
    /// A named `##source` wins. Without one, a bcftools meta line or the
    /// FORMAT keys of the first record decide.
    pub fn caller(&self) -> Result<VariantCaller, VcfError> {
        if let Some(source) = &self.source {
            return VariantCaller::from_source(source)
                .ok_or_else(|| VcfError::UnsupportedCaller(source.clone()));
        }
        if self.bcftools_meta {
            return Ok(VariantCaller::Bcftools);
        }

        let format = self
            .records
            .first()
            .map(|record| genotype_columns(record).0)
            .unwrap_or_default();
        let format_keys: Vec<&str> = format.split(':').collect();

        if format_keys.contains(&"REF_DP") && format_keys.contains(&"ALT_DP") {
            Ok(VariantCaller::IVar)
        } else if format_keys.contains(&"AD") {
            Ok(VariantCaller::AllelicDepth)
        } else {
            Err(VcfError::UnsupportedCaller("unknown".to_string()))
        }
    }
}

/// Read a plain, gzipped or bgzipped VCF into memory
pub fn read_vcf(path: &Path) -> Result<VcfTable, VcfError> {
    parse_vcf(open_text(path)?)
}

fn parse_vcf(inner: impl BufRead) -> Result<VcfTable, VcfError> {
    let mut reader = vcf::io::Reader::new(inner);
    let header = reader.read_header().map_err(VcfError::InvalidHeader)?;

    let mut table = VcfTable::default();

    for (key, collection) in header.other_records() {
        let key: &str = key.as_ref();
        if key == "source" {
            if let Collection::Unstructured(values) = collection {
                table.source = values.last().map(|v| v.trim().to_string());
            }
        } else if key.starts_with("bcftools") {
            table.bcftools_meta = true;
        }
    }

    for (idx, result) in reader.records().enumerate() {
        match result {
            Ok(record) => table.records.push(record),
            Err(e) => table.unreadable.push((idx + 1, e.to_string())),
        }
    }

    Ok(table)
}

/// FORMAT keys and the values of the last sample column
///
/// Both are empty when the record has no genotype columns.
fn genotype_columns(record: &vcf::Record) -> (String, String) {
    let samples = record.samples();
    let raw: &str = samples.as_ref();

    let mut columns = raw.split('\t');
    let format = columns.next().unwrap_or_default().to_string();
    let values = columns.last().unwrap_or_default().to_string();
    (format, values)
}

/// Normalise one VCF record into a caller variant row
fn parse_record(record: &vcf::Record, caller: VariantCaller, sample: &str) -> Result<CallerVariant, VcfError> {
    let pos = match record.variant_start() {
        Some(Ok(position)) => position.get() as u64,
        _ => {
            return Err(VcfError::MissingField {
                pos: String::from("."),
                field: "POS",
            })
        }
    };
    let missing = |field: &'static str| VcfError::MissingField {
        pos: pos.to_string(),
        field,
    };

    let ref_allele = record.reference_bases().to_string();
    if ref_allele.is_empty() {
        return Err(missing("REF"));
    }
    let alt_allele = record
        .alternate_bases()
        .iter()
        .collect::<io::Result<Vec<_>>>()
        .map_err(|_| missing("ALT"))?
        .join(",");
    if alt_allele.is_empty() {
        return Err(missing("ALT"));
    }

    let (format, values) = genotype_columns(record);
    let fields = if values.is_empty() {
        BTreeMap::new()
    } else {
        parse_format_fields(&format, &values)
    };

    let (ref_dp, alt_dp, alt_freq) = if caller.is_ivar() {
        let ref_dp = depth(fields.get("REF_DP"), 0).ok_or_else(|| missing("REF_DP"))?;
        let alt_dp = depth(fields.get("ALT_DP"), 0).ok_or_else(|| missing("ALT_DP"))?;
        let alt_freq = fields
            .get("ALT_FREQ")
            .and_then(FieldValue::as_f64)
            .ok_or_else(|| missing("ALT_FREQ"))?;
        (ref_dp, alt_dp, alt_freq)
    } else {
        let info = record.info();
        let info_ac = info_field(info.as_ref(), "AC");
        let allele_depths = fields.get("AD").or(info_ac.as_ref());

        let ref_dp = depth(allele_depths, 0).ok_or_else(|| missing("AD"))?;
        let alt_dp = depth(allele_depths, 1).ok_or_else(|| missing("AD"))?;
        let total = ref_dp + alt_dp;
        let alt_freq = match fields.get("AF").and_then(FieldValue::as_f64) {
            Some(af) => af,
            None if total > 0 => alt_dp as f64 / total as f64,
            None => 0.0,
        };
        (ref_dp, alt_dp, alt_freq)
    };

    Ok(CallerVariant {
        sample: sample.to_string(),
        chrom: record.reference_sequence_name().to_string(),
        pos,
        ref_allele,
        alt_allele,
        ref_dp,
        alt_dp,
        dp: ref_dp + alt_dp,
        alt_freq,
    })
}

/// Element `idx` of a depth value, scalar values counting as index 0
fn depth(value: Option<&FieldValue>, idx: usize) -> Option<u64> {
    let value = value?;
    let element = match value {
        FieldValue::List(items) => items.get(idx)?,
        scalar if idx == 0 => scalar,
        _ => return None,
    };
    element.as_i64().and_then(|v| u64::try_from(v).ok())
}

fn info_field(info: &str, key: &str) -> Option<FieldValue> {
    info.split(';').find_map(|entry| {
        let (k, v) = entry.split_once('=')?;
        (k == key).then(|| try_parse_number(v))
    })
}

/// Normalised caller rows for one sample's VCF
///
/// Malformed records are logged and skipped. An unrecognised caller is an
/// error for the whole file.
pub fn caller_variants(
    table: &VcfTable,
    sample: &str,
    log: &mut RunLog,
) -> Result<Vec<CallerVariant>, VcfError> {
    if table.is_empty() {
        return Ok(Vec::new());
    }

    let caller = table.caller()?;
    log.debug(SOURCE, Some(sample), format!("{} VCF with {} records", caller, table.len()));

    for (number, e) in &table.unreadable {
        log.warn(SOURCE, Some(sample), format!("Skipping unreadable record {}: {}", number, e));
    }

    let mut variants = Vec::with_capacity(table.len());
    for record in &table.records {
        match parse_record(record, caller, sample) {
            Ok(variant) => variants.push(variant),
            Err(e) => log.warn(SOURCE, Some(sample), format!("Skipping record: {}", e)),
        }
    }

    Ok(variants)
}

/// Prefer the VCF with the most records
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxVariantRows;

impl SelectorStrategy for MaxVariantRows {
    fn select(&self, candidates: &[PathBuf]) -> Option<PathBuf> {
        select_by_score(candidates, |path| read_vcf(path).ok().map(|table| table.len()))
    }

    fn name(&self) -> &'static str {
        "max-variant-rows"
    }
}

pub fn sample_name_rules() -> Result<Vec<RemovalRule>, regex::Error> {
    Ok(vec![
        RemovalRule::pattern(r"\.vcf(\.gz)?$")?,
        RemovalRule::pattern(r"\.AF0\.\d+")?,
    ])
}

/// Caller variant rows for every sample with a VCF under `root`
///
/// Samples whose VCF has no records, cannot be read or comes from an
/// unsupported caller are absent from the result.
pub fn collect(root: &Path, log: &mut RunLog) -> Result<BTreeMap<SampleId, Vec<CallerVariant>>, LocatorError> {
    let files = FileLocator::new(GLOB_PATTERNS)
        .with_rules(sample_name_rules()?)
        .with_selector(MaxVariantRows)
        .locate(root)?;

    let mut out = BTreeMap::new();
    for (sample, path) in files {
        let table = match read_vcf(&path) {
            Ok(table) => table,
            Err(e) => {
                log.warn(SOURCE, Some(&sample), format!("Skipping VCF {}: {}", path.display(), e));
                continue;
            }
        };

        match caller_variants(&table, &sample, log) {
            Ok(variants) if variants.is_empty() => log.warn(
                SOURCE,
                Some(&sample),
                format!("Sample \"{}\" has no entries in VCF \"{}\"", sample, path.display()),
            ),
            Ok(variants) => {
                out.insert(sample, variants);
            }
            Err(e) => log.error(SOURCE, Some(&sample), format!("{}: {}", path.display(), e)),
        }
    }

    Ok(out)
}
