// ==============================================================================
// models.rs - Per-Sample Report Data Models
// ==============================================================================
// Description: Data structures for coverage, mapping, QC and variant records
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};

/// Canonical sample identifier resolved from a file name
pub type SampleId = String;

/// Thresholds used to classify a sample as PASS or FAIL
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityRequirements {
    /// Minimum fraction of the genome at or above `low_coverage_threshold`
    pub min_genome_coverage: f64,

    /// Minimum median read depth
    pub min_median_depth: u64,

    /// Depth below which a position counts as low coverage
    pub low_coverage_threshold: u32,

    /// Alternate allele frequency at or above which a variant is a major allele
    pub major_allele_freq: f64,
}

impl Default for QualityRequirements {
    fn default() -> Self {
        Self {
            min_genome_coverage: 0.95,
            min_median_depth: 30,
            low_coverage_threshold: 10,
            major_allele_freq: 0.75,
        }
    }
}

/// Named sets of quality requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum QcPreset {
    Default,
    #[value(name = "scov2_illumina", alias = "scov2-illumina")]
    Scov2Illumina,
    #[value(name = "scov2_nanopore", alias = "scov2-nanopore")]
    Scov2Nanopore,
}

impl QcPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QcPreset::Default => "default",
            QcPreset::Scov2Illumina => "scov2_illumina",
            QcPreset::Scov2Nanopore => "scov2_nanopore",
        }
    }

    pub fn requirements(&self) -> QualityRequirements {
        match self {
            QcPreset::Default => QualityRequirements::default(),
            QcPreset::Scov2Illumina => QualityRequirements {
                min_genome_coverage: 0.95,
                min_median_depth: 30,
                low_coverage_threshold: 5,
                ..QualityRequirements::default()
            },
            QcPreset::Scov2Nanopore => QualityRequirements {
                min_genome_coverage: 0.95,
                min_median_depth: 50,
                low_coverage_threshold: 10,
                ..QualityRequirements::default()
            },
        }
    }
}

/// Depth-of-coverage summary for one sample
///
/// Built once from a dense per-position depth array (see
/// [`crate::coverage::CoverageRecord::from_depths`]) and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageRecord {
    pub(crate) sample: SampleId,
    pub(crate) n_zero_coverage: usize,
    pub(crate) zero_coverage_coords: String,
    pub(crate) low_coverage_threshold: u32,
    pub(crate) n_low_coverage: usize,
    pub(crate) low_coverage_coords: String,
    pub(crate) genome_coverage: f64,
    pub(crate) mean_coverage: f64,
    pub(crate) median_coverage: u64,
    pub(crate) ref_seq_length: usize,
}

impl CoverageRecord {
    pub fn sample(&self) -> &str {
        &self.sample
    }

    pub fn n_zero_coverage(&self) -> usize {
        self.n_zero_coverage
    }

    /// 1-based inclusive ranges of zero depth, `"; "`-joined
    pub fn zero_coverage_coords(&self) -> &str {
        &self.zero_coverage_coords
    }

    pub fn low_coverage_threshold(&self) -> u32 {
        self.low_coverage_threshold
    }

    pub fn n_low_coverage(&self) -> usize {
        self.n_low_coverage
    }

    /// 1-based inclusive ranges below the low coverage threshold
    pub fn low_coverage_coords(&self) -> &str {
        &self.low_coverage_coords
    }

    /// Fraction of positions with depth >= low coverage threshold
    pub fn genome_coverage(&self) -> f64 {
        self.genome_coverage
    }

    pub fn mean_coverage(&self) -> f64 {
        self.mean_coverage
    }

    pub fn median_coverage(&self) -> u64 {
        self.median_coverage
    }

    pub fn ref_seq_length(&self) -> usize {
        self.ref_seq_length
    }
}

/// Read mapping summary for one sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingRecord {
    pub sample: SampleId,
    pub n_total_reads: u64,
    pub n_mapped_reads: u64,
    #[serde(skip)]
    total_overridden: bool,
}

impl MappingRecord {
    pub fn new(sample: impl Into<SampleId>, n_total_reads: u64, n_mapped_reads: u64) -> Self {
        Self {
            sample: sample.into(),
            n_total_reads,
            n_mapped_reads,
            total_overridden: false,
        }
    }

    /// Replace the total read count with an independent count
    ///
    /// Applies only when the counts disagree and only once per record.
    /// Returns `true` if the total was changed.
    pub fn override_total_reads(&mut self, total_reads: u64) -> bool {
        if self.total_overridden || total_reads == self.n_total_reads {
            return false;
        }
        self.n_total_reads = total_reads;
        self.total_overridden = true;
        true
    }

    pub fn is_total_overridden(&self) -> bool {
        self.total_overridden
    }
}

/// Two-valued QC outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QcStatus {
    Pass,
    Fail,
}

impl QcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QcStatus::Pass => "PASS",
            QcStatus::Fail => "FAIL",
        }
    }
}

/// Coverage + mapping + Ct merged for one sample with its QC outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QcRecord {
    pub sample: SampleId,
    pub ct_value: Option<f64>,
    pub coverage: Option<CoverageRecord>,
    pub mapping: Option<MappingRecord>,
    pub status: QcStatus,
    pub comment: String,
}

/// Variant row as reported by the variant caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallerVariant {
    pub sample: SampleId,
    pub chrom: String,
    pub pos: u64,
    pub ref_allele: String,
    pub alt_allele: String,
    pub ref_dp: u64,
    pub alt_dp: u64,
    /// Always `ref_dp + alt_dp`
    pub dp: u64,
    pub alt_freq: f64,
}

/// Variant row as reported by the effect annotation table (SnpSift)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedVariant {
    pub sample: SampleId,
    pub chrom: Option<String>,
    pub pos: u64,
    pub ref_allele: String,
    pub alt_allele: String,
    pub gene: Option<String>,
    pub impact: Option<String>,
    pub effect: Option<String>,
    /// Protein change in three-letter notation, e.g. `p.Asp614Gly`
    pub aa: Option<String>,
    pub aa_pos: Option<String>,
    pub aa_len: Option<String>,
    pub ref_ac: Option<u64>,
    pub alt_ac: Option<u64>,
    /// Allele-count derived alternate allele frequency
    pub af: Option<f64>,
    pub mutation: String,
}

/// One reported variant, shaped by which source(s) contributed it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum VariantRow {
    CallerOnly(CallerVariant),
    AnnotationOnly(AnnotatedVariant),
    Merged {
        caller: CallerVariant,
        annotation: AnnotatedVariant,
    },
}

impl VariantRow {
    pub fn sample(&self) -> &str {
        match self {
            VariantRow::CallerOnly(c) => &c.sample,
            VariantRow::AnnotationOnly(a) => &a.sample,
            VariantRow::Merged { caller, .. } => &caller.sample,
        }
    }

    pub fn pos(&self) -> u64 {
        match self {
            VariantRow::CallerOnly(c) => c.pos,
            VariantRow::AnnotationOnly(a) => a.pos,
            VariantRow::Merged { caller, .. } => caller.pos,
        }
    }

    /// Mutation label, present only when annotation contributed
    pub fn mutation(&self) -> Option<&str> {
        match self {
            VariantRow::CallerOnly(_) => None,
            VariantRow::AnnotationOnly(a) => Some(&a.mutation),
            VariantRow::Merged { annotation, .. } => Some(&annotation.mutation),
        }
    }

    /// Caller allele frequency, falling back to the allele-count frequency
    pub fn alt_freq(&self) -> Option<f64> {
        match self {
            VariantRow::CallerOnly(c) => Some(c.alt_freq),
            VariantRow::AnnotationOnly(a) => a.af,
            VariantRow::Merged { caller, .. } => Some(caller.alt_freq),
        }
    }

    pub fn annotation(&self) -> Option<&AnnotatedVariant> {
        match self {
            VariantRow::CallerOnly(_) => None,
            VariantRow::AnnotationOnly(a) => Some(a),
            VariantRow::Merged { annotation, .. } => Some(annotation),
        }
    }
}
