// ==============================================================================
// processor.rs - Report Assembly
// ==============================================================================
// Description: Collects every data source of a workflow output directory and
//              packages the results as an ordered list of named tables
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::locator::LocatorError;
use crate::models::{CoverageRecord, MappingRecord, QualityRequirements, SampleId};
use crate::parsers::{consensus, ct, depth, exec_report, fastp, flagstat, nextclade, pangolin, snpsift, vcf};
use crate::parsers::WorkflowExecInfo;
use crate::qc;
use crate::run_log::{Notice, RunLog};
use crate::table::{SheetName, Table};
use crate::variants;

const SOURCE: &str = "report";

/// Run-level information attached to a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub tool_version: String,
    pub input_dir: PathBuf,
    pub quality_requirements: QualityRequirements,
    pub workflow: Option<WorkflowExecInfo>,
    pub n_samples: usize,
    pub notices: Vec<Notice>,
}

/// Named report tables in display order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub tables: Vec<Table>,
}

impl Report {
    pub fn table(&self, sheet: SheetName) -> Option<&Table> {
        self.tables.iter().find(|t| t.sheet == sheet)
    }

    pub fn sheet_names(&self) -> Vec<SheetName> {
        self.tables.iter().map(|t| t.sheet).collect()
    }
}

/// Builds a [`Report`] from a workflow output directory
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    input_dir: PathBuf,
    quality: QualityRequirements,
    pangolin_lineage_csv: Option<PathBuf>,
    ct_table: Option<PathBuf>,
}

impl ReportBuilder {
    pub fn new(input_dir: impl Into<PathBuf>, quality: QualityRequirements) -> Self {
        Self {
            input_dir: input_dir.into(),
            quality,
            pangolin_lineage_csv: None,
            ct_table: None,
        }
    }

    /// Use this lineage report instead of searching the input directory
    pub fn with_pangolin_lineage_csv(mut self, path: impl Into<PathBuf>) -> Self {
        self.pangolin_lineage_csv = Some(path.into());
        self
    }

    pub fn with_ct_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.ct_table = Some(path.into());
        self
    }

    /// Collect all data sources and assemble the report
    ///
    /// Independent sources are read concurrently on the blocking pool. Only a
    /// missing input directory is fatal; a source with no files simply leaves
    /// its sheet out.
    pub async fn build(&self) -> Result<Report> {
        if !self.input_dir.is_dir() {
            anyhow::bail!("Input directory {:?} does not exist or is not a directory", self.input_dir);
        }
        info!("Building report from {:?}", self.input_dir);
        info!("Quality requirements: {:?}", self.quality);

        let root = self.input_dir.clone();
        let threshold = self.quality.low_coverage_threshold;
        let pangolin_csv = self.pangolin_lineage_csv.clone();
        let ct_path = self.ct_table.clone();

        let (
            (workflow, exec_log),
            (depth_info, depth_log),
            (mut mapping_info, mapping_log),
            (total_reads, fastp_log),
            (ct_values, ct_log),
            (caller_variants, vcf_log),
            (annotations, snpsift_log),
            (pangolin_table, pangolin_log),
            (nextclade_results, nextclade_log),
            (consensus_seqs, consensus_log),
        ) = tokio::try_join!(
            run_collector("exec_report", {
                let root = root.clone();
                move |log: &mut RunLog| Ok(exec_report::collect(&root, log))
            }),
            run_collector("depth", {
                let root = root.clone();
                move |log: &mut RunLog| depth::collect(&root, threshold, log)
            }),
            run_collector("flagstat", {
                let root = root.clone();
                move |log: &mut RunLog| flagstat::collect(&root, log)
            }),
            run_collector("fastp", {
                let root = root.clone();
                move |log: &mut RunLog| fastp::collect(&root, log)
            }),
            run_collector("ct", move |log: &mut RunLog| {
                Ok(ct_path.map(|path| ct::read_ct_table(&path, log)).unwrap_or_default())
            }),
            run_collector("vcf", {
                let root = root.clone();
                move |log: &mut RunLog| vcf::collect(&root, log)
            }),
            run_collector("snpsift", {
                let root = root.clone();
                move |log: &mut RunLog| snpsift::collect(&root, log)
            }),
            run_collector("pangolin", {
                let root = root.clone();
                move |log: &mut RunLog| Ok(pangolin::collect(&root, pangolin_csv.as_deref(), log))
            }),
            run_collector("nextclade", {
                let root = root.clone();
                move |log: &mut RunLog| nextclade::collect(&root, log)
            }),
            run_collector("consensus", {
                let root = root.clone();
                move |log: &mut RunLog| consensus::collect(&root, log)
            }),
        )?;

        let mut log = RunLog::new();
        for collector_log in [exec_log, depth_log, mapping_log, fastp_log, ct_log, vcf_log, snpsift_log] {
            log.extend(collector_log);
        }

        apply_fastp_totals(&mut mapping_info, &total_reads, &mut log);
        debug_records(&depth_info, &mapping_info, &mut log);

        let sample_variants = variants::merge_all(&caller_variants, &annotations, &mut log);

        let mut tables = Vec::new();

        let qc_records = qc::qc_records(&depth_info, &mapping_info, &ct_values, &self.quality);
        let n_samples = qc_records.len();
        log.info(SOURCE, None, format!("N samples: {}", n_samples));
        if !qc_records.is_empty() {
            tables.push(qc::qc_table(&qc_records, &self.quality));
        }

        log.extend(pangolin_log);
        tables.extend(pangolin_table);

        log.extend(nextclade_log);
        tables.extend(nextclade::to_table(&nextclade_results));

        let rows = variants::sorted_rows(&sample_variants);
        if let Some(table) = variants::variants_table(&rows) {
            tables.push(table);
            if rows.iter().any(|row| row.mutation().is_some()) {
                tables.extend(variants::variant_summary(&rows, self.quality.major_allele_freq));
                tables.extend(variants::variant_matrix(&rows));
            } else {
                log.warn(
                    SOURCE,
                    None,
                    "No column \"Mutation\" found in variant info. SnpEff/SnpSift table may not have \
                     been found or parsed correctly.",
                );
            }
        }

        log.extend(consensus_log);
        tables.extend(consensus::to_table(&consensus_seqs));

        if let Some(info) = &workflow {
            tables.push(exec_report::to_table(info));
        }

        info!(
            "Report assembled: {} sheets for {} samples ({} notices)",
            tables.len(),
            n_samples,
            log.notices().len()
        );

        Ok(Report {
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                tool_version: env!("CARGO_PKG_VERSION").to_string(),
                input_dir: self.input_dir.clone(),
                quality_requirements: self.quality,
                workflow,
                n_samples,
                notices: log.notices().to_vec(),
            },
            tables,
        })
    }
}

/// Run a file collector on the blocking pool with its own run log
async fn run_collector<T, F>(name: &'static str, collect: F) -> Result<(T, RunLog)>
where
    T: Send + 'static,
    F: FnOnce(&mut RunLog) -> Result<T, LocatorError> + Send + 'static,
{
    let (result, log) = tokio::task::spawn_blocking(move || {
        let mut log = RunLog::new();
        let result = collect(&mut log);
        (result, log)
    })
    .await
    .with_context(|| format!("{} collector task failed", name))?;

    let value = result.with_context(|| format!("Failed to locate {} files", name))?;
    Ok((value, log))
}

/// Prefer fastp's pre-filtering read totals over samtools' where they differ
pub fn apply_fastp_totals(
    mapping: &mut BTreeMap<SampleId, MappingRecord>,
    total_reads: &BTreeMap<SampleId, u64>,
    log: &mut RunLog,
) {
    for (sample, &total) in total_reads {
        let Some(record) = mapping.get_mut(sample) else {
            log.warn(
                "fastp",
                Some(sample),
                format!(
                    "Found fastp total reads ({}) for sample \"{}\", but no such sample exists in \
                     sample mapping info: {:?}",
                    total,
                    sample,
                    mapping.keys().collect::<Vec<_>>()
                ),
            );
            continue;
        };

        let (samtools_total, mapped) = (record.n_total_reads, record.n_mapped_reads);
        if record.override_total_reads(total) {
            log.info(
                "fastp",
                Some(sample),
                format!(
                    "Found fastp total reads ({}) for sample \"{}\". Samtools mapping info indicates \
                     total reads as {} ({} mapped). Using fastp value for total reads.",
                    total, sample, samtools_total, mapped
                ),
            );
        }
    }
}

fn debug_records(
    depth: &BTreeMap<SampleId, CoverageRecord>,
    mapping: &BTreeMap<SampleId, MappingRecord>,
    log: &mut RunLog,
) {
    for (sample, record) in depth {
        log.debug(
            "depth",
            Some(sample),
            format!(
                "length={} mean={:.2} median={} coverage={:.4}",
                record.ref_seq_length(),
                record.mean_coverage(),
                record.median_coverage(),
                record.genome_coverage()
            ),
        );
    }
    for (sample, record) in mapping {
        log.debug(
            "flagstat",
            Some(sample),
            format!("total={} mapped={}", record.n_total_reads, record.n_mapped_reads),
        );
    }
}

/// Build a report with default options
pub async fn build_report(input_dir: &Path, quality: QualityRequirements) -> Result<Report> {
    ReportBuilder::new(input_dir, quality).build().await
}
