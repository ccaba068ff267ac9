// ==============================================================================
// main.rs - Viral Report Entry Point
// ==============================================================================
// Description: Command line entry point that assembles a QC report from a
//              viral-sequencing workflow output directory
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use viral_report::models::{QcPreset, QualityRequirements};
use viral_report::output::{OutputFormat, OutputGenerator};
use viral_report::processor::ReportBuilder;
use viral_report::run_log::LogSeverity;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Workflow output directory to summarize
    input_dir: PathBuf,

    /// Directory to write report files to
    #[arg(short, long, env = "VIRAL_REPORT_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Output file name prefix
    #[arg(long, default_value = "viral-report")]
    prefix: String,

    /// Output format (repeatable)
    #[arg(short, long = "format", value_enum, default_value = "json")]
    formats: Vec<OutputFormat>,

    /// Quality requirement preset
    #[arg(long, env = "VIRAL_REPORT_QC_PRESET", value_enum, default_value = "default")]
    qc_preset: QcPreset,

    /// Minimum fraction of the genome at or above the low coverage threshold
    #[arg(long)]
    min_genome_coverage: Option<f64>,

    /// Minimum median read depth
    #[arg(long)]
    min_median_depth: Option<u64>,

    /// Depth below which a position is low coverage
    #[arg(long)]
    low_coverage_threshold: Option<u32>,

    /// Allele frequency at or above which a variant is a major allele
    #[arg(long)]
    major_allele_freq: Option<f64>,

    /// Pangolin lineage report to use instead of searching the input directory
    #[arg(long)]
    pangolin_lineage_csv: Option<PathBuf>,

    /// Table of sample Ct values (.csv, .tsv, .txt, .xlsx or .ods)
    #[arg(long)]
    ct_table: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn quality_requirements(&self) -> QualityRequirements {
        let mut reqs = self.qc_preset.requirements();
        if let Some(v) = self.min_genome_coverage {
            reqs.min_genome_coverage = v;
        }
        if let Some(v) = self.min_median_depth {
            reqs.min_median_depth = v;
        }
        if let Some(v) = self.low_coverage_threshold {
            reqs.low_coverage_threshold = v;
        }
        if let Some(v) = self.major_allele_freq {
            reqs.major_allele_freq = v;
        }
        reqs
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let default_filter = if args.verbose {
        "viral_report=debug"
    } else {
        "viral_report=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Viral Report v{} starting...", env!("CARGO_PKG_VERSION"));

    let quality = args.quality_requirements();
    let mut builder = ReportBuilder::new(&args.input_dir, quality);
    if let Some(path) = &args.pangolin_lineage_csv {
        builder = builder.with_pangolin_lineage_csv(path);
    }
    if let Some(path) = &args.ct_table {
        builder = builder.with_ct_table(path);
    }

    let report = builder
        .build()
        .await
        .with_context(|| format!("Failed to build report from {:?}", args.input_dir))?;

    let generator = OutputGenerator::new(&args.output_dir, &args.prefix);
    let written = generator
        .generate(&args.formats, &report)
        .await
        .context("Failed to write report")?;

    for format in &args.formats {
        if let Some(path) = written.get(format) {
            info!("Wrote {:?} report: {:?}", format, path);
        }
    }

    let n_problems = report
        .metadata
        .notices
        .iter()
        .filter(|n| n.severity >= LogSeverity::Warning)
        .count();
    if n_problems > 0 {
        warn!("{} warnings/errors were recorded; see report metadata for details", n_problems);
    }

    info!(
        "Report complete: {} samples, {} sheets",
        report.metadata.n_samples,
        report.tables.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qc_preset_with_override() {
        let args = Args::try_parse_from([
            "viral-report",
            "results",
            "--qc-preset",
            "scov2_nanopore",
            "--min-median-depth",
            "20",
        ])
        .unwrap();
        assert_eq!(args.qc_preset, QcPreset::Scov2Nanopore);

        let reqs = args.quality_requirements();
        assert_eq!(reqs.min_median_depth, 20);
        assert_eq!(reqs.major_allele_freq, 0.75);
    }

    #[test]
    fn test_unknown_qc_preset_rejected() {
        let result = Args::try_parse_from(["viral-report", "results", "--qc-preset", "scov2_ilumina"]);
        assert!(result.is_err());
    }
}
