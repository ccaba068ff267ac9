// ==============================================================================
// tests/report_end_to_end.rs - Full Report Assembly
// ==============================================================================
// Description: Builds a report from a synthetic three-sample workflow output
//              directory and checks every sheet
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use viral_report::models::QualityRequirements;
use viral_report::output::{OutputFormat, OutputGenerator};
use viral_report::processor::ReportBuilder;
use viral_report::table::{Cell, SheetName};

const CHROM: &str = "MN908947.3";
const VCF_COLUMNS: &str = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tSAMPLE";

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn ivar_vcf(n: u64) -> String {
    let mut vcf = format!("##fileformat=VCFv4.2\n##source=iVar\n{}\n", VCF_COLUMNS);
    for i in 1..=n {
        vcf.push_str(&format!(
            "{}\t{}\t.\tC\tT\t.\tPASS\tDP=100\tGT:REF_DP:REF_RV:REF_QUAL:ALT_DP:ALT_RV:ALT_QUAL:ALT_FREQ\t1:10:5:35:90:45:36:0.9\n",
            CHROM,
            i * 10
        ));
    }
    vcf
}

fn bcftools_vcf(n: u64) -> String {
    let mut vcf = format!("##fileformat=VCFv4.2\n##bcftoolsVersion=1.15\n{}\n", VCF_COLUMNS);
    for i in 1..=n {
        vcf.push_str(&format!(
            "{}\t{}\t.\tG\tA\t225\tPASS\tDP=80\tGT:PL:AD\t1:255,0:20,60\n",
            CHROM,
            i * 10 + 3
        ));
    }
    vcf
}

fn clair3_vcf(n: u64) -> String {
    let mut vcf = format!("##fileformat=VCFv4.2\n##source=Clair3\n{}\n", VCF_COLUMNS);
    for i in 1..=n {
        vcf.push_str(&format!(
            "{}\t{}\t.\tA\tG\t30\tPASS\tF\tGT:GQ:DP:AD:AF\t1/1:30:50:2,48:0.96\n",
            CHROM,
            i * 5 + 1
        ));
    }
    vcf
}

fn snpsift_table(n: u64) -> String {
    let mut table = String::from("CHROM\tPOS\tREF\tALT\tAC\tANN[*].GENE\tANN[*].EFFECT\tANN[*].AA\n");
    for i in 1..=n {
        table.push_str(&format!(
            "{}\t{}\tC\tT\t10,90\tORF1ab\tsynonymous_variant\t.\n",
            CHROM,
            i * 10
        ));
    }
    table
}

fn flagstat(total: u64, mapped: u64) -> String {
    format!(
        "{} + 0 in total (QC-passed reads + QC-failed reads)\n\
         0 + 0 secondary\n\
         {} + 0 mapped (95.00% : N/A)\n",
        total, mapped
    )
}

const EXEC_REPORT: &str = r#"<html><head><title>[tiny_turing] Nextflow Workflow Report</title></head><body>
<div class="container"><div class="row">
<dl>
<dt>Project directory</dt>
<dd>/pipelines/nf-virontus</dd>
<dt>Nextflow version</dt>
<dd>21.04.0</dd>
</dl>
</div>
<pre class="nfcommand">nextflow run nf-virontus -profile docker</pre>
<span id="workflow_start">2021-05-18 13:39</span>
<span id="workflow_complete">2021-05-18 14:02</span>
</div></body></html>"#;

/// Three samples: one passing, one with shallow depth, one with half the
/// genome uncovered
fn workflow_output(root: &Path) {
    write(&root.join("mosdepth/Sample1.per-base.bed.gz"), &format!("{}\t0\t1000\t100\n", CHROM));
    write(&root.join("mosdepth/Sample2.per-base.bed.gz"), &format!("{}\t0\t1000\t20\n", CHROM));
    write(
        &root.join("mosdepth/Sample3.per-base.bed.gz"),
        &format!("{}\t0\t500\t50\n{}\t500\t1000\t0\n", CHROM, CHROM),
    );

    write(&root.join("samtools/Sample1.flagstat"), &flagstat(10000, 9500));
    write(&root.join("samtools/Sample2.flagstat"), &flagstat(2000, 1800));
    write(&root.join("samtools/Sample3.flagstat"), &flagstat(5000, 2000));
    write(
        &root.join("fastp/Sample2.fastp.json"),
        r#"{"summary": {"before_filtering": {"total_reads": 2500}}}"#,
    );

    write(&root.join("ivar/Sample1.vcf"), &ivar_vcf(78));
    write(&root.join("bcftools/Sample2.vcf"), &bcftools_vcf(70));
    write(&root.join("clair3/Sample3.vcf"), &clair3_vcf(150));
    write(&root.join("ivar/snpeff/Sample1.snpSift.table.txt"), &snpsift_table(78));

    write(
        &root.join("pangolin/pangolin.lineage_report.csv"),
        "taxon,lineage,probability,status\nSample2,B.1.1.7,1.0,passed_qc\nSample1,B.1.617.2,0.98,passed_qc\n",
    );
    write(
        &root.join("nextclade/Sample1.csv"),
        "seqName;clade;qc.overallStatus\nconsensus;21A (Delta);good\n",
    );
    write(&root.join("consensus/Sample1.consensus.fasta"), ">Sample1\nACGTACGT\n");
    write(&root.join("pipeline_info/execution_report.html"), EXEC_REPORT);
}

#[tokio::test]
async fn test_three_sample_report() {
    let input = TempDir::new().unwrap();
    workflow_output(input.path());

    let extra = TempDir::new().unwrap();
    let ct_path = extra.path().join("ct.tsv");
    fs::write(&ct_path, "sample\tct\nSample1\t21.5\nSample3\t33.0\n").unwrap();

    let report = ReportBuilder::new(input.path(), QualityRequirements::default())
        .with_ct_table(&ct_path)
        .build()
        .await
        .unwrap();

    assert_eq!(
        report.sheet_names(),
        vec![
            SheetName::QcStats,
            SheetName::Pangolin,
            SheetName::Nextclade,
            SheetName::Variants,
            SheetName::VariantSummary,
            SheetName::VariantMatrix,
            SheetName::Consensus,
            SheetName::WorkflowInfo,
        ]
    );
    assert_eq!(report.metadata.n_samples, 3);
    let workflow = report.metadata.workflow.as_ref().unwrap();
    assert_eq!(workflow.execution_id, "tiny_turing");
    assert_eq!(workflow.workflow, "nf-virontus");

    // QC
    let qc = report.table(SheetName::QcStats).unwrap();
    assert_eq!(qc.len(), 3);
    assert_eq!(qc.columns[1].name, "Ct Value");
    let status: Vec<String> = qc.column("QC Status").unwrap().iter().map(|c| c.render()).collect();
    assert_eq!(status, vec!["PASS", "FAIL", "FAIL"]);
    let comments: Vec<String> = qc.column("QC Comment").unwrap().iter().map(|c| c.render()).collect();
    assert_eq!(
        comments,
        vec![
            "".to_string(),
            "".to_string(),
            "Median depth below 30; Genome coverage below 95%".to_string(),
        ]
    );
    let totals = qc.column("# Total Reads").unwrap();
    assert_eq!(*totals[1], Cell::Int(2500));
    let ct = qc.column("Ct Value").unwrap();
    assert_eq!(*ct[1], Cell::Empty);
    assert_eq!(qc.column("0X Coverage Regions").unwrap()[2].render(), "501-1000");

    // Variants
    let variants = report.table(SheetName::Variants).unwrap();
    assert_eq!(variants.len(), 78 + 70 + 150);
    let samples = variants.column("Sample").unwrap();
    let count = |name: &str| samples.iter().filter(|c| c.render() == name).count();
    assert_eq!((count("Sample1"), count("Sample2"), count("Sample3")), (78, 70, 150));

    let summary = report.table(SheetName::VariantSummary).unwrap();
    assert_eq!(summary.len(), 78);
    assert_eq!(summary.rows[0][0], Cell::text("C10T"));

    let matrix = report.table(SheetName::VariantMatrix).unwrap();
    assert_eq!(matrix.len(), 1);
    assert_eq!(matrix.columns.len(), 79);

    // Lineage, clade, consensus
    let pangolin = report.table(SheetName::Pangolin).unwrap();
    assert_eq!(pangolin.rows[0][0], Cell::text("Sample1"));
    let nextclade = report.table(SheetName::Nextclade).unwrap();
    assert_eq!(nextclade.rows[0][0], Cell::text("Sample1"));
    let consensus = report.table(SheetName::Consensus).unwrap();
    assert_eq!(consensus.rows[0][1], Cell::text("ACGTACGT"));

    // Every documented sheet column carries a description
    for sheet in [SheetName::QcStats, SheetName::VariantSummary, SheetName::Nextclade] {
        let table = report.table(sheet).unwrap();
        assert!(table.columns.iter().all(|c| c.description.is_some()), "{:?}", sheet);
    }

    let out = TempDir::new().unwrap();
    let written = OutputGenerator::new(out.path(), "run")
        .generate(&[OutputFormat::Tsv, OutputFormat::Json], &report)
        .await
        .unwrap();
    let tsv_dir = &written[&OutputFormat::Tsv];
    for table in &report.tables {
        assert!(tsv_dir.join(format!("{}.tsv", table.sheet.slug())).exists());
    }
    assert!(written[&OutputFormat::Json].exists());
}

#[tokio::test]
async fn test_missing_input_directory_is_fatal() {
    let dir = TempDir::new().unwrap();
    let result = ReportBuilder::new(dir.path().join("missing"), QualityRequirements::default())
        .build()
        .await;
    assert!(result.is_err());
}
