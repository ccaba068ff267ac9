// ==============================================================================
// variants.rs - Variant Merging and Mutation Labels
// ==============================================================================
// Description: Reconcile caller and annotation variant tables per sample,
//              derive nucleotide/amino-acid mutation labels and build the
//              variant, summary and frequency-matrix tables
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use crate::models::{AnnotatedVariant, CallerVariant, SampleId, VariantRow};
use crate::run_log::RunLog;
use crate::table::{Cell, Column, SheetName, Table};

const SOURCE: &str = "variants";

// ==============================================================================
// GENOTYPE FORMAT FIELDS
// ==============================================================================

/// Value of one genotype-format (or INFO) field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Parse an integer, then a float, else keep the text
///
/// Comma-separated values become a [`FieldValue::List`] of parsed elements.
pub fn try_parse_number(s: &str) -> FieldValue {
    if s.contains(',') {
        return FieldValue::List(s.split(',').map(try_parse_number).collect());
    }
    if let Ok(i) = s.parse::<i64>() {
        return FieldValue::Int(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return FieldValue::Float(f);
    }
    FieldValue::Text(s.to_string())
}

/// Zip a `:`-separated FORMAT key list with its sample values
///
/// Surplus keys or values are ignored.
pub fn parse_format_fields(format: &str, values: &str) -> BTreeMap<String, FieldValue> {
    format
        .split(':')
        .zip(values.split(':'))
        .map(|(k, v)| (k.to_string(), try_parse_number(v)))
        .collect()
}

// ==============================================================================
// AMINO ACID DECODING
// ==============================================================================

/// Three-letter to one-letter amino acid codes (upper-case keys)
pub const AA_CODES: &[(&str, char)] = &[
    ("ALA", 'A'),
    ("ARG", 'R'),
    ("ASN", 'N'),
    ("ASP", 'D'),
    ("CYS", 'C'),
    ("GLU", 'E'),
    ("GLN", 'Q'),
    ("GLY", 'G'),
    ("HIS", 'H'),
    ("ILE", 'I'),
    ("LEU", 'L'),
    ("LYS", 'K'),
    ("MET", 'M'),
    ("PHE", 'F'),
    ("PRO", 'P'),
    ("SER", 'S'),
    ("THR", 'T'),
    ("TRP", 'W'),
    ("TYR", 'Y'),
    ("VAL", 'V'),
    ("TER", '*'),
];

fn aa_code(triplet: &str) -> Option<char> {
    let upper = triplet.to_uppercase();
    AA_CODES
        .iter()
        .find(|(code, _)| *code == upper)
        .map(|&(_, letter)| letter)
}

/// Decode concatenated three-letter amino acid codes, e.g. `"AlaGly"` -> `"AG"`
///
/// Returns `None` if any triplet is unknown or the input length is not a
/// multiple of three.
pub fn get_aa(s: &str) -> Option<String> {
    let chars: Vec<char> = s.chars().collect();
    chars
        .chunks(3)
        .map(|chunk| aa_code(&chunk.iter().collect::<String>()))
        .collect()
}

/// Nucleotide plus amino-acid mutation label
///
/// `snpeff_aa` is the HGVS protein change (`p.Asp614Gly`). The label is
/// `{ref}{pos}{alt}({gene}:{ref_aa}{aa_pos}{alt_aa})`, with
/// `[stop_lost]`/`[FRAMESHIFT]` markers for those effects. If the protein
/// change is absent (`.`) or cannot be decoded, the bare `{ref}{pos}{alt}`
/// is returned.
///
/// # Example
/// ```
/// use viral_report::variants::mutation_label;
///
/// let label = mutation_label("S", "A", "G", 23403, Some("614"), "p.Asp614Gly", "missense_variant");
/// assert_eq!(label, "A23403G(S:D614G)");
/// ```
pub fn mutation_label(
    gene: &str,
    ref_allele: &str,
    alt_allele: &str,
    nt_pos: u64,
    aa_pos: Option<&str>,
    snpeff_aa: &str,
    effect: &str,
) -> String {
    let bare = format!("{}{}{}", ref_allele, nt_pos, alt_allele);
    if snpeff_aa == "." {
        return bare;
    }

    let Some((ref_aa, parsed_pos, alt_aa)) = split_protein_change(snpeff_aa) else {
        return bare;
    };
    let Some(ref_aa) = get_aa(&ref_aa) else {
        return bare;
    };
    let aa_pos = aa_pos
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != ".")
        .map(str::to_string)
        .unwrap_or(parsed_pos);

    let protein = match effect {
        "stop_lost" => match get_aa(&alt_aa.replace("ext", "")) {
            Some(alt) => format!("{}{}{}[stop_lost]", ref_aa, aa_pos, alt),
            None => return bare,
        },
        "frameshift_variant" => format!("{}{}[FRAMESHIFT]", ref_aa, aa_pos),
        "conservative_inframe_deletion" => format!("{}{}{}", ref_aa, aa_pos, alt_aa),
        _ => match get_aa(&alt_aa) {
            Some(alt) => format!("{}{}{}", ref_aa, aa_pos, alt),
            None => return bare,
        },
    };

    format!("{}({}:{})", bare, gene, protein)
}

static PROTEIN_CHANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^p\.([a-zA-Z]+)(\d+)([a-zA-Z]+)").expect("valid protein change pattern"));

/// Split `p.{ref}{pos}{alt}` into its letter/digit/letter groups
fn split_protein_change(s: &str) -> Option<(String, String, String)> {
    let caps = PROTEIN_CHANGE.captures(s)?;
    Some((caps[1].to_string(), caps[2].to_string(), caps[3].to_string()))
}

// ==============================================================================
// VARIANT TABLE COLUMNS
// ==============================================================================

/// Columns of the Variants sheet, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VariantColumn {
    Sample,
    Mutation,
    Pos,
    Ref,
    Alt,
    RefDp,
    AltDp,
    Dp,
    AltFreq,
    Gene,
    Impact,
    Effect,
    Aa,
    AaPos,
    AaLen,
    Chrom,
}

impl VariantColumn {
    pub const ALL: [VariantColumn; 16] = [
        VariantColumn::Sample,
        VariantColumn::Mutation,
        VariantColumn::Pos,
        VariantColumn::Ref,
        VariantColumn::Alt,
        VariantColumn::RefDp,
        VariantColumn::AltDp,
        VariantColumn::Dp,
        VariantColumn::AltFreq,
        VariantColumn::Gene,
        VariantColumn::Impact,
        VariantColumn::Effect,
        VariantColumn::Aa,
        VariantColumn::AaPos,
        VariantColumn::AaLen,
        VariantColumn::Chrom,
    ];

    /// Source field name
    pub fn key(&self) -> &'static str {
        match self {
            VariantColumn::Sample => "sample",
            VariantColumn::Mutation => "mutation",
            VariantColumn::Chrom => "CHROM",
            VariantColumn::Pos => "POS",
            VariantColumn::Ref => "REF",
            VariantColumn::Alt => "ALT",
            VariantColumn::RefDp => "REF_DP",
            VariantColumn::AltDp => "ALT_DP",
            VariantColumn::Dp => "DP",
            VariantColumn::AltFreq => "ALT_FREQ",
            VariantColumn::Gene => "gene",
            VariantColumn::Impact => "impact",
            VariantColumn::Effect => "effect",
            VariantColumn::Aa => "aa",
            VariantColumn::AaPos => "aa_pos",
            VariantColumn::AaLen => "aa_len",
        }
    }

    /// Report header
    pub fn title(&self) -> &'static str {
        match self {
            VariantColumn::Sample => "Sample",
            VariantColumn::Mutation => "Mutation",
            VariantColumn::Chrom => "Reference Genome",
            VariantColumn::Pos => "Position",
            VariantColumn::Ref => "Reference Allele",
            VariantColumn::Alt => "Alternate Allele",
            VariantColumn::RefDp => "Reference Allele Depth",
            VariantColumn::AltDp => "Alternate Allele Depth",
            VariantColumn::Dp => "Total Depth",
            VariantColumn::AltFreq => "Alternate Allele Frequency",
            VariantColumn::Gene => "Gene",
            VariantColumn::Impact => "Variant Impact",
            VariantColumn::Effect => "Variant Effect",
            VariantColumn::Aa => "Amino Acid Change",
            VariantColumn::AaPos => "Amino Acid Position",
            VariantColumn::AaLen => "Gene Amino Acid Length",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            VariantColumn::Sample => "Sample name",
            VariantColumn::Mutation => {
                "Nucleotide mutation with amino acid change, e.g. A23403G(S:D614G)"
            }
            VariantColumn::Chrom => "Reference genome sequence the variant was called against",
            VariantColumn::Pos => "1-based nucleotide position of the variant in the reference genome",
            VariantColumn::Ref => "Reference allele",
            VariantColumn::Alt => "Alternate allele",
            VariantColumn::RefDp => "Number of reads supporting the reference allele",
            VariantColumn::AltDp => "Number of reads supporting the alternate allele",
            VariantColumn::Dp => "Reference plus alternate allele depth",
            VariantColumn::AltFreq => "Fraction of reads supporting the alternate allele (0-1)",
            VariantColumn::Gene => "Gene affected by the variant",
            VariantColumn::Impact => "Predicted impact category (HIGH, MODERATE, LOW, MODIFIER)",
            VariantColumn::Effect => "Predicted effect (Sequence Ontology term, e.g. missense_variant)",
            VariantColumn::Aa => "Amino acid change in HGVS three-letter notation",
            VariantColumn::AaPos => "Position of the amino acid change in the gene product",
            VariantColumn::AaLen => "Length of the gene product in amino acids",
        }
    }

    pub fn to_column(self) -> Column {
        Column::new(self.title(), self.description())
    }
}

fn caller_cell(caller: &CallerVariant, column: VariantColumn) -> Option<Cell> {
    let cell = match column {
        VariantColumn::Sample => Cell::text(&caller.sample),
        VariantColumn::Chrom => Cell::text(&caller.chrom),
        VariantColumn::Pos => Cell::from(caller.pos),
        VariantColumn::Ref => Cell::text(&caller.ref_allele),
        VariantColumn::Alt => Cell::text(&caller.alt_allele),
        VariantColumn::RefDp => Cell::from(caller.ref_dp),
        VariantColumn::AltDp => Cell::from(caller.alt_dp),
        VariantColumn::Dp => Cell::from(caller.dp),
        VariantColumn::AltFreq => Cell::from(caller.alt_freq),
        _ => return None,
    };
    Some(cell)
}

fn annotation_cell(annotation: &AnnotatedVariant, column: VariantColumn) -> Option<Cell> {
    let optional = |value: &Option<String>| value.as_deref().map(Cell::text);
    match column {
        VariantColumn::Sample => Some(Cell::text(&annotation.sample)),
        VariantColumn::Mutation => Some(Cell::text(&annotation.mutation)),
        VariantColumn::Chrom => optional(&annotation.chrom),
        VariantColumn::Pos => Some(Cell::from(annotation.pos)),
        VariantColumn::Ref => Some(Cell::text(&annotation.ref_allele)),
        VariantColumn::Alt => Some(Cell::text(&annotation.alt_allele)),
        VariantColumn::Gene => optional(&annotation.gene),
        VariantColumn::Impact => optional(&annotation.impact),
        VariantColumn::Effect => optional(&annotation.effect),
        VariantColumn::Aa => optional(&annotation.aa),
        VariantColumn::AaPos => annotation.aa_pos.as_deref().map(Cell::infer),
        VariantColumn::AaLen => annotation.aa_len.as_deref().map(Cell::infer),
        _ => None,
    }
}

/// Value of `column` for `row`, `None` when the row's source(s) do not define it
pub fn variant_cell(row: &VariantRow, column: VariantColumn) -> Option<Cell> {
    match row {
        VariantRow::CallerOnly(caller) => caller_cell(caller, column),
        VariantRow::AnnotationOnly(annotation) => annotation_cell(annotation, column),
        VariantRow::Merged { caller, annotation } => {
            caller_cell(caller, column).or_else(|| annotation_cell(annotation, column))
        }
    }
}

/// Columns defined by at least one row, in output order
pub fn present_columns(rows: &[VariantRow]) -> Vec<VariantColumn> {
    VariantColumn::ALL
        .into_iter()
        .filter(|&column| rows.iter().any(|row| variant_cell(row, column).is_some()))
        .collect()
}

// ==============================================================================
// MERGING
// ==============================================================================

fn same_variant(caller: &CallerVariant, annotation: &AnnotatedVariant) -> bool {
    caller.sample == annotation.sample
        && caller.pos == annotation.pos
        && caller.ref_allele == annotation.ref_allele
        && caller.alt_allele == annotation.alt_allele
}

/// Reconcile one sample's caller and annotation rows
///
/// With both sources, only variants present in both are kept (joined on
/// sample, position and alleles). With a single source its rows pass
/// through unchanged. Returns `None` when neither source exists.
pub fn merge_sample(
    caller: Option<&[CallerVariant]>,
    annotation: Option<&[AnnotatedVariant]>,
) -> Option<Vec<VariantRow>> {
    match (caller, annotation) {
        (None, None) => None,
        (Some(caller), None) => Some(caller.iter().cloned().map(VariantRow::CallerOnly).collect()),
        (None, Some(annotation)) => Some(
            annotation
                .iter()
                .cloned()
                .map(VariantRow::AnnotationOnly)
                .collect(),
        ),
        (Some(caller), Some(annotation)) => {
            let mut merged = Vec::new();
            for c in caller {
                for a in annotation.iter().filter(|a| same_variant(c, a)) {
                    merged.push(VariantRow::Merged {
                        caller: c.clone(),
                        annotation: a.clone(),
                    });
                }
            }
            Some(merged)
        }
    }
}

/// Merge caller and annotation rows for every sample seen in either source
pub fn merge_all(
    caller: &BTreeMap<SampleId, Vec<CallerVariant>>,
    annotation: &BTreeMap<SampleId, Vec<AnnotatedVariant>>,
    log: &mut RunLog,
) -> BTreeMap<SampleId, Vec<VariantRow>> {
    let caller_samples: BTreeSet<&SampleId> = caller.keys().collect();
    let annotation_samples: BTreeSet<&SampleId> = annotation.keys().collect();

    log.debug(
        SOURCE,
        None,
        format!(
            "all samples={} | VCF only samples={:?} | SnpSift only samples={:?}",
            caller_samples.union(&annotation_samples).count(),
            caller_samples.difference(&annotation_samples).collect::<Vec<_>>(),
            annotation_samples.difference(&caller_samples).collect::<Vec<_>>(),
        ),
    );

    let mut out = BTreeMap::new();
    for sample in caller_samples.union(&annotation_samples) {
        let merged = merge_sample(
            caller.get(*sample).map(Vec::as_slice),
            annotation.get(*sample).map(Vec::as_slice),
        );
        match merged {
            Some(rows) if rows.is_empty() => log.warn(
                SOURCE,
                Some(sample.as_str()),
                "No variants shared between VCF and SnpSift table",
            ),
            Some(rows) => {
                out.insert((*sample).clone(), rows);
            }
            None => {}
        }
    }

    out
}

// ==============================================================================
// REPORT TABLES
// ==============================================================================

/// All variant rows sorted by sample then position
pub fn sorted_rows(by_sample: &BTreeMap<SampleId, Vec<VariantRow>>) -> Vec<VariantRow> {
    let mut rows: Vec<VariantRow> = by_sample.values().flatten().cloned().collect();
    rows.sort_by(|a, b| a.sample().cmp(b.sample()).then(a.pos().cmp(&b.pos())));
    rows
}

/// The Variants sheet; only columns defined by some row are included
pub fn variants_table(rows: &[VariantRow]) -> Option<Table> {
    if rows.is_empty() {
        return None;
    }

    let columns = present_columns(rows);
    let mut table = Table::new(
        SheetName::Variants,
        columns.iter().map(|c| c.to_column()).collect(),
    );
    for row in rows {
        table.push_row(
            columns
                .iter()
                .map(|&column| variant_cell(row, column).unwrap_or(Cell::Empty))
                .collect(),
        );
    }
    Some(table)
}

/// Nucleotide position encoded at the start of a mutation label
pub fn label_position(label: &str) -> Option<u64> {
    let digits_start = label.find(|c: char| !c.is_ascii_uppercase())?;
    if digits_start == 0 {
        return None;
    }
    let rest = &label[digits_start..];
    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    rest[..digits_end].parse().ok()
}

/// Labelled rows grouped by mutation, ordered by nucleotide position
fn rows_by_mutation(rows: &[VariantRow]) -> Vec<(&str, Vec<&VariantRow>)> {
    let mut grouped: BTreeMap<&str, Vec<&VariantRow>> = BTreeMap::new();
    for row in rows {
        if let Some(label) = row.mutation() {
            grouped.entry(label).or_default().push(row);
        }
    }

    let mut ordered: Vec<(&str, Vec<&VariantRow>)> = grouped.into_iter().collect();
    ordered.sort_by_key(|(label, _)| label_position(label).unwrap_or(u64::MAX));
    ordered
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Samples x mutations matrix of alternate allele frequencies
///
/// Columns are ordered by nucleotide position; a sample without a mutation
/// gets 0.0. Repeated observations of a mutation in one sample are
/// averaged. Requires annotated rows.
pub fn variant_matrix(rows: &[VariantRow]) -> Option<Table> {
    let mutations = rows_by_mutation(rows);
    if mutations.is_empty() {
        return None;
    }

    let samples: BTreeSet<&str> = mutations
        .iter()
        .flat_map(|(_, rows)| rows.iter().map(|r| r.sample()))
        .collect();

    let mut columns = vec![Column::new("Sample", "Sample name")];
    columns.extend(mutations.iter().map(|(label, _)| {
        Column::new(*label, format!("Alternate allele frequency of {}", label))
    }));

    let mut table = Table::new(SheetName::VariantMatrix, columns);
    for sample in samples {
        let mut cells = vec![Cell::text(sample)];
        for (_, observed) in &mutations {
            let freqs: Vec<f64> = observed
                .iter()
                .filter(|r| r.sample() == sample)
                .filter_map(|r| r.alt_freq())
                .collect();
            cells.push(Cell::Float(mean(&freqs).unwrap_or(0.0)));
        }
        table.push_row(cells);
    }

    Some(table)
}

/// Per-mutation prevalence across samples
///
/// One row per mutation label, ordered by nucleotide position. Annotation
/// fields come from the first observation. Requires annotated rows.
pub fn variant_summary(rows: &[VariantRow], major_allele_freq: f64) -> Option<Table> {
    let mutations = rows_by_mutation(rows);
    if mutations.is_empty() {
        return None;
    }

    let columns = vec![
        VariantColumn::Mutation.to_column(),
        VariantColumn::Pos.to_column(),
        VariantColumn::Gene.to_column(),
        VariantColumn::Effect.to_column(),
        VariantColumn::Aa.to_column(),
        Column::new("# Samples", "Number of samples with the mutation"),
        Column::new("Samples", "Samples with the mutation"),
        Column::new("Min AF", "Lowest alternate allele frequency observed"),
        Column::new("Max AF", "Highest alternate allele frequency observed"),
        Column::new("Mean AF", "Mean alternate allele frequency across samples with the mutation"),
        Column::new(
            "# Samples Major Allele",
            format!(
                "Number of samples where the mutation is the major allele (AF >= {})",
                major_allele_freq
            ),
        ),
    ];

    let mut table = Table::new(SheetName::VariantSummary, columns);
    for (label, observed) in &mutations {
        let first = observed[0].annotation();
        let samples: BTreeSet<&str> = observed.iter().map(|r| r.sample()).collect();
        let freqs: Vec<f64> = observed.iter().filter_map(|r| r.alt_freq()).collect();
        let n_major = observed
            .iter()
            .filter(|r| r.alt_freq().is_some_and(|af| af >= major_allele_freq))
            .map(|r| r.sample())
            .collect::<BTreeSet<_>>()
            .len();

        table.push_row(vec![
            Cell::text(*label),
            Cell::from(observed[0].pos()),
            Cell::opt_text(first.and_then(|a| a.gene.as_deref())),
            Cell::opt_text(first.and_then(|a| a.effect.as_deref())),
            Cell::opt_text(first.and_then(|a| a.aa.as_deref())),
            Cell::from(samples.len()),
            Cell::text(samples.into_iter().collect::<Vec<_>>().join("; ")),
            Cell::from(freqs.iter().copied().reduce(f64::min)),
            Cell::from(freqs.iter().copied().reduce(f64::max)),
            Cell::from(mean(&freqs)),
            Cell::from(n_major),
        ]);
    }

    Some(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(sample: &str, pos: u64, alt_freq: f64) -> CallerVariant {
        CallerVariant {
            sample: sample.to_string(),
            chrom: "MN908947.3".to_string(),
            pos,
            ref_allele: "A".to_string(),
            alt_allele: "G".to_string(),
            ref_dp: 10,
            alt_dp: 30,
            dp: 40,
            alt_freq,
        }
    }

    fn annotation(sample: &str, pos: u64) -> AnnotatedVariant {
        AnnotatedVariant {
            sample: sample.to_string(),
            chrom: None,
            pos,
            ref_allele: "A".to_string(),
            alt_allele: "G".to_string(),
            gene: Some("S".to_string()),
            impact: Some("MODERATE".to_string()),
            effect: Some("missense_variant".to_string()),
            aa: Some("p.Asp614Gly".to_string()),
            aa_pos: Some("614".to_string()),
            aa_len: Some("1273".to_string()),
            ref_ac: Some(1),
            alt_ac: Some(3),
            af: Some(0.75),
            mutation: format!("A{}G(S:D614G)", pos),
        }
    }

    #[test]
    fn test_try_parse_number() {
        assert_eq!(try_parse_number("12"), FieldValue::Int(12));
        assert_eq!(try_parse_number("0.5"), FieldValue::Float(0.5));
        assert_eq!(try_parse_number("PASS"), FieldValue::Text("PASS".to_string()));
        assert_eq!(
            try_parse_number("3,x"),
            FieldValue::List(vec![FieldValue::Int(3), FieldValue::Text("x".to_string())])
        );
    }

    #[test]
    fn test_parse_format_fields() {
        let fields = parse_format_fields("GT:AD:AF", "1/1:2,48:0.96");
        assert_eq!(fields["GT"], FieldValue::Text("1/1".to_string()));
        assert_eq!(
            fields["AD"],
            FieldValue::List(vec![FieldValue::Int(2), FieldValue::Int(48)])
        );
        assert_eq!(fields["AF"].as_f64(), Some(0.96));
    }

    #[test]
    fn test_get_aa() {
        assert_eq!(get_aa("ALA").as_deref(), Some("A"));
        assert_eq!(get_aa("AlaGlyTer").as_deref(), Some("AG*"));
        assert_eq!(get_aa("Xyz"), None);
        assert_eq!(get_aa("Al"), None);
    }

    #[test]
    fn test_triplet_decoding_in_label() {
        let label = mutation_label("orf1ab", "C", "T", 3037, None, "p.ALA123GLY", "missense_variant");
        assert_eq!(label, "C3037T(orf1ab:A123G)");
    }

    #[test]
    fn test_missense_label() {
        let label = mutation_label("S", "A", "G", 23403, Some("614"), "p.Asp614Gly", "missense_variant");
        assert_eq!(label, "A23403G(S:D614G)");
    }

    #[test]
    fn test_stop_lost_label() {
        let label = mutation_label("ORF8", "T", "C", 28253, Some("122"), "p.Ter122Glnext", "stop_lost");
        assert_eq!(label, "T28253C(ORF8:*122Q[stop_lost])");
    }

    #[test]
    fn test_frameshift_never_emits_alt_letter() {
        let label = mutation_label("N", "GA", "G", 28881, Some("13"), "p.Ser13fs", "frameshift_variant");
        assert_eq!(label, "GA28881G(N:S13[FRAMESHIFT])");
    }

    #[test]
    fn test_conservative_inframe_deletion_keeps_raw_alt() {
        let label = mutation_label(
            "S",
            "TTTA",
            "T",
            21990,
            Some("144"),
            "p.Tyr144del",
            "conservative_inframe_deletion",
        );
        assert_eq!(label, "TTTA21990T(S:Y144del)");
    }

    #[test]
    fn test_split_protein_change() {
        let split = |s: &str| split_protein_change(s);
        assert_eq!(
            split("p.Asp614Gly"),
            Some(("Asp".to_string(), "614".to_string(), "Gly".to_string()))
        );
        assert_eq!(
            split("p.Gly142fs"),
            Some(("Gly".to_string(), "142".to_string(), "fs".to_string()))
        );
        assert_eq!(split("p.His69_Val70del"), None);
        assert_eq!(split("c.Asp614Gly"), None);
        assert_eq!(split("xp.Asp614Gly"), None);
    }

    #[test]
    fn test_malformed_aa_falls_back_to_bare() {
        assert_eq!(mutation_label("S", "A", "G", 1, None, ".", "x"), "A1G");
        assert_eq!(mutation_label("S", "A", "G", 1, None, "p.His69_Val70del", "x"), "A1G");
        assert_eq!(mutation_label("S", "A", "G", 1, None, "garbage", "x"), "A1G");
        assert_eq!(mutation_label("S", "A", "G", 1, None, "p.Foo5Bar", "x"), "A1G");
    }

    #[test]
    fn test_caller_only_preserves_caller_columns() {
        let rows = merge_sample(Some(&[caller("S1", 10, 0.9)][..]), None).unwrap();
        let keys: Vec<&str> = present_columns(&rows).iter().map(|c| c.key()).collect();
        assert_eq!(
            keys,
            vec!["sample", "POS", "REF", "ALT", "REF_DP", "ALT_DP", "DP", "ALT_FREQ", "CHROM"]
        );
    }

    #[test]
    fn test_variants_sheet_reference_genome_last() {
        let rows = merge_sample(Some(&[caller("S1", 10, 0.9)][..]), None).unwrap();
        let table = variants_table(&rows).unwrap();
        let names = table.column_names();
        assert_eq!(&names[..3], &["Sample", "Position", "Reference Allele"]);
        assert_eq!(names.last(), Some(&"Reference Genome"));

        let callers = [caller("S1", 20, 0.8)];
        let annotations = [annotation("S1", 20)];
        let rows = merge_sample(Some(&callers[..]), Some(&annotations[..])).unwrap();
        let table = variants_table(&rows).unwrap();
        assert_eq!(table.column_names()[1], "Mutation");
        assert_eq!(table.column_names().last(), Some(&"Reference Genome"));
    }

    #[test]
    fn test_merge_is_inner_join() {
        let callers = [caller("S1", 10, 0.9), caller("S1", 20, 0.8)];
        let annotations = [annotation("S1", 20), annotation("S1", 30)];
        let rows = merge_sample(Some(&callers[..]), Some(&annotations[..])).unwrap();

        assert_eq!(rows.len(), 1);
        assert!(matches!(&rows[0], VariantRow::Merged { caller, .. } if caller.pos == 20));
        assert_eq!(present_columns(&rows).len(), VariantColumn::ALL.len());
    }

    #[test]
    fn test_merge_all_single_sources() {
        let mut callers = BTreeMap::new();
        callers.insert("S1".to_string(), vec![caller("S1", 10, 0.9)]);
        let mut annotations = BTreeMap::new();
        annotations.insert("S2".to_string(), vec![annotation("S2", 23403)]);

        let mut log = RunLog::new();
        let merged = merge_all(&callers, &annotations, &mut log);
        assert!(matches!(merged["S1"][0], VariantRow::CallerOnly(_)));
        assert!(matches!(merged["S2"][0], VariantRow::AnnotationOnly(_)));

        let table = variants_table(&sorted_rows(&merged)).unwrap();
        assert_eq!(table.len(), 2);
        // caller-only row has no mutation label
        let mutation = table.column("Mutation").unwrap();
        assert_eq!(mutation[0], &Cell::Empty);
    }

    #[test]
    fn test_label_position() {
        assert_eq!(label_position("A23403G(S:D614G)"), Some(23403));
        assert_eq!(label_position("TTTA21990T"), Some(21990));
        assert_eq!(label_position("weird"), None);
    }

    #[test]
    fn test_variant_matrix_orders_by_position() {
        let rows = vec![
            VariantRow::AnnotationOnly(annotation("S2", 23403)),
            VariantRow::AnnotationOnly(annotation("S1", 241)),
            VariantRow::AnnotationOnly(annotation("S1", 23403)),
        ];
        let matrix = variant_matrix(&rows).unwrap();
        assert_eq!(
            matrix.column_names(),
            vec!["Sample", "A241G(S:D614G)", "A23403G(S:D614G)"]
        );
        assert_eq!(matrix.rows[0], vec![Cell::text("S1"), Cell::Float(0.75), Cell::Float(0.75)]);
        assert_eq!(matrix.rows[1], vec![Cell::text("S2"), Cell::Float(0.0), Cell::Float(0.75)]);
    }

    #[test]
    fn test_matrix_requires_mutations() {
        let rows = vec![VariantRow::CallerOnly(caller("S1", 10, 0.5))];
        assert!(variant_matrix(&rows).is_none());
        assert!(variant_summary(&rows, 0.75).is_none());
    }

    #[test]
    fn test_variant_summary() {
        let rows = vec![
            VariantRow::Merged {
                caller: caller("S1", 23403, 0.9),
                annotation: annotation("S1", 23403),
            },
            VariantRow::Merged {
                caller: caller("S2", 23403, 0.5),
                annotation: annotation("S2", 23403),
            },
        ];
        let summary = variant_summary(&rows, 0.75).unwrap();
        assert_eq!(summary.len(), 1);

        let row = &summary.rows[0];
        let get = |name: &str| &row[summary.column_index(name).unwrap()];
        assert_eq!(get("# Samples"), &Cell::Int(2));
        assert_eq!(get("Samples"), &Cell::text("S1; S2"));
        assert_eq!(get("Min AF"), &Cell::Float(0.5));
        assert_eq!(get("Max AF"), &Cell::Float(0.9));
        assert_eq!(get("# Samples Major Allele"), &Cell::Int(1));
        assert_eq!(get("Gene"), &Cell::text("S"));
    }
}
