// ==============================================================================
// parsers/pangolin.rs - Pangolin Lineage Report Parser
// ==============================================================================
// Description: Lineage assignments from `pangolin.lineage_report.csv`
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::parsers::{CsvTableError, DelimitedTable};
use crate::run_log::RunLog;
use crate::table::{Cell, Column, SheetName, Table};

const SOURCE: &str = "pangolin";

pub const LINEAGE_REPORT_NAME: &str = "pangolin.lineage_report.csv";

/// (source column, report header, description)
pub const PANGOLIN_COLUMNS: &[(&str, &str, &str)] = &[
    ("taxon", "Sample", "Sample name"),
    ("lineage", "Pangolin Lineage", "Most likely Pango lineage assigned to the sample"),
    (
        "probability",
        "Lineage Assignment Probability",
        "Support for the lineage assignment reported by Pangolin",
    ),
    (
        "pangoLEARN_version",
        "pangoLEARN Lineages Version",
        "Version of the pangoLEARN lineage model/data used for the assignment",
    ),
    ("status", "Pangolin QC Status", "Whether the sequence passed Pangolin QC"),
    ("note", "Pangolin QC Note", "Additional information reported by Pangolin"),
];

fn rename(column: &str) -> Column {
    match PANGOLIN_COLUMNS.iter().find(|(source, _, _)| *source == column) {
        Some(&(_, title, description)) => Column::new(title, description),
        None => Column::undocumented(column),
    }
}

/// Parse a Pangolin lineage report into the Pangolin Lineage sheet
///
/// Rows are sorted by taxon and the known columns renamed; any other
/// columns pass through under their original names. The sample column
/// comes first.
pub fn read_pangolin_csv(path: &Path) -> Result<Table, CsvTableError> {
    let csv = DelimitedTable::read(path, b',')?;
    to_table(csv)
}

fn to_table(csv: DelimitedTable) -> Result<Table, CsvTableError> {
    let taxon = csv
        .column_index("taxon")
        .ok_or_else(|| CsvTableError::MissingColumn("taxon".to_string()))?;

    let order: Vec<usize> = std::iter::once(taxon)
        .chain((0..csv.headers.len()).filter(|&i| i != taxon))
        .collect();

    let columns = order.iter().map(|&i| rename(&csv.headers[i])).collect();
    let mut table = Table::new(SheetName::Pangolin, columns);

    let mut rows = csv.rows;
    rows.sort_by(|a, b| a[taxon].cmp(&b[taxon]));

    for row in rows {
        table.push_row(
            order
                .iter()
                .map(|&i| {
                    if i == taxon {
                        Cell::text(&row[i])
                    } else {
                        Cell::infer(&row[i])
                    }
                })
                .collect(),
        );
    }

    Ok(table)
}

/// First lineage report found beneath `root`, in sorted traversal order
pub fn find_lineage_report(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .find(|entry| entry.file_type().is_file() && entry.file_name() == LINEAGE_REPORT_NAME)
        .map(|entry| entry.into_path())
}

/// The Pangolin Lineage sheet, from `explicit` or the first report under `root`
pub fn collect(root: &Path, explicit: Option<&Path>, log: &mut RunLog) -> Option<Table> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => find_lineage_report(root)?,
    };

    match read_pangolin_csv(&path) {
        Ok(table) if table.is_empty() => {
            log.warn(SOURCE, None, format!("No lineage assignments in {}", path.display()));
            None
        }
        Ok(table) => {
            log.info(SOURCE, None, format!("Read {} lineage assignments from {}", table.len(), path.display()));
            Some(table)
        }
        Err(e) => {
            log.error(SOURCE, None, format!("Could not parse {}: {}", path.display(), e));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const REPORT: &str = "taxon,lineage,conflict,probability,pangoLEARN_version,status,note\n\
        Sample2,B.1.1.7,0.0,1.0,2021-05-19,passed_qc,17/17 B.1.1.7 SNPs\n\
        Sample1,B.1.617.2,,0.98,2021-05-19,passed_qc,\n";

    #[test]
    fn test_sorted_and_renamed() {
        let csv = DelimitedTable::from_reader(REPORT.as_bytes(), b',').unwrap();
        let table = to_table(csv).unwrap();

        assert_eq!(
            table.column_names(),
            vec![
                "Sample",
                "Pangolin Lineage",
                "conflict",
                "Lineage Assignment Probability",
                "pangoLEARN Lineages Version",
                "Pangolin QC Status",
                "Pangolin QC Note"
            ]
        );
        assert_eq!(table.rows[0][0], Cell::text("Sample1"));
        assert_eq!(table.rows[0][3], Cell::Float(0.98));
        assert_eq!(table.rows[0][2], Cell::Empty);
        assert!(table.columns[2].description.is_none());
    }

    #[test]
    fn test_missing_taxon() {
        let csv = DelimitedTable::from_reader("lineage\nB.1\n".as_bytes(), b',').unwrap();
        assert!(matches!(to_table(csv), Err(CsvTableError::MissingColumn(_))));
    }

    #[test]
    fn test_collect_finds_report() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("pangolin")).unwrap();
        fs::write(dir.path().join("pangolin").join(LINEAGE_REPORT_NAME), REPORT).unwrap();

        let mut log = RunLog::new();
        let table = collect(dir.path(), None, &mut log).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.sheet, SheetName::Pangolin);
    }

    #[test]
    fn test_collect_absent() {
        let dir = TempDir::new().unwrap();
        let mut log = RunLog::new();
        assert!(collect(dir.path(), None, &mut log).is_none());
        assert!(log.is_empty());
    }
}
