// ==============================================================================
// parsers/ct.rs - Ct Value Table Reader
// ==============================================================================
// Description: Two-column (sample, Ct) tables supplied alongside a run, as
//              delimited text or spreadsheets
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use calamine::{open_workbook_auto, Reader};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::models::SampleId;
use crate::parsers::DelimitedTable;
use crate::run_log::RunLog;

const SOURCE: &str = "ct";

#[derive(Error, Debug)]
pub enum CtError {
    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    SpreadsheetError(#[from] calamine::Error),

    #[error("Workbook has no worksheets")]
    NoWorksheet,

    #[error("Unsupported Ct table extension \"{0}\"")]
    UnsupportedExtension(String),
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// First worksheet of an .xlsx/.ods workbook as a header + rows table
fn read_spreadsheet(path: &Path) -> Result<DelimitedTable, CtError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook.worksheet_range_at(0).ok_or(CtError::NoWorksheet)??;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<String>>());
    let headers: Vec<String> = rows
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    Ok(DelimitedTable {
        headers,
        rows: rows.collect(),
    })
}

fn load_table(path: &Path, log: &mut RunLog) -> Result<DelimitedTable, CtError> {
    match extension(path).as_str() {
        "txt" => {
            log.warn(
                SOURCE,
                None,
                format!("Trying to read \"{}\" as tab-delimited file with header.", path.display()),
            );
            Ok(DelimitedTable::read(path, b'\t')?)
        }
        "tsv" => Ok(DelimitedTable::read(path, b'\t')?),
        "csv" => Ok(DelimitedTable::read(path, b',')?),
        "xlsx" | "ods" => read_spreadsheet(path),
        other => Err(CtError::UnsupportedExtension(other.to_string())),
    }
}

/// Read a Ct value table into sample -> Ct
///
/// The table must have a header and exactly two columns (sample, Ct).
/// Anything else is logged as an error and yields an empty map; rows whose
/// Ct is not a number are skipped with a warning.
pub fn read_ct_table(path: &Path, log: &mut RunLog) -> BTreeMap<SampleId, f64> {
    let table = match load_table(path, log) {
        Ok(table) => table,
        Err(CtError::UnsupportedExtension(ext)) => {
            log.error(
                SOURCE,
                None,
                format!(
                    "Not sure how to parse Ct values table with extension \".{}\". Please provide a \
                     tab-delimited file (\".tsv\"), CSV (\".csv\"), Excel file (\".xlsx\") or \
                     OpenDocument Spreadsheet (\".ods\").",
                    ext
                ),
            );
            return BTreeMap::new();
        }
        Err(e) => {
            log.error(SOURCE, None, format!("Could not read Ct values table {}: {}", path.display(), e));
            return BTreeMap::new();
        }
    };

    if table.is_empty() {
        log.error(SOURCE, None, "Ct values table is empty! No Ct values present!");
        return BTreeMap::new();
    }
    if table.headers.len() != 2 {
        log.error(
            SOURCE,
            None,
            format!(
                "Ct values table expected to only have 2 columns, but {} were found with names: {}",
                table.headers.len(),
                table.headers.join(", ")
            ),
        );
        return BTreeMap::new();
    }

    let mut ct_values = BTreeMap::new();
    for row in &table.rows {
        let sample = row[0].trim();
        if sample.is_empty() {
            continue;
        }
        match row[1].trim().parse::<f64>() {
            Ok(ct) => {
                ct_values.insert(sample.to_string(), ct);
            }
            Err(_) => log.warn(
                SOURCE,
                Some(sample),
                format!("Ignoring non-numeric Ct value \"{}\"", row[1]),
            ),
        }
    }

    log.info(
        SOURCE,
        None,
        format!("Read {} Ct values from \"{}\"", ct_values.len(), path.display()),
    );
    ct_values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_log::LogSeverity;
    use std::fs;
    use tempfile::TempDir;

    fn expected() -> BTreeMap<SampleId, f64> {
        BTreeMap::from([
            ("Sample1".to_string(), 23.0),
            ("Sample2".to_string(), 34.8),
            ("Sample3".to_string(), 0.0),
        ])
    }

    #[test]
    fn test_delimited_tables() {
        let dir = TempDir::new().unwrap();
        let tsv = dir.path().join("ct.tsv");
        let csv = dir.path().join("ct.csv");
        fs::write(&tsv, "sample\tct\nSample1\t23\nSample2\t34.8\nSample3\t0\n").unwrap();
        fs::write(&csv, "sample,ct\nSample1,23\nSample2,34.8\nSample3,0.0\n").unwrap();

        for path in [tsv, csv] {
            let mut log = RunLog::new();
            assert_eq!(read_ct_table(&path, &mut log), expected());
            assert_eq!(log.at_least(LogSeverity::Warning).count(), 0);
        }
    }

    #[test]
    fn test_txt_read_as_tab_with_warning() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ct.txt");
        fs::write(&path, "sample\tct\nSample1\t23\nSample2\t34.8\nSample3\t0\n").unwrap();

        let mut log = RunLog::new();
        assert_eq!(read_ct_table(&path, &mut log), expected());
        assert_eq!(log.at_least(LogSeverity::Warning).count(), 1);
    }

    #[test]
    fn test_wrong_column_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ct.csv");
        fs::write(&path, "sample,ct,extra\nSample1,23,x\n").unwrap();

        let mut log = RunLog::new();
        assert!(read_ct_table(&path, &mut log).is_empty());
        assert_eq!(log.at_least(LogSeverity::Error).count(), 1);
    }

    #[test]
    fn test_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ct.json");
        fs::write(&path, "{}").unwrap();

        let mut log = RunLog::new();
        assert!(read_ct_table(&path, &mut log).is_empty());
        assert_eq!(log.at_least(LogSeverity::Error).count(), 1);
    }

    #[test]
    fn test_empty_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ct.tsv");
        fs::write(&path, "sample\tct\n").unwrap();

        let mut log = RunLog::new();
        assert!(read_ct_table(&path, &mut log).is_empty());
        assert_eq!(log.at_least(LogSeverity::Error).count(), 1);
    }
}
