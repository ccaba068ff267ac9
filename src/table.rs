// ==============================================================================
// table.rs - Named Report Tables
// ==============================================================================
// Description: Logical sheets produced by the report core, with per-column
//              documentation for the rendering layer
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};

/// Fixed logical names of the report sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetName {
    WorkflowInfo,
    QcStats,
    Pangolin,
    Nextclade,
    Variants,
    VariantSummary,
    VariantMatrix,
    Consensus,
}

impl SheetName {
    /// Display title of the sheet
    pub fn as_str(&self) -> &'static str {
        match self {
            SheetName::WorkflowInfo => "Workflow Info",
            SheetName::QcStats => "Stats & QC",
            SheetName::Pangolin => "Pangolin Lineage",
            SheetName::Nextclade => "Nextclade",
            SheetName::Variants => "Variants",
            SheetName::VariantSummary => "Variant Summary",
            SheetName::VariantMatrix => "Variant Matrix",
            SheetName::Consensus => "Consensus",
        }
    }

    /// Identifier safe for file names and SQL table names
    pub fn slug(&self) -> &'static str {
        match self {
            SheetName::WorkflowInfo => "workflow_info",
            SheetName::QcStats => "qc_stats",
            SheetName::Pangolin => "pangolin",
            SheetName::Nextclade => "nextclade",
            SheetName::Variants => "variants",
            SheetName::VariantSummary => "variant_summary",
            SheetName::VariantMatrix => "variant_matrix",
            SheetName::Consensus => "consensus",
        }
    }
}

/// One table cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
    Empty,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Cell from an optional string, `None` becoming [`Cell::Empty`]
    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(Cell::Empty, Cell::text)
    }

    /// Interpret a raw field: integer, then float, else text; blank is empty
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Cell::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return Cell::Float(f);
            }
        }
        Cell::Text(raw.to_string())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Plain-text rendering; empty cells render as `""`
    pub fn render(&self) -> String {
        match self {
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Empty => String::new(),
        }
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        Cell::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Cell::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Cell::Empty, Into::into)
    }
}

/// Column header plus its documentation string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
        }
    }

    pub fn undocumented(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// A named, documented table; the first column is the row key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub sheet: SheetName,
    pub title: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(sheet: SheetName, columns: Vec<Column>) -> Self {
        Self {
            sheet,
            title: sheet.as_str().to_string(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding short rows with empty cells
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Cells of the named column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}
