// ==============================================================================
// output.rs - Multi-Format Report Output
// ==============================================================================
// Description: Write assembled reports as JSON, per-sheet TSV, Parquet or a
//              SQLite database
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

// Apache Arrow/Parquet for columnar data
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

// SQLite for queryable database
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use crate::processor::Report;
use crate::table::{Cell, Table};

/// Supported report output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Whole report as one JSON document
    Json,
    /// One tab-separated file per sheet plus column documentation
    Tsv,
    /// One Parquet file per sheet
    Parquet,
    /// SQLite database with one table per sheet
    Sqlite,
}

impl OutputFormat {
    /// File extension (or directory suffix for per-sheet formats)
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Parquet => "parquet",
            OutputFormat::Sqlite => "db",
        }
    }

    /// Whether the format produces a directory of per-sheet files
    pub fn is_directory(&self) -> bool {
        matches!(self, OutputFormat::Tsv | OutputFormat::Parquet)
    }
}

/// Arrow/SQLite type chosen for a column from its cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Text,
}

impl ColumnKind {
    fn infer(table: &Table, idx: usize) -> Self {
        let mut kind = None;
        for row in &table.rows {
            kind = match (&row[idx], kind) {
                (Cell::Empty, k) => k,
                (Cell::Text(_), _) => return ColumnKind::Text,
                (Cell::Float(_), _) | (Cell::Int(_), Some(ColumnKind::Float)) => Some(ColumnKind::Float),
                (Cell::Int(_), _) => Some(ColumnKind::Int),
            };
        }
        kind.unwrap_or(ColumnKind::Text)
    }

    fn arrow_type(&self) -> DataType {
        match self {
            ColumnKind::Int => DataType::Int64,
            ColumnKind::Float => DataType::Float64,
            ColumnKind::Text => DataType::Utf8,
        }
    }

    fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Int => "INTEGER",
            ColumnKind::Float => "REAL",
            ColumnKind::Text => "TEXT",
        }
    }
}

fn sql_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_value(cell: &Cell) -> Value {
    match cell {
        Cell::Int(i) => Value::Integer(*i),
        Cell::Float(f) => Value::Real(*f),
        Cell::Text(s) => Value::Text(s.clone()),
        Cell::Empty => Value::Null,
    }
}

/// Writes a [`Report`] to an output directory
pub struct OutputGenerator {
    output_dir: PathBuf,
    prefix: String,
}

impl OutputGenerator {
    pub fn new(output_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Path written for `format`
    pub fn output_path(&self, format: OutputFormat) -> PathBuf {
        if format.is_directory() {
            self.output_dir.join(format!("{}_{}", self.prefix, format.extension()))
        } else {
            self.output_dir.join(format!("{}.{}", self.prefix, format.extension()))
        }
    }

    /// Generate output in the requested formats
    ///
    /// # Returns
    /// * HashMap of format -> written file or directory
    pub async fn generate(
        &self,
        formats: &[OutputFormat],
        report: &Report,
    ) -> Result<HashMap<OutputFormat, PathBuf>> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create output directory {:?}", self.output_dir))?;

        let mut result = HashMap::new();
        for &format in formats {
            if result.contains_key(&format) {
                continue;
            }
            let path = self.output_path(format);
            match format {
                OutputFormat::Json => self.generate_json(&path, report).await?,
                OutputFormat::Tsv => self.generate_tsv(&path, report).await?,
                OutputFormat::Parquet => self.generate_parquet(&path, report).await?,
                OutputFormat::Sqlite => self.generate_sqlite(&path, report).await?,
            }
            result.insert(format, path);
        }

        Ok(result)
    }

    async fn generate_json(&self, path: &Path, report: &Report) -> Result<()> {
        info!("Generating JSON output: {:?}", path);

        let file = File::create(path).context("Failed to create JSON output file")?;
        serde_json::to_writer_pretty(file, report).context("Failed to write JSON output")?;

        info!("JSON output complete: {} sheets", report.tables.len());
        Ok(())
    }

    async fn generate_tsv(&self, dir: &Path, report: &Report) -> Result<()> {
        info!("Generating TSV output: {:?}", dir);
        fs::create_dir_all(dir).context("Failed to create TSV output directory")?;

        let mut docs = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(dir.join("columns.tsv"))
            .context("Failed to create columns.tsv")?;
        docs.write_record(["sheet", "column", "description"])?;

        for table in &report.tables {
            let path = dir.join(format!("{}.tsv", table.sheet.slug()));
            let mut writer = csv::WriterBuilder::new()
                .delimiter(b'\t')
                .from_path(&path)
                .with_context(|| format!("Failed to create {:?}", path))?;

            writer.write_record(table.column_names())?;
            for row in &table.rows {
                writer.write_record(row.iter().map(Cell::render))?;
            }
            writer.flush()?;

            for column in &table.columns {
                docs.write_record([
                    table.title.as_str(),
                    column.name.as_str(),
                    column.description.as_deref().unwrap_or(""),
                ])?;
            }
        }
        docs.flush()?;

        info!("TSV output complete: {} sheets", report.tables.len());
        Ok(())
    }

    async fn generate_parquet(&self, dir: &Path, report: &Report) -> Result<()> {
        info!("Generating Parquet output: {:?}", dir);
        fs::create_dir_all(dir).context("Failed to create Parquet output directory")?;

        for table in &report.tables {
            let path = dir.join(format!("{}.parquet", table.sheet.slug()));
            write_parquet_table(&path, table)
                .with_context(|| format!("Failed to write sheet '{}' to Parquet", table.title))?;
        }

        info!("Parquet output complete: {} sheets", report.tables.len());
        Ok(())
    }

    async fn generate_sqlite(&self, path: &Path, report: &Report) -> Result<()> {
        info!("Generating SQLite output: {:?}", path);

        if path.exists() {
            fs::remove_file(path).context("Failed to replace existing SQLite database")?;
        }
        let mut conn = Connection::open(path).context("Failed to create SQLite database")?;

        conn.execute(
            "CREATE TABLE metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create metadata table")?;

        conn.execute(
            "CREATE TABLE column_docs (
                sheet TEXT NOT NULL,
                table_name TEXT NOT NULL,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                PRIMARY KEY (table_name, position)
            )",
            [],
        )
        .context("Failed to create column_docs table")?;

        conn.execute(
            "CREATE TABLE notices (
                timestamp TEXT NOT NULL,
                severity TEXT NOT NULL,
                source TEXT NOT NULL,
                sample TEXT,
                message TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create notices table")?;

        let meta = &report.metadata;
        let metadata_items = vec![
            ("generated_at", meta.generated_at.to_rfc3339()),
            ("tool_version", meta.tool_version.clone()),
            ("input_dir", meta.input_dir.display().to_string()),
            ("n_samples", meta.n_samples.to_string()),
            ("min_genome_coverage", meta.quality_requirements.min_genome_coverage.to_string()),
            ("min_median_depth", meta.quality_requirements.min_median_depth.to_string()),
            ("low_coverage_threshold", meta.quality_requirements.low_coverage_threshold.to_string()),
            ("major_allele_freq", meta.quality_requirements.major_allele_freq.to_string()),
        ];

        let tx = conn.transaction().context("Failed to start metadata transaction")?;
        for (key, value) in metadata_items {
            tx.execute("INSERT INTO metadata (key, value) VALUES (?1, ?2)", params![key, value])
                .context("Failed to insert metadata")?;
        }
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO notices (timestamp, severity, source, sample, message)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .context("Failed to prepare notices insert statement")?;
            for notice in &meta.notices {
                let severity = serde_json::to_value(notice.severity)?
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                stmt.execute(params![
                    notice.timestamp.to_rfc3339(),
                    severity,
                    notice.source,
                    notice.sample,
                    notice.message,
                ])
                .context("Failed to insert notice")?;
            }
        }
        tx.commit().context("Failed to commit metadata")?;

        for table in &report.tables {
            let tx = conn.transaction().context("Failed to start sheet transaction")?;
            write_sqlite_table(&tx, table)
                .with_context(|| format!("Failed to write sheet '{}' to SQLite", table.title))?;
            tx.commit().context("Failed to commit sheet")?;
        }

        info!("SQLite output complete: {} sheets", report.tables.len());
        Ok(())
    }
}

fn write_parquet_table(path: &Path, table: &Table) -> Result<()> {
    let kinds: Vec<ColumnKind> = (0..table.columns.len())
        .map(|idx| ColumnKind::infer(table, idx))
        .collect();

    let schema = Arc::new(Schema::new(
        table
            .columns
            .iter()
            .zip(&kinds)
            .map(|(column, kind)| {
                let field = Field::new(column.name.as_str(), kind.arrow_type(), true);
                match &column.description {
                    Some(description) => field.with_metadata(HashMap::from([(
                        "description".to_string(),
                        description.clone(),
                    )])),
                    None => field,
                }
            })
            .collect::<Vec<_>>(),
    ));

    let arrays: Vec<ArrayRef> = kinds
        .iter()
        .enumerate()
        .map(|(idx, kind)| -> ArrayRef {
            let cells = table.rows.iter().map(|row| &row[idx]);
            match kind {
                ColumnKind::Int => Arc::new(Int64Array::from(
                    cells
                        .map(|c| match c {
                            Cell::Int(i) => Some(*i),
                            _ => None,
                        })
                        .collect::<Vec<_>>(),
                )),
                ColumnKind::Float => Arc::new(Float64Array::from(cells.map(Cell::as_f64).collect::<Vec<_>>())),
                ColumnKind::Text => Arc::new(StringArray::from(
                    cells
                        .map(|c| if c.is_empty() { None } else { Some(c.render()) })
                        .collect::<Vec<_>>(),
                )),
            }
        })
        .collect();

    let batch = RecordBatch::try_new(schema.clone(), arrays).context("Failed to create Arrow RecordBatch")?;

    let file = File::create(path).context("Failed to create Parquet file")?;
    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema, Some(props)).context("Failed to create Parquet writer")?;
    writer.write(&batch).context("Failed to write Parquet data")?;
    writer.close().context("Failed to close Parquet writer")?;

    Ok(())
}

fn write_sqlite_table(conn: &Connection, table: &Table) -> Result<()> {
    let name = table.sheet.slug();
    let kinds: Vec<ColumnKind> = (0..table.columns.len())
        .map(|idx| ColumnKind::infer(table, idx))
        .collect();

    let column_defs: Vec<String> = table
        .columns
        .iter()
        .zip(&kinds)
        .map(|(column, kind)| format!("{} {}", sql_ident(&column.name), kind.sql_type()))
        .collect();
    conn.execute(&format!("CREATE TABLE {} ({})", sql_ident(name), column_defs.join(", ")), [])
        .context("Failed to create sheet table")?;

    let mut docs = conn
        .prepare(
            "INSERT INTO column_docs (sheet, table_name, position, name, description)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .context("Failed to prepare column_docs insert statement")?;
    for (position, column) in table.columns.iter().enumerate() {
        docs.execute(params![table.title, name, position as i64, column.name, column.description])
            .context("Failed to insert column documentation")?;
    }

    let placeholders: Vec<String> = (1..=table.columns.len()).map(|i| format!("?{}", i)).collect();
    let mut insert = conn
        .prepare(&format!(
            "INSERT INTO {} VALUES ({})",
            sql_ident(name),
            placeholders.join(", ")
        ))
        .context("Failed to prepare sheet insert statement")?;
    for row in &table.rows {
        insert
            .execute(params_from_iter(row.iter().map(sql_value)))
            .context("Failed to insert row")?;
    }

    Ok(())
}
