// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers for viral-sequencing workflow output formats
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

pub mod consensus;
pub mod ct;
pub mod depth;
pub mod exec_report;
pub mod fastp;
pub mod flagstat;
pub mod nextclade;
pub mod pangolin;
pub mod snpsift;
pub mod vcf;

pub use consensus::{ConsensusError, ConsensusSequence};
pub use ct::CtError;
pub use depth::DepthError;
pub use exec_report::{ExecReportError, WorkflowExecInfo};
pub use fastp::FastpError;
pub use flagstat::{FlagstatError, MaxReadCount};
pub use nextclade::NEXTCLADE_COLUMNS;
pub use pangolin::PANGOLIN_COLUMNS;
pub use snpsift::{MaxTableRows, SnpSiftError};
pub use vcf::{MaxVariantRows, VariantCaller, VcfError, VcfTable};

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Bytes of a gzip member header up to and including the first extra subfield ID
const BGZF_HEADER_LEN: usize = 14;

/// Compression of a workflow output file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCompression {
    None,
    Gzip,
    /// Blocked gzip (bgzip/htslib), marked by a `BC` extra subfield
    Bgzf,
}

impl FileCompression {
    fn from_magic(header: &[u8]) -> Self {
        if header.len() < 2 || header[..2] != GZIP_MAGIC {
            return FileCompression::None;
        }
        let has_extra = header.get(3).is_some_and(|flg| flg & 0x04 != 0);
        if has_extra && header.len() >= BGZF_HEADER_LEN && &header[12..14] == b"BC" {
            FileCompression::Bgzf
        } else {
            FileCompression::Gzip
        }
    }
}

/// Compression of the file at `path`
pub fn detect_compression(path: &Path) -> io::Result<FileCompression> {
    let mut file = File::open(path)?;
    let mut header = [0u8; BGZF_HEADER_LEN];
    let n = read_up_to(&mut file, &mut header)?;
    Ok(FileCompression::from_magic(&header[..n]))
}

/// Open a text file, transparently decompressing gzip/BGZF content
///
/// Compression is detected from the magic number rather than the
/// extension, since workflow outputs are not always named consistently.
/// Plain gzip is handled with a multi-member decoder; bgzip output goes
/// through the BGZF block reader.
pub fn open_text(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let compression = detect_compression(path)?;
    let file = File::open(path)?;

    Ok(match compression {
        FileCompression::Bgzf => Box::new(noodles_bgzf::io::Reader::new(file)),
        FileCompression::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(file))),
        FileCompression::None => Box::new(BufReader::new(file)),
    })
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Errors shared by the lineage/clade table parsers
#[derive(Error, Debug)]
pub enum CsvTableError {
    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Missing required column: {0}")]
    MissingColumn(String),
}

/// Header + string records of a delimited text table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DelimitedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DelimitedTable {
    /// Read a delimited file with a header row
    ///
    /// Rows may be ragged; short rows are padded with empty fields.
    pub fn read(path: &Path, delimiter: u8) -> Result<Self, csv::Error> {
        let reader = open_text(path)?;
        Self::from_reader(reader, delimiter)
    }

    pub fn from_reader(reader: impl Read, delimiter: u8) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len().max(row.len()), String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Field `name` of `row`, if the column exists
    pub fn get<'a>(&self, row: &'a [String], name: &str) -> Option<&'a str> {
        self.column_index(name)
            .and_then(|idx| row.get(idx))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
