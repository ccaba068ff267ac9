// ==============================================================================
// parsers/exec_report.rs - Nextflow Execution Report Parser
// ==============================================================================
// Description: Workflow run metadata scraped from the Nextflow
//              `execution_report*.html` written at the end of a run
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;

use crate::run_log::RunLog;
use crate::table::{Cell, Column, SheetName, Table};

const SOURCE: &str = "exec_report";

#[derive(Error, Debug)]
pub enum ExecReportError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("Element not found: {0}")]
    MissingElement(&'static str),
}

/// Nextflow workflow execution information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowExecInfo {
    pub workflow: String,
    pub execution_id: String,
    pub start_time: String,
    pub completion_time: String,
    pub command: String,
    pub project_directory: String,
    pub launch_directory: String,
    pub workflow_profile: String,
    pub container: Option<String>,
    pub nextflow_version: String,
}

impl WorkflowExecInfo {
    /// (attribute, value) pairs in display order
    pub fn attributes(&self) -> Vec<(&'static str, Option<&str>)> {
        vec![
            ("workflow", Some(self.workflow.as_str())),
            ("execution_id", Some(self.execution_id.as_str())),
            ("start_time", Some(self.start_time.as_str())),
            ("completion_time", Some(self.completion_time.as_str())),
            ("command", Some(self.command.as_str())),
            ("project_directory", Some(self.project_directory.as_str())),
            ("launch_directory", Some(self.launch_directory.as_str())),
            ("workflow_profile", Some(self.workflow_profile.as_str())),
            ("container", self.container.as_deref()),
            ("nextflow_version", Some(self.nextflow_version.as_str())),
        ]
    }
}

/// Most recently modified `execution_report*.html` beneath `root`
pub fn find_exec_report(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            name.starts_with("execution_report") && name.ends_with(".html")
        })
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            Some((modified, entry.into_path()))
        })
        .max_by(|(a_time, a_path), (b_time, b_path)| a_time.cmp(b_time).then_with(|| b_path.cmp(a_path)))
        .map(|(_, path)| path)
}

fn selector(css: &'static str) -> Result<Selector, ExecReportError> {
    Selector::parse(css).map_err(|e| ExecReportError::InvalidSelector(format!("{}: {}", css, e)))
}

fn first_text(html: &Html, css: &'static str) -> Result<String, ExecReportError> {
    html.select(&selector(css)?)
        .next()
        .map(|el| el.text().collect::<String>())
        .ok_or(ExecReportError::MissingElement(css))
}

pub fn read_exec_report(path: &Path) -> Result<WorkflowExecInfo, ExecReportError> {
    parse(&fs::read_to_string(path)?)
}

/// Parse the contents of a Nextflow execution report
pub fn parse(document: &str) -> Result<WorkflowExecInfo, ExecReportError> {
    let html = Html::parse_document(document);

    let title = first_text(&html, "head > title")?;
    let execution_id = Regex::new(r"\[(\w+)\].*")?.replace(title.trim(), "$1").into_owned();

    let command = first_text(&html, ".nfcommand")?;
    let start_time = first_text(&html, "#workflow_start")?;
    let completion_time = first_text(&html, "#workflow_complete")?;

    let row = first_text(&html, ".container .row")?;
    let lines: Vec<&str> = row.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let attrs: HashMap<&str, &str> = lines
        .chunks(2)
        .filter_map(|pair| match pair {
            [key, value] => Some((*key, *value)),
            _ => None,
        })
        .collect();
    let attr = |key: &str, default: &str| attrs.get(key).copied().unwrap_or(default).to_string();

    let project_directory = attr("Project directory", "UNKNOWN");
    let workflow = Path::new(&project_directory)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| project_directory.clone());

    let container = match (attrs.get("Container engine"), attrs.get("Workflow container")) {
        (Some(engine), Some(image)) => Some(format!("{} - {}", engine, image)),
        _ => None,
    };

    Ok(WorkflowExecInfo {
        workflow,
        execution_id,
        start_time: start_time.trim().to_string(),
        completion_time: completion_time.trim().to_string(),
        command: command.trim().replace(" -", " \\\n  -"),
        project_directory,
        launch_directory: attr("Launch directory", "UNKNOWN"),
        workflow_profile: attr("Workflow profile", "NA"),
        container,
        nextflow_version: attr("Nextflow version", "UNKNOWN"),
    })
}

/// Workflow execution info from the newest execution report under `root`
pub fn collect(root: &Path, log: &mut RunLog) -> Option<WorkflowExecInfo> {
    let Some(path) = find_exec_report(root) else {
        log.warn(
            SOURCE,
            None,
            format!(
                "Could not find Nextflow execution report in \"{}\". \
                 Did you specify the input directory as a Nextflow output directory?",
                root.display()
            ),
        );
        return None;
    };

    log.info(SOURCE, None, format!("Found Nextflow execution report \"{}\"", path.display()));
    match read_exec_report(&path) {
        Ok(info) => Some(info),
        Err(e) => {
            log.error(SOURCE, None, format!("Could not parse {}: {}", path.display(), e));
            None
        }
    }
}

/// The Workflow Info sheet as Attribute/Value rows
pub fn to_table(info: &WorkflowExecInfo) -> Table {
    let mut table = Table::new(
        SheetName::WorkflowInfo,
        vec![
            Column::new("Attribute", "Workflow execution attribute"),
            Column::new("Value", "Attribute value"),
        ],
    );
    for (name, value) in info.attributes() {
        table.push_row(vec![Cell::text(name), Cell::opt_text(value)]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const REPORT: &str = r#"<!DOCTYPE html>
<html>
<head><title>[sharp_euler] Nextflow Workflow Report</title></head>
<body>
<div class="container">
  <div class="row">
    <dl>
      <dt>Project directory</dt>
      <dd>/home/user/.nextflow/assets/peterk87/nf-virontus</dd>
      <dt>Launch directory</dt>
      <dd>/data/run1</dd>
      <dt>Workflow profile</dt>
      <dd>singularity</dd>
      <dt>Container engine</dt>
      <dd>singularity</dd>
      <dt>Workflow container</dt>
      <dd>virontus.sif</dd>
      <dt>Nextflow version</dt>
      <dd>version 21.04.0, build 5552</dd>
    </dl>
  </div>
  <pre class="nfcommand">nextflow run peterk87/nf-virontus -profile singularity --reads 'reads/*.fastq'</pre>
  <span id="workflow_start">18-May-2021 13:39:50</span>
  <span id="workflow_complete">18-May-2021 14:02:11</span>
</div>
</body>
</html>"#;

    #[test]
    fn test_parse_report() {
        let info = parse(REPORT).unwrap();
        assert_eq!(info.execution_id, "sharp_euler");
        assert_eq!(info.workflow, "nf-virontus");
        assert_eq!(info.launch_directory, "/data/run1");
        assert_eq!(info.workflow_profile, "singularity");
        assert_eq!(info.container.as_deref(), Some("singularity - virontus.sif"));
        assert_eq!(info.nextflow_version, "version 21.04.0, build 5552");
        assert_eq!(info.start_time, "18-May-2021 13:39:50");
        assert_eq!(
            info.command,
            "nextflow run peterk87/nf-virontus \\\n  -profile singularity \\\n  --reads 'reads/*.fastq'"
        );
    }

    #[test]
    fn test_defaults_for_missing_attributes() {
        let minimal = r#"<html><head><title>[abc] x</title></head><body>
            <div class="container"><div class="row">Nothing</div></div>
            <pre class="nfcommand">nextflow run x</pre>
            <span id="workflow_start">a</span><span id="workflow_complete">b</span>
            </body></html>"#;
        let info = parse(minimal).unwrap();
        assert_eq!(info.project_directory, "UNKNOWN");
        assert_eq!(info.workflow, "UNKNOWN");
        assert_eq!(info.workflow_profile, "NA");
        assert!(info.container.is_none());
    }

    #[test]
    fn test_missing_element() {
        let err = parse("<html><head><title>[a] b</title></head></html>").unwrap_err();
        assert!(matches!(err, ExecReportError::MissingElement(".nfcommand")));
    }

    #[test]
    fn test_collect_and_table() {
        let dir = TempDir::new().unwrap();
        let info_dir = dir.path().join("pipeline_info");
        std::fs::create_dir_all(&info_dir).unwrap();
        std::fs::write(info_dir.join("execution_report.html"), REPORT).unwrap();

        let mut log = RunLog::new();
        let info = collect(dir.path(), &mut log).unwrap();
        let table = to_table(&info);
        assert_eq!(table.sheet, SheetName::WorkflowInfo);
        assert_eq!(table.len(), 10);
        assert_eq!(table.rows[1], vec![Cell::text("execution_id"), Cell::text("sharp_euler")]);
    }

    #[test]
    fn test_collect_missing_report_warns() {
        let dir = TempDir::new().unwrap();
        let mut log = RunLog::new();
        assert!(collect(dir.path(), &mut log).is_none());
        assert!(!log.is_empty());
    }
}
