//! Persisted run report (`stats.json`).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::pairing::PairingMode;
use crate::types::ItemOutcome;

/// File name of the report inside the output directory.
pub const REPORT_FILE_NAME: &str = "stats.json";

pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// One failed item: enough to locate the inputs plus the scorer's output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureArtifact {
    pub index: usize,
    pub prediction: PathBuf,
    pub gt_xml: PathBuf,
    pub gt_pixel: PathBuf,
    pub duration_ms: u64,
    pub log: Vec<String>,
}

impl From<&ItemOutcome> for FailureArtifact {
    fn from(outcome: &ItemOutcome) -> Self {
        Self {
            index: outcome.index,
            prediction: outcome.triple.prediction.clone(),
            gt_xml: outcome.triple.gt_xml.clone(),
            gt_pixel: outcome.triple.gt_pixel.clone(),
            duration_ms: outcome.duration_ms,
            log: outcome.result.log.clone(),
        }
    }
}

/// Summary and failures of one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalReportArtifact {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub eval_tool: PathBuf,
    pub workers: usize,
    pub pairing: PairingMode,
    pub total_items: usize,
    pub dropped_items: usize,
    pub successes: usize,
    pub errors: usize,
    /// Mean line IU over successful items, `-1` when there were none.
    pub avg_line_iu: f64,
    pub failures: Vec<FailureArtifact>,
}

/// Write the report as pretty JSON.
pub fn write_report_json(path: &Path, artifact: &EvalReportArtifact) -> Result<()> {
    let content = serde_json::to_string_pretty(artifact)?;
    std::fs::write(path, content).map_err(|source| EvalError::Report {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a previously written report.
pub fn read_report_json(path: &Path) -> Result<EvalReportArtifact> {
    let content = std::fs::read_to_string(path).map_err(|source| EvalError::Report {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}
