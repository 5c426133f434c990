//! Core data types shared by the scorer and the orchestrator.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One aligned (prediction, ground-truth XML, ground-truth pixel) input group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileTriple {
    pub prediction: PathBuf,
    pub gt_xml: PathBuf,
    pub gt_pixel: PathBuf,
}

impl FileTriple {
    pub fn new(
        prediction: impl Into<PathBuf>,
        gt_xml: impl Into<PathBuf>,
        gt_pixel: impl Into<PathBuf>,
    ) -> Self {
        Self {
            prediction: prediction.into(),
            gt_xml: gt_xml.into(),
            gt_pixel: gt_pixel.into(),
        }
    }
}

/// Outcome of scoring one triple: the parsed score (if any) plus the
/// scorer's full merged output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: Option<f64>,
    pub log: Vec<String>,
}

impl ScoreResult {
    pub fn new(score: Option<f64>, log: Vec<String>) -> Self {
        Self { score, log }
    }

    /// A result with no score, carrying `log` for the error report.
    pub fn failed(log: Vec<String>) -> Self {
        Self { score: None, log }
    }

    pub fn is_success(&self) -> bool {
        self.score.is_some()
    }
}

/// A score result keyed to the dispatch position of its triple.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    /// Zero-based position in dispatch order.
    pub index: usize,
    pub triple: FileTriple,
    pub result: ScoreResult,
    /// Wall time spent scoring this item in milliseconds.
    pub duration_ms: u64,
}
