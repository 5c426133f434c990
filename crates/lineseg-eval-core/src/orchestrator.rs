//! Batch orchestration: discover, pair, fan out, aggregate, report.
//!
//! A run never aborts because of one bad item. Only discovery, pairing,
//! output-directory and report errors propagate; everything that goes wrong
//! while scoring a triple ends up in the failure list instead.
//!
//! There is no per-item timeout. A scorer that never exits stalls the batch.

use std::any::Any;
use std::fs;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::config::EvalConfig;
use crate::error::{EvalError, Result};
use crate::lister::{list_files_in, GT_PIXEL_EXTENSIONS, GT_XML_EXTENSIONS, PREDICTION_EXTENSIONS};
use crate::pairing::pair_files;
use crate::report::{
    write_report_json, EvalReportArtifact, FailureArtifact, REPORT_FILE_NAME,
    REPORT_SCHEMA_VERSION,
};
use crate::scorer::Scorer;
use crate::types::{FileTriple, ItemOutcome, ScoreResult};

/// Aggregate reported when no item produced a score.
pub const NO_VALID_RUNS: f64 = -1.0;

/// Outcome of one evaluation run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    /// Mean line IU over successful items, or [`NO_VALID_RUNS`].
    pub aggregate_score: f64,
    pub successes: usize,
    /// Number of items without a score.
    pub errors: usize,
    pub failures: Vec<ItemOutcome>,
    pub total_items: usize,
    pub dropped_items: usize,
    pub elapsed_ms: u64,
    pub report_path: PathBuf,
}

/// Successful/failed split of a set of outcomes.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub aggregate_score: f64,
    pub successes: usize,
    pub failures: Vec<ItemOutcome>,
}

/// Mean of the scored outcomes; unscored ones become failures.
pub fn aggregate(outcomes: Vec<ItemOutcome>) -> Aggregate {
    let mut scores = Vec::new();
    let mut failures = Vec::new();

    for outcome in outcomes {
        match outcome.result.score {
            Some(score) => scores.push(score),
            None => failures.push(outcome),
        }
    }

    let aggregate_score = if scores.is_empty() {
        NO_VALID_RUNS
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };

    Aggregate {
        aggregate_score,
        successes: scores.len(),
        failures,
    }
}

/// Create `path` if missing, otherwise empty it.
///
/// Removal of each direct child is attempted independently; a child that
/// cannot be removed is logged and skipped.
pub fn prepare_output_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|source| EvalError::OutputDir {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "created output directory");
        return Ok(());
    }

    let entries = fs::read_dir(path).map_err(|source| EvalError::OutputDir {
        path: path.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read output directory entry");
                continue;
            }
        };
        let child = entry.path();
        let removal = match entry.file_type() {
            Ok(ft) if ft.is_dir() => fs::remove_dir_all(&child),
            Ok(_) => fs::remove_file(&child),
            Err(e) => Err(e),
        };
        if let Err(e) = removal {
            warn!(path = %child.display(), error = %e, "failed to remove stale output entry");
        }
    }

    Ok(())
}

/// Score every triple on a pool of `workers` concurrent slots.
///
/// The pool lives for the duration of this call. Results come back in
/// dispatch order whatever order the workers finish in. A worker that panics
/// is recorded as a failed item carrying the panic message.
pub async fn score_all(
    triples: Vec<FileTriple>,
    scorer: Arc<dyn Scorer>,
    workers: usize,
) -> Vec<ItemOutcome> {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut join_set = JoinSet::new();

    for (index, triple) in triples.iter().cloned().enumerate() {
        let scorer = Arc::clone(&scorer);
        let semaphore = Arc::clone(&semaphore);
        join_set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let start = Instant::now();
            let result = match AssertUnwindSafe(scorer.score(&triple)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(index, prediction = %triple.prediction.display(), %message, "scorer panicked");
                    ScoreResult::failed(vec![format!("scorer panicked: {message}")])
                }
            };
            ItemOutcome {
                index,
                triple,
                result,
                duration_ms: start.elapsed().as_millis() as u64,
            }
        });
    }

    let mut slots: Vec<Option<ItemOutcome>> = (0..triples.len()).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(outcome) => {
                let index = outcome.index;
                slots[index] = Some(outcome);
            }
            Err(e) => warn!(error = %e, "scoring task did not complete"),
        }
    }

    triples
        .into_iter()
        .zip(slots)
        .enumerate()
        .map(|(index, (triple, slot))| {
            slot.unwrap_or_else(|| ItemOutcome {
                index,
                triple,
                result: ScoreResult::failed(vec!["scoring task did not complete".to_string()]),
                duration_ms: 0,
            })
        })
        .collect()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run one full evaluation.
///
/// Discovers the three input families, pairs them, clears the output
/// directory, scores every triple, writes `stats.json` and returns the
/// summary.
#[instrument(skip(config, scorer), fields(output = %config.output_path.display()))]
pub async fn evaluate(config: &EvalConfig, scorer: Arc<dyn Scorer>) -> Result<BatchSummary> {
    let predictions = list_files_in(&config.prediction_dirs, PREDICTION_EXTENSIONS)?;
    let gt_xml = list_files_in(&config.gt_xml_dirs, GT_XML_EXTENSIONS)?;
    let gt_pixel = list_files_in(&config.gt_pixel_dirs, GT_PIXEL_EXTENSIONS)?;
    info!(
        predictions = predictions.len(),
        gt_xml = gt_xml.len(),
        gt_pixel = gt_pixel.len(),
        "discovered input files"
    );

    let start = Instant::now();

    // Pair before touching the output so a pairing error leaves the
    // previous run's report in place.
    let pairing = pair_files(config.pairing, predictions, gt_xml, gt_pixel)?;
    prepare_output_dir(&config.output_path)?;

    let workers = config.resolved_workers();
    let total_items = pairing.triples.len();
    info!(items = total_items, workers, pairing = %config.pairing, "dispatching scorer runs");

    let outcomes = score_all(pairing.triples, scorer, workers).await;
    let Aggregate {
        aggregate_score,
        successes,
        failures,
    } = aggregate(outcomes);
    let errors = failures.len();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let report_path = config.output_path.join(REPORT_FILE_NAME);
    let artifact = EvalReportArtifact {
        schema_version: REPORT_SCHEMA_VERSION.to_string(),
        generated_at: Utc::now(),
        elapsed_ms,
        eval_tool: config.scorer.tool.clone(),
        workers,
        pairing: config.pairing,
        total_items,
        dropped_items: pairing.dropped_items,
        successes,
        errors,
        avg_line_iu: aggregate_score,
        failures: failures.iter().map(FailureArtifact::from).collect(),
    };
    write_report_json(&report_path, &artifact)?;

    info!(
        elapsed_secs = %format!("{:.2}", elapsed_ms as f64 / 1000.0),
        avg_line_iu = aggregate_score,
        nb_errors = errors,
        "evaluation finished"
    );

    Ok(BatchSummary {
        aggregate_score,
        successes,
        errors,
        failures,
        total_items,
        dropped_items: pairing.dropped_items,
        elapsed_ms,
        report_path,
    })
}
