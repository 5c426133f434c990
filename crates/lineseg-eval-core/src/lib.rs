//! Line segmentation evaluation core.
//!
//! Drives an external line-IU evaluator over a batch of page predictions:
//!
//! - [`lister`]: deterministic discovery of prediction and ground-truth files
//! - [`pairing`]: alignment of the three file lists into triples
//! - [`scorer`]: the [`Scorer`] seam and the subprocess-backed [`ExternalScorer`]
//! - [`score`]: extraction of the line IU value from scorer output
//! - [`orchestrator`]: bounded parallel dispatch, aggregation and reporting
//! - [`report`]: the persisted `stats.json`

pub mod config;
pub mod error;
pub mod lister;
pub mod orchestrator;
pub mod pairing;
pub mod report;
pub mod score;
pub mod scorer;
pub mod telemetry;
pub mod types;

pub use config::{resolve_workers, EvalConfig};
pub use error::{EvalError, Result, ScoreParseError};
pub use lister::{
    list_files, list_files_in, GT_PIXEL_EXTENSIONS, GT_XML_EXTENSIONS, PREDICTION_EXTENSIONS,
};
pub use orchestrator::{
    aggregate, evaluate, prepare_output_dir, score_all, Aggregate, BatchSummary, NO_VALID_RUNS,
};
pub use pairing::{pair_files, Pairing, PairingMode};
pub use report::{
    read_report_json, write_report_json, EvalReportArtifact, FailureArtifact, REPORT_FILE_NAME,
};
pub use score::{extract_score, find_numeric_token, LINE_IU_MARKER};
pub use scorer::{
    overlap_image_path, scorer_args, ExternalScorer, Scorer, ScorerConfig, DEFAULT_EVAL_TOOL,
};
pub use telemetry::init_tracing;
pub use types::{FileTriple, ItemOutcome, ScoreResult};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
