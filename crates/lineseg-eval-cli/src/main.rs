//! lineseg-eval - batch line segmentation evaluation
//!
//! Scores every predicted page XML against its ground truth with the
//! external line segmentation evaluator and reports the mean line IU.
//!
//! ```bash
//! lineseg-eval \
//!     --input-folders-xml /dataset/CB55/output-m /dataset/CSG18/output-m \
//!     --gt-folders-xml /dataset/CB55/xml_gt /dataset/CSG18/xml_gt \
//!     --gt-folders-pxl /dataset/CB55/test-m /dataset/CSG18/test-m \
//!     --output-path ./eval-out \
//!     -j 8
//! ```
//!
//! The mean line IU is printed on stdout (`-1` when nothing could be
//! scored). Failed items and their evaluator output are written to
//! `stats.json` in the output directory.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lineseg_eval_core::{
    evaluate, init_tracing, BatchSummary, EvalConfig, ExternalScorer, PairingMode, ScorerConfig,
    DEFAULT_EVAL_TOOL,
};
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "lineseg-eval")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Batch evaluation of text line segmentation results", long_about = None)]
struct Cli {
    /// Folders containing predicted page XML (e.g. /dataset/CB55/output-m)
    #[arg(long, required = true, num_args = 1..)]
    input_folders_xml: Vec<PathBuf>,

    /// Folders containing ground-truth page XML (e.g. /dataset/CB55/xml_gt)
    #[arg(long, required = true, num_args = 1..)]
    gt_folders_xml: Vec<PathBuf>,

    /// Folders containing ground-truth pixel masks (e.g. /dataset/CB55/test-m)
    #[arg(long, required = true, num_args = 1..)]
    gt_folders_pxl: Vec<PathBuf>,

    /// Directory for the run report; emptied before the run
    #[arg(long, value_name = "DIR")]
    output_path: PathBuf,

    /// Evaluator to run; a .jar is started with the Java launcher.
    /// A .jar path that does not exist aborts before any item is scored.
    #[arg(long, value_name = "PATH", env = "LINESEG_EVAL_TOOL", default_value = DEFAULT_EVAL_TOOL)]
    eval_tool: PathBuf,

    /// Java launcher used for .jar evaluators
    #[arg(long, value_name = "BIN", env = "LINESEG_EVAL_JAVA", default_value = "java")]
    java: String,

    /// Number of parallel evaluator runs; 0 uses every core
    #[arg(short = 'j', long = "jobs", env = "LINESEG_EVAL_JOBS", default_value_t = 0)]
    jobs: usize,

    /// Match files by shared stem instead of sorted position
    #[arg(long)]
    match_by_stem: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn to_config(&self) -> EvalConfig {
        EvalConfig {
            prediction_dirs: self.input_folders_xml.clone(),
            gt_xml_dirs: self.gt_folders_xml.clone(),
            gt_pixel_dirs: self.gt_folders_pxl.clone(),
            output_path: self.output_path.clone(),
            workers: self.jobs,
            scorer: ScorerConfig {
                tool: self.eval_tool.clone(),
                java: self.java.clone(),
            },
            pairing: if self.match_by_stem {
                PairingMode::ByStem
            } else {
                PairingMode::Positional
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let config = cli.to_config();
    let summary = cmd_evaluate(&config).await?;

    println!("{}", summary.aggregate_score);
    Ok(())
}

/// A `.jar` evaluator must exist up front; otherwise every item would fail.
fn check_scorer(scorer: &ScorerConfig) -> Result<()> {
    if scorer.is_jar() && !scorer.tool.is_file() {
        anyhow::bail!("Evaluator jar not found: {}", scorer.tool.display());
    }
    Ok(())
}

async fn cmd_evaluate(config: &EvalConfig) -> Result<BatchSummary> {
    check_scorer(&config.scorer)?;

    info!(
        tool = %config.scorer.tool.display(),
        jobs = config.workers,
        pairing = %config.pairing,
        "Starting evaluation"
    );

    let scorer = Arc::new(ExternalScorer::new(config.scorer.clone()));
    let summary = evaluate(config, scorer)
        .await
        .with_context(|| format!("Evaluation into {:?} failed", config.output_path))?;

    if summary.errors > 0 {
        warn!(
            errors = summary.errors,
            report = %summary.report_path.display(),
            "Some items could not be scored"
        );
    }

    Ok(summary)
}
