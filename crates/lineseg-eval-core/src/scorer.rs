//! External scorer invocation.
//!
//! The scorer is treated as a synchronous RPC with a text response: build the
//! argument list for one triple, run the tool to completion, capture its merged
//! stdout/stderr and parse the line IU value out of it. The [`Scorer`] trait is
//! the seam the orchestrator depends on.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::score::{extract_score, LINE_IU_MARKER};
use crate::types::{FileTriple, ScoreResult};

/// Default location of the evaluator jar, relative to the working directory.
pub const DEFAULT_EVAL_TOOL: &str = "./util/LineSegmentationEvaluator.jar";

/// Directory segment identifying the ground-truth XML tree.
const GT_XML_DIR_SEGMENT: &str = "xml_gt";
/// Sibling directory segment holding the original page images.
const ORIGINAL_IMAGE_DIR_SEGMENT: &str = "ori_img";
const GT_XML_SUFFIX: &str = "_gt.xml";
const ORIGINAL_IMAGE_SUFFIX: &str = ".jpg";

/// Anything that can score a single triple.
///
/// Implementations never fail: problems are reported through a `ScoreResult`
/// with no score and an explanatory log.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, triple: &FileTriple) -> ScoreResult;
}

/// How to launch the external scoring tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Path to the tool. A `.jar` is run through `java -jar`.
    pub tool: PathBuf,

    /// Java launcher used for `.jar` tools.
    pub java: String,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            tool: PathBuf::from(DEFAULT_EVAL_TOOL),
            java: "java".to_string(),
        }
    }
}

impl ScorerConfig {
    /// Whether the tool has to be started through the Java launcher.
    pub fn is_jar(&self) -> bool {
        self.tool
            .extension()
            .map(|ext| ext == "jar")
            .unwrap_or(false)
    }
}

/// Derive the original page image used for the overlap visualisation.
///
/// `.../xml_gt/.../page_gt.xml` maps to `.../ori_img/.../page.jpg`.
pub fn overlap_image_path(gt_xml: &Path) -> PathBuf {
    let dir = gt_xml
        .parent()
        .map(|p| p.to_string_lossy().replace(GT_XML_DIR_SEGMENT, ORIGINAL_IMAGE_DIR_SEGMENT))
        .unwrap_or_default();
    let name = gt_xml
        .file_name()
        .map(|n| n.to_string_lossy().replace(GT_XML_SUFFIX, ORIGINAL_IMAGE_SUFFIX))
        .unwrap_or_default();
    PathBuf::from(dir).join(name)
}

/// Tool arguments for one triple, in the order the evaluator expects.
pub fn scorer_args(triple: &FileTriple) -> Vec<OsString> {
    vec![
        "-igt".into(),
        triple.gt_pixel.clone().into_os_string(),
        "-xgt".into(),
        triple.gt_xml.clone().into_os_string(),
        "-overlap".into(),
        overlap_image_path(&triple.gt_xml).into_os_string(),
        "-xp".into(),
        triple.prediction.clone().into_os_string(),
        "-csv".into(),
    ]
}

/// Runs the external evaluator as a subprocess.
#[derive(Debug, Clone)]
pub struct ExternalScorer {
    config: ScorerConfig,
}

impl ExternalScorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Full command line (program first) for one triple.
    pub fn command_line(&self, triple: &FileTriple) -> Vec<OsString> {
        let mut argv: Vec<OsString> = Vec::new();
        if self.config.is_jar() {
            argv.push(self.config.java.clone().into());
            argv.push("-jar".into());
        }
        argv.push(self.config.tool.clone().into_os_string());
        argv.extend(scorer_args(triple));
        argv
    }

    /// Run the tool and return its merged output lines and exit status.
    ///
    /// Read errors are recorded in the returned log rather than aborting.
    async fn run(&self, triple: &FileTriple) -> std::io::Result<(Vec<String>, ExitStatus)> {
        let argv = self.command_line(triple);
        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let log = match (stdout, stderr) {
            (Some(out), Some(err)) => capture_merged(out, err).await,
            _ => vec!["scorer output pipes were not available".to_string()],
        };

        let status = child.wait().await?;
        Ok((log, status))
    }
}

#[async_trait]
impl Scorer for ExternalScorer {
    async fn score(&self, triple: &FileTriple) -> ScoreResult {
        let start = Instant::now();
        info!(prediction = %triple.prediction.display(), "starting scorer");

        let mut log = match self.run(triple).await {
            Ok((log, status)) => {
                debug!(
                    prediction = %triple.prediction.display(),
                    exit_code = status.code().unwrap_or(-1),
                    "scorer exited"
                );
                log
            }
            Err(e) => {
                warn!(
                    prediction = %triple.prediction.display(),
                    tool = %self.config.tool.display(),
                    error = %e,
                    "failed to run scorer"
                );
                vec![format!(
                    "failed to run scorer {}: {}",
                    self.config.tool.display(),
                    e
                )]
            }
        };

        let score = match extract_score(&log, LINE_IU_MARKER) {
            Ok(score) => score,
            Err(e) => {
                log.push(e.to_string());
                None
            }
        };

        info!(
            prediction = %triple.prediction.display(),
            score = ?score,
            duration_ms = start.elapsed().as_millis() as u64,
            "scorer finished"
        );
        ScoreResult::new(score, log)
    }
}

/// Drain two streams concurrently, interleaving lines in arrival order.
async fn capture_merged<O, E>(stdout: O, stderr: E) -> Vec<String>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out = BufReader::new(stdout).split(b'\n');
    let mut err = BufReader::new(stderr).split(b'\n');
    let mut out_open = true;
    let mut err_open = true;
    let mut lines = Vec::new();

    while out_open || err_open {
        tokio::select! {
            segment = out.next_segment(), if out_open => {
                out_open = push_segment(&mut lines, segment, "stdout");
            }
            segment = err.next_segment(), if err_open => {
                err_open = push_segment(&mut lines, segment, "stderr");
            }
        }
    }

    lines
}

/// Append one segment; returns whether the stream is still open.
///
/// A read error closes only that stream. The other one keeps draining, so
/// the log holds whatever arrived plus the error line.
fn push_segment(
    lines: &mut Vec<String>,
    segment: std::io::Result<Option<Vec<u8>>>,
    stream: &str,
) -> bool {
    match segment {
        Ok(Some(bytes)) => {
            let text = String::from_utf8_lossy(&bytes);
            lines.push(text.strip_suffix('\r').unwrap_or(&text).to_string());
            true
        }
        Ok(None) => false,
        Err(e) => {
            lines.push(format!("error reading scorer {stream}: {e}"));
            false
        }
    }
}
