//! Run configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::pairing::PairingMode;
use crate::scorer::ScorerConfig;

/// Everything one evaluation run needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Roots holding predicted page XML.
    pub prediction_dirs: Vec<PathBuf>,

    /// Roots holding ground-truth page XML.
    pub gt_xml_dirs: Vec<PathBuf>,

    /// Roots holding ground-truth pixel masks.
    pub gt_pixel_dirs: Vec<PathBuf>,

    /// Directory that is cleared and receives the report.
    pub output_path: PathBuf,

    /// Worker count; `0` means one per logical core.
    pub workers: usize,

    pub scorer: ScorerConfig,

    pub pairing: PairingMode,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            prediction_dirs: Vec::new(),
            gt_xml_dirs: Vec::new(),
            gt_pixel_dirs: Vec::new(),
            output_path: PathBuf::from("output"),
            workers: 0,
            scorer: ScorerConfig::default(),
            pairing: PairingMode::default(),
        }
    }
}

impl EvalConfig {
    /// Worker pool size after resolving `0` to the core count.
    pub fn resolved_workers(&self) -> usize {
        resolve_workers(self.workers)
    }
}

/// `0` → number of logical cores, anything else is used as given.
pub fn resolve_workers(configured: usize) -> usize {
    if configured == 0 {
        num_cpus::get()
    } else {
        configured
    }
}
