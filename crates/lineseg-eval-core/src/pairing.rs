//! Alignment of the three discovered path lists into triples.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EvalError, Result};
use crate::types::FileTriple;

/// How predictions are matched with their ground truth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingMode {
    /// Zip the sorted lists by position, truncating to the shortest.
    #[default]
    Positional,

    /// Match on the shared file stem (with any `_gt` suffix removed) and
    /// fail on anything left unmatched.
    ByStem,
}

impl fmt::Display for PairingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairingMode::Positional => write!(f, "positional"),
            PairingMode::ByStem => write!(f, "by_stem"),
        }
    }
}

/// Triples ready for dispatch plus how many listed files were left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub triples: Vec<FileTriple>,
    /// Files from the longer lists that had no positional partner.
    pub dropped_items: usize,
}

/// Pair the three lists according to `mode`.
pub fn pair_files(
    mode: PairingMode,
    predictions: Vec<PathBuf>,
    gt_xml: Vec<PathBuf>,
    gt_pixel: Vec<PathBuf>,
) -> Result<Pairing> {
    match mode {
        PairingMode::Positional => Ok(pair_positional(predictions, gt_xml, gt_pixel)),
        PairingMode::ByStem => pair_by_stem(predictions, gt_xml, gt_pixel),
    }
}

/// Zip by position. Any length mismatch is reported, never silently dropped.
pub fn pair_positional(
    predictions: Vec<PathBuf>,
    gt_xml: Vec<PathBuf>,
    gt_pixel: Vec<PathBuf>,
) -> Pairing {
    let (np, nx, ng) = (predictions.len(), gt_xml.len(), gt_pixel.len());
    let kept = np.min(nx).min(ng);
    let dropped_items = (np - kept) + (nx - kept) + (ng - kept);

    if dropped_items > 0 {
        warn!(
            predictions = np,
            gt_xml = nx,
            gt_pixel = ng,
            kept,
            dropped = dropped_items,
            "input lists differ in length, truncating to the shortest"
        );
    }

    let triples = predictions
        .into_iter()
        .zip(gt_xml)
        .zip(gt_pixel)
        .map(|((prediction, gt_xml), gt_pixel)| FileTriple {
            prediction,
            gt_xml,
            gt_pixel,
        })
        .collect();

    Pairing {
        triples,
        dropped_items,
    }
}

/// Matching key for a path: file stem with a trailing `_gt` removed.
pub fn stem_key(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.strip_suffix("_gt") {
        Some(base) => base.to_string(),
        None => stem,
    }
}

fn index_by_stem(family: &str, paths: Vec<PathBuf>) -> Result<BTreeMap<String, PathBuf>> {
    let mut map = BTreeMap::new();
    for path in paths {
        let key = stem_key(&path);
        if let Some(previous) = map.insert(key.clone(), path) {
            return Err(EvalError::Pairing(format!(
                "{family}: stem '{key}' is claimed by more than one file (first: {})",
                previous.display()
            )));
        }
    }
    Ok(map)
}

/// Match the three lists on [`stem_key`], in sorted key order.
pub fn pair_by_stem(
    predictions: Vec<PathBuf>,
    gt_xml: Vec<PathBuf>,
    gt_pixel: Vec<PathBuf>,
) -> Result<Pairing> {
    let predictions = index_by_stem("predictions", predictions)?;
    let mut gt_xml = index_by_stem("gt_xml", gt_xml)?;
    let mut gt_pixel = index_by_stem("gt_pixel", gt_pixel)?;

    let mut unmatched = Vec::new();
    let mut triples = Vec::new();

    for (key, prediction) in predictions {
        match (gt_xml.remove(&key), gt_pixel.remove(&key)) {
            (Some(xml), Some(pixel)) => triples.push(FileTriple {
                prediction,
                gt_xml: xml,
                gt_pixel: pixel,
            }),
            (xml, pixel) => {
                let mut missing = Vec::new();
                if xml.is_none() {
                    missing.push("gt_xml");
                }
                if pixel.is_none() {
                    missing.push("gt_pixel");
                }
                unmatched.push(format!("'{key}' missing from {}", missing.join(" and ")));
            }
        }
    }
    for key in gt_xml.keys() {
        unmatched.push(format!("'{key}' has gt_xml but no prediction"));
    }
    for key in gt_pixel.keys() {
        unmatched.push(format!("'{key}' has gt_pixel but no prediction"));
    }

    if !unmatched.is_empty() {
        return Err(EvalError::Pairing(format!(
            "{} unmatched stem(s): {}",
            unmatched.len(),
            unmatched.join("; ")
        )));
    }

    Ok(Pairing {
        triples,
        dropped_items: 0,
    })
}
