//! Batch evaluation against an in-memory scorer.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lineseg_eval_core::{
    evaluate, read_report_json, EvalConfig, EvalError, FileTriple, PairingMode, ScoreResult,
    Scorer, ScorerConfig, NO_VALID_RUNS, REPORT_FILE_NAME,
};
use tempfile::TempDir;

/// Returns a fixed score per prediction stem; unknown stems fail.
struct FakeScorer {
    scores: HashMap<String, Option<f64>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeScorer {
    fn new(scores: &[(&str, Option<f64>)]) -> Self {
        Self {
            scores: scores
                .iter()
                .map(|(stem, score)| (stem.to_string(), *score))
                .collect(),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Scorer for FakeScorer {
    async fn score(&self, triple: &FileTriple) -> ScoreResult {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let stem = triple
            .prediction
            .file_stem()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        let result = match self.scores.get(&stem).copied().flatten() {
            Some(score) => ScoreResult::new(
                Some(score),
                vec![format!("line IU = {score}")],
            ),
            None => ScoreResult::failed(vec![format!("no line IU for {stem}")]),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"").unwrap();
}

/// Lay out `pages` under predictions/, xml_gt/ and pixel_gt/.
fn dataset(pages: &[&str]) -> TempDir {
    let root = tempfile::tempdir().unwrap();
    for page in pages {
        touch(&root.path().join(format!("predictions/{page}.xml")));
        touch(&root.path().join(format!("xml_gt/{page}_gt.xml")));
        touch(&root.path().join(format!("pixel_gt/{page}_gt.png")));
    }
    root
}

fn config_for(root: &Path, workers: usize) -> EvalConfig {
    EvalConfig {
        prediction_dirs: vec![root.join("predictions")],
        gt_xml_dirs: vec![root.join("xml_gt")],
        gt_pixel_dirs: vec![root.join("pixel_gt")],
        output_path: root.join("out"),
        workers,
        scorer: ScorerConfig::default(),
        pairing: PairingMode::Positional,
    }
}

fn report_path(root: &Path) -> PathBuf {
    root.join("out").join(REPORT_FILE_NAME)
}

#[tokio::test]
async fn all_successes_average_and_no_errors() {
    let root = dataset(&["p1", "p2", "p3", "p4"]);
    let scorer = Arc::new(FakeScorer::new(&[
        ("p1", Some(0.5)),
        ("p2", Some(0.75)),
        ("p3", Some(1.0)),
        ("p4", Some(0.25)),
    ]));

    let summary = evaluate(&config_for(root.path(), 3), scorer.clone())
        .await
        .expect("evaluate failed");

    assert!((summary.aggregate_score - 0.625).abs() < 1e-12);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.successes, 4);
    assert_eq!(summary.total_items, 4);
    assert_eq!(scorer.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn all_failures_yield_sentinel() {
    let root = dataset(&["p1", "p2", "p3"]);
    let scorer = Arc::new(FakeScorer::new(&[]));

    let summary = evaluate(&config_for(root.path(), 0), scorer)
        .await
        .expect("evaluate failed");

    assert_eq!(summary.aggregate_score, NO_VALID_RUNS);
    assert_eq!(summary.errors, 3);
    assert_eq!(summary.successes, 0);

    let report = read_report_json(&report_path(root.path())).unwrap();
    assert_eq!(report.failures.len(), 3);
    assert_eq!(report.avg_line_iu, -1.0);
}

#[tokio::test]
async fn three_triples_two_workers_one_failure() {
    let root = dataset(&["p1", "p2", "p3"]);
    let scorer = Arc::new(FakeScorer::new(&[
        ("p1", Some(0.9)),
        ("p2", None),
        ("p3", Some(0.7)),
    ]));

    let summary = evaluate(&config_for(root.path(), 2), scorer)
        .await
        .expect("evaluate failed");

    assert!((summary.aggregate_score - 0.8).abs() < 1e-12);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.report_path, report_path(root.path()));

    let report = read_report_json(&summary.report_path).unwrap();
    assert_eq!(report.workers, 2);
    assert_eq!(report.errors, 1);
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.index, 1);
    assert!(failure.prediction.ends_with("predictions/p2.xml"));
    assert!(failure.gt_xml.ends_with("xml_gt/p2_gt.xml"));
    assert!(failure.gt_pixel.ends_with("pixel_gt/p2_gt.png"));
    assert_eq!(failure.log, vec!["no line IU for p2".to_string()]);
}

#[tokio::test]
async fn rerun_refreshes_output_directory() {
    let root = dataset(&["p1", "p2"]);
    let scorer = Arc::new(FakeScorer::new(&[("p1", Some(0.4)), ("p2", Some(0.6))]));
    let config = config_for(root.path(), 2);

    let first = evaluate(&config, scorer.clone()).await.unwrap();

    let out = root.path().join("out");
    fs::write(out.join("stale.txt"), b"left over").unwrap();
    fs::create_dir_all(out.join("overlaps/old")).unwrap();

    let second = evaluate(&config, scorer).await.unwrap();

    assert_eq!(first.aggregate_score, second.aggregate_score);
    assert_eq!(first.errors, second.errors);
    assert!(!out.join("stale.txt").exists());
    assert!(!out.join("overlaps").exists());
    let names: Vec<_> = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec![REPORT_FILE_NAME.to_string()]);
}

#[tokio::test]
async fn worker_count_bounds_concurrency() {
    let pages: Vec<String> = (0..8).map(|i| format!("p{i}")).collect();
    let page_refs: Vec<&str> = pages.iter().map(String::as_str).collect();
    let root = dataset(&page_refs);
    let scores: Vec<(&str, Option<f64>)> = page_refs.iter().map(|p| (*p, Some(0.5))).collect();
    let scorer = Arc::new(FakeScorer::new(&scores).with_delay(Duration::from_millis(20)));

    let summary = evaluate(&config_for(root.path(), 3), scorer.clone())
        .await
        .unwrap();

    assert_eq!(summary.successes, 8);
    let max = scorer.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 3, "at most 3 concurrent scorer calls, saw {max}");
    assert!(max >= 2, "expected parallel dispatch, saw {max}");
}

#[tokio::test]
async fn missing_input_root_is_fatal() {
    let root = dataset(&["p1"]);
    let mut config = config_for(root.path(), 1);
    config.gt_pixel_dirs = vec![root.path().join("nope")];

    let err = evaluate(&config, Arc::new(FakeScorer::new(&[])))
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::Discovery { .. }));
    assert!(!root.path().join("out").exists());
}

#[tokio::test]
async fn positional_mismatch_truncates_and_reports_dropped() {
    let root = dataset(&["p1", "p2"]);
    touch(&root.path().join("predictions/p3.xml"));
    let scorer = Arc::new(FakeScorer::new(&[("p1", Some(1.0)), ("p2", Some(0.0))]));

    let summary = evaluate(&config_for(root.path(), 2), scorer).await.unwrap();

    assert_eq!(summary.total_items, 2);
    assert_eq!(summary.dropped_items, 1);
    assert!((summary.aggregate_score - 0.5).abs() < 1e-12);

    let report = read_report_json(&summary.report_path).unwrap();
    assert_eq!(report.dropped_items, 1);
}

#[tokio::test]
async fn by_stem_pairing_rejects_unmatched_and_keeps_old_report() {
    let root = dataset(&["p1", "p2"]);
    let scorer = Arc::new(FakeScorer::new(&[("p1", Some(0.5)), ("p2", Some(0.5))]));
    let mut config = config_for(root.path(), 2);
    config.pairing = PairingMode::ByStem;

    evaluate(&config, scorer.clone()).await.unwrap();
    assert!(report_path(root.path()).exists());

    touch(&root.path().join("predictions/p9.xml"));
    let err = evaluate(&config, scorer).await.unwrap_err();
    assert!(matches!(err, EvalError::Pairing(_)));
    assert!(err.to_string().contains("p9"));
    assert!(report_path(root.path()).exists());
}

#[tokio::test]
async fn multiple_roots_are_concatenated_in_order() {
    let root = tempfile::tempdir().unwrap();
    for (set, page) in [("CB55", "a"), ("CSG18", "b")] {
        touch(&root.path().join(format!("{set}/predictions/{page}.xml")));
        touch(&root.path().join(format!("{set}/xml_gt/{page}_gt.XML")));
        touch(&root.path().join(format!("{set}/pixel_gt/{page}.png")));
    }
    let config = EvalConfig {
        prediction_dirs: vec![
            root.path().join("CSG18/predictions"),
            root.path().join("CB55/predictions"),
        ],
        gt_xml_dirs: vec![root.path().join("CSG18/xml_gt"), root.path().join("CB55/xml_gt")],
        gt_pixel_dirs: vec![
            root.path().join("CSG18/pixel_gt"),
            root.path().join("CB55/pixel_gt"),
        ],
        output_path: root.path().join("out"),
        workers: 1,
        ..Default::default()
    };
    let scorer = Arc::new(FakeScorer::new(&[("b", None), ("a", Some(0.3))]));

    let summary = evaluate(&config, scorer).await.unwrap();

    assert_eq!(summary.total_items, 2);
    assert_eq!(summary.errors, 1);
    // CSG18 was listed first, so its page is item 0.
    assert_eq!(summary.failures[0].index, 0);
    assert!(summary.failures[0].triple.gt_xml.ends_with("CSG18/xml_gt/b_gt.XML"));
}
