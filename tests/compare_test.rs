//! Comparator behavior over saved reports

use chrono::Utc;
use std::time::Duration;

use tooleval::compare::compare_reports;
use tooleval::error::CompareError;
use tooleval::report::{EvalReport, EvalResult, RunMetadata};
use tooleval::scoring::{PromptScore, ScoreWeights};

fn metadata(variant: &str, suite: &str) -> RunMetadata {
    let now = Utc::now();
    RunMetadata {
        model: "base-7b".to_string(),
        variant: Some(variant.to_string()),
        suite_name: suite.to_string(),
        suite_version: Some("1".to_string()),
        endpoint: "http://127.0.0.1:8080/v1".to_string(),
        managed_server: true,
        started_at: now,
        finished_at: now,
        weights: ScoreWeights::default(),
        pass_threshold: 0.5,
    }
}

fn result(id: &str, category: &str, score: f64) -> EvalResult {
    EvalResult::scored(
        id,
        category,
        String::new(),
        vec![],
        Duration::from_millis(5),
        PromptScore {
            tool_calling: score,
            keywords: 1.0,
            combined: score,
        },
        0.5,
    )
}

fn report(variant: &str, results: Vec<EvalResult>) -> EvalReport {
    EvalReport::new(metadata(variant, "builtin-tools"), results)
}

#[test]
fn test_per_prompt_and_category_deltas() {
    let baseline = report(
        "ckpt-100",
        vec![
            result("read", "file_ops", 1.0),
            result("edit", "file_ops", 0.5),
            result("run", "shell", 1.0),
        ],
    );
    let candidate = report(
        "ckpt-200",
        vec![
            result("read", "file_ops", 1.0),
            result("edit", "file_ops", 1.0),
            result("run", "shell", 0.0),
        ],
    );

    let comparison = compare_reports(&[baseline, candidate]).unwrap();
    assert_eq!(comparison.labels, vec!["ckpt-100", "ckpt-200"]);
    assert!(!comparison.suite_mismatch);

    let edit = comparison
        .prompts
        .iter()
        .find(|p| p.prompt_id == "edit")
        .unwrap();
    assert_eq!(edit.deltas, vec![Some(0.0), Some(0.5)]);

    let shell = comparison
        .categories
        .iter()
        .find(|c| c.category == "shell")
        .unwrap();
    assert_eq!(shell.deltas, vec![Some(0.0), Some(-1.0)]);

    let regressions: Vec<&str> = comparison
        .regressions(0.1)
        .iter()
        .map(|p| p.prompt_id.as_str())
        .collect();
    assert_eq!(regressions, vec!["run"]);
    let improvements: Vec<&str> = comparison
        .improvements(0.1)
        .iter()
        .map(|p| p.prompt_id.as_str())
        .collect();
    assert_eq!(improvements, vec!["edit"]);
}

#[test]
fn test_missing_prompts_are_reported_not_fatal() {
    let baseline = report(
        "old",
        vec![result("read", "file_ops", 1.0), result("gone", "shell", 1.0)],
    );
    let candidate = report(
        "new",
        vec![result("read", "file_ops", 0.0), result("added", "search", 1.0)],
    );

    let comparison = compare_reports(&[baseline, candidate]).unwrap();
    let ids: Vec<&str> = comparison
        .prompts
        .iter()
        .map(|p| p.prompt_id.as_str())
        .collect();
    assert_eq!(ids, vec!["read", "gone", "added"]);

    let gone = &comparison.prompts[1];
    assert_eq!(gone.missing_in, vec!["new"]);
    assert_eq!(gone.deltas, vec![Some(0.0), None]);

    let added = &comparison.prompts[2];
    assert_eq!(added.missing_in, vec!["old"]);
    assert_eq!(added.scores, vec![None, Some(1.0)]);

    assert!(comparison.format_summary().contains("gone missing in new"));
}

#[test]
fn test_suite_mismatch_flagged() {
    let a = EvalReport::new(metadata("a", "suite-a"), vec![result("x", "c", 1.0)]);
    let b = EvalReport::new(metadata("b", "suite-b"), vec![result("x", "c", 1.0)]);
    let comparison = compare_reports(&[a, b]).unwrap();
    assert!(comparison.suite_mismatch);
    assert!(comparison.format_summary().contains("different suites"));
}

#[test]
fn test_duplicate_labels_are_disambiguated() {
    let a = report("same", vec![result("x", "c", 1.0)]);
    let b = report("same", vec![result("x", "c", 0.5)]);
    let comparison = compare_reports(&[a, b]).unwrap();
    assert_eq!(comparison.labels, vec!["same#1", "same#2"]);
    assert_eq!(comparison.overall_deltas, vec![0.0, -0.5]);
}

#[test]
fn test_single_report_rejected() {
    let a = report("only", vec![result("x", "c", 1.0)]);
    assert_eq!(
        compare_reports(&[a]).unwrap_err(),
        CompareError::NotEnoughReports { got: 1 }
    );
}

#[test]
fn test_compare_saved_reports() {
    let dir = tempfile::TempDir::new().unwrap();
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");
    report("v1", vec![result("x", "c", 0.25)]).save(&first).unwrap();
    report("v2", vec![result("x", "c", 0.75)]).save(&second).unwrap();

    let loaded = vec![
        EvalReport::load(&first).unwrap(),
        EvalReport::load(&second).unwrap(),
    ];
    let comparison = compare_reports(&loaded).unwrap();
    assert_eq!(comparison.prompts[0].deltas, vec![Some(0.0), Some(0.5)]);
}
