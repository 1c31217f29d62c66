//! Regression comparison across reports
//!
//! The first report is the baseline; every delta is `report - baseline`. Prompt ids that
//! exist in only some reports are listed as missing rather than treated as an error.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::warn;

use crate::error::CompareError;
use crate::report::EvalReport;
use crate::util::format_percent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptComparison {
    pub prompt_id: String,
    pub category: String,
    /// One entry per report; `None` where the prompt is missing
    pub scores: Vec<Option<f64>>,
    /// Delta of each report against the baseline; `None` if either side is missing
    pub deltas: Vec<Option<f64>>,
    /// Labels of the reports that lack this prompt
    pub missing_in: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryComparison {
    pub category: String,
    pub scores: Vec<Option<f64>>,
    pub deltas: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Report labels in input order; the first is the baseline
    pub labels: Vec<String>,
    pub suite_names: Vec<String>,
    /// True when the reports do not all come from the same suite
    pub suite_mismatch: bool,
    pub overall: Vec<f64>,
    pub overall_deltas: Vec<f64>,
    pub prompts: Vec<PromptComparison>,
    pub categories: Vec<CategoryComparison>,
}

/// Compare two or more reports. Prompts appear in baseline order, followed by prompts
/// that only later reports contain, in order of first appearance.
pub fn compare_reports(reports: &[EvalReport]) -> Result<ComparisonReport, CompareError> {
    if reports.len() < 2 {
        return Err(CompareError::NotEnoughReports { got: reports.len() });
    }

    let labels = unique_labels(reports);
    let suite_names: Vec<String> = reports
        .iter()
        .map(|r| r.metadata().suite_name.clone())
        .collect();
    let suite_mismatch = suite_names.iter().collect::<HashSet<_>>().len() > 1;
    if suite_mismatch {
        warn!("Comparing reports from different suites: {:?}", suite_names);
    }

    // Union of prompt ids in first-appearance order, with the first category seen.
    let mut order: Vec<(String, String)> = Vec::new();
    let mut seen = HashSet::new();
    for report in reports {
        for result in report.results() {
            if seen.insert(result.prompt_id().to_string()) {
                order.push((result.prompt_id().to_string(), result.category().to_string()));
            }
        }
    }

    let prompts = order
        .into_iter()
        .map(|(prompt_id, category)| {
            let scores: Vec<Option<f64>> = reports
                .iter()
                .map(|r| r.get(&prompt_id).map(|res| res.score()))
                .collect();
            let missing_in = labels
                .iter()
                .zip(&scores)
                .filter(|(_, score)| score.is_none())
                .map(|(label, _)| label.clone())
                .collect();
            PromptComparison {
                deltas: deltas_against_first(&scores),
                prompt_id,
                category,
                scores,
                missing_in,
            }
        })
        .collect();

    let per_report: Vec<BTreeMap<String, f64>> =
        reports.iter().map(|r| r.category_scores()).collect();
    let all_categories: BTreeSet<&String> = per_report.iter().flat_map(|m| m.keys()).collect();
    let categories = all_categories
        .into_iter()
        .map(|category| {
            let scores: Vec<Option<f64>> =
                per_report.iter().map(|m| m.get(category).copied()).collect();
            CategoryComparison {
                category: category.clone(),
                deltas: deltas_against_first(&scores),
                scores,
            }
        })
        .collect();

    let overall: Vec<f64> = reports.iter().map(|r| r.overall_score()).collect();
    let overall_deltas = overall.iter().map(|score| score - overall[0]).collect();

    Ok(ComparisonReport {
        labels,
        suite_names,
        suite_mismatch,
        overall,
        overall_deltas,
        prompts,
        categories,
    })
}

fn deltas_against_first(scores: &[Option<f64>]) -> Vec<Option<f64>> {
    let baseline = scores.first().copied().flatten();
    scores
        .iter()
        .map(|score| match (baseline, score) {
            (Some(base), Some(score)) => Some(score - base),
            _ => None,
        })
        .collect()
}

/// Report labels, suffixed with their position when two reports share a label.
fn unique_labels(reports: &[EvalReport]) -> Vec<String> {
    let raw: Vec<&str> = reports.iter().map(|r| r.metadata().label()).collect();
    raw.iter()
        .enumerate()
        .map(|(i, label)| {
            if raw.iter().filter(|other| *other == label).count() > 1 {
                format!("{}#{}", label, i + 1)
            } else {
                label.to_string()
            }
        })
        .collect()
}

impl ComparisonReport {
    /// Prompts whose score in the last report dropped by more than `threshold` against
    /// the baseline.
    pub fn regressions(&self, threshold: f64) -> Vec<&PromptComparison> {
        self.prompts
            .iter()
            .filter(|p| matches!(p.deltas.last(), Some(Some(delta)) if *delta < -threshold))
            .collect()
    }

    /// Prompts whose score in the last report rose by more than `threshold`.
    pub fn improvements(&self, threshold: f64) -> Vec<&PromptComparison> {
        self.prompts
            .iter()
            .filter(|p| matches!(p.deltas.last(), Some(Some(delta)) if *delta > threshold))
            .collect()
    }

    pub fn format_summary(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("Comparing: {}\n", self.labels.join(" -> ")));
        if self.suite_mismatch {
            output.push_str(&format!(
                "WARNING: reports come from different suites: {}\n",
                self.suite_names.join(", ")
            ));
        }

        output.push_str("\nOverall:\n");
        for ((label, score), delta) in self.labels.iter().zip(&self.overall).zip(&self.overall_deltas) {
            output.push_str(&format!(
                "  {:<24} {:>7} ({:+.1})\n",
                label,
                format_percent(*score),
                delta * 100.0
            ));
        }

        output.push_str("\nBy category:\n");
        for category in &self.categories {
            let cells: Vec<String> = category
                .scores
                .iter()
                .map(|s| s.map(format_percent).unwrap_or_else(|| "-".to_string()))
                .collect();
            output.push_str(&format!("  {:<16} {}\n", category.category, cells.join("  ")));
        }

        let regressions = self.regressions(0.0);
        if !regressions.is_empty() {
            output.push_str("\nRegressions:\n");
            for prompt in regressions {
                if let Some(Some(delta)) = prompt.deltas.last() {
                    output.push_str(&format!("  - {} ({:+.1})\n", prompt.prompt_id, delta * 100.0));
                }
            }
        }

        let missing: Vec<&PromptComparison> =
            self.prompts.iter().filter(|p| !p.missing_in.is_empty()).collect();
        if !missing.is_empty() {
            output.push_str("\nMissing prompts:\n");
            for prompt in missing {
                output.push_str(&format!(
                    "  - {} missing in {}\n",
                    prompt.prompt_id,
                    prompt.missing_in.join(", ")
                ));
            }
        }

        output
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deltas_against_first() {
        let deltas = deltas_against_first(&[Some(0.5), Some(0.75), None]);
        assert_eq!(deltas, vec![Some(0.0), Some(0.25), None]);

        let deltas = deltas_against_first(&[None, Some(1.0)]);
        assert_eq!(deltas, vec![None, None]);
    }

    #[test]
    fn test_not_enough_reports() {
        assert_eq!(
            compare_reports(&[]),
            Err(CompareError::NotEnoughReports { got: 0 })
        );
    }
}
