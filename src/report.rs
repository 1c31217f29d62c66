//! Evaluation results and reports
//!
//! A report is assembled once at the end of a run and never mutated. Aggregates are
//! derived from the results on every call, so they cannot drift from the data.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

use crate::extract::ParsedToolCall;
use crate::scoring::{PromptScore, ScoreWeights};
use crate::util::format_percent;

/// Outcome for one prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalResult {
    prompt_id: String,
    category: String,
    response_text: String,
    calls: Vec<ParsedToolCall>,
    elapsed_ms: u64,
    score: f64,
    breakdown: Option<PromptScore>,
    passed: bool,
    error: Option<String>,
}

impl EvalResult {
    /// A prompt that got a response and was scored.
    pub fn scored(
        prompt_id: &str,
        category: &str,
        response_text: String,
        calls: Vec<ParsedToolCall>,
        elapsed: Duration,
        breakdown: PromptScore,
        pass_threshold: f64,
    ) -> Self {
        Self {
            prompt_id: prompt_id.to_string(),
            category: category.to_string(),
            response_text,
            calls,
            elapsed_ms: elapsed.as_millis() as u64,
            score: breakdown.combined,
            breakdown: Some(breakdown),
            passed: breakdown.combined >= pass_threshold,
            error: None,
        }
    }

    /// A prompt whose request failed. Scores zero and never passes.
    pub fn failed(prompt_id: &str, category: &str, elapsed: Duration, error: String) -> Self {
        Self {
            prompt_id: prompt_id.to_string(),
            category: category.to_string(),
            response_text: String::new(),
            calls: Vec::new(),
            elapsed_ms: elapsed.as_millis() as u64,
            score: 0.0,
            breakdown: None,
            passed: false,
            error: Some(error),
        }
    }

    pub fn prompt_id(&self) -> &str {
        &self.prompt_id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn response_text(&self) -> &str {
        &self.response_text
    }

    pub fn calls(&self) -> &[ParsedToolCall] {
        &self.calls
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn breakdown(&self) -> Option<&PromptScore> {
        self.breakdown.as_ref()
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Everything needed to reconstruct which run produced a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub model: String,
    /// Adapter or checkpoint identifier, if any
    pub variant: Option<String>,
    pub suite_name: String,
    pub suite_version: Option<String>,
    pub endpoint: String,
    pub managed_server: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub weights: ScoreWeights,
    pub pass_threshold: f64,
}

impl RunMetadata {
    /// Short name for tables: the variant if set, else the model.
    pub fn label(&self) -> &str {
        self.variant.as_deref().unwrap_or(&self.model)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    metadata: RunMetadata,
    results: Vec<EvalResult>,
}

impl EvalReport {
    pub fn new(metadata: RunMetadata, results: Vec<EvalResult>) -> Self {
        Self { metadata, results }
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    /// Results in suite order.
    pub fn results(&self) -> &[EvalResult] {
        &self.results
    }

    pub fn get(&self, prompt_id: &str) -> Option<&EvalResult> {
        self.results.iter().find(|r| r.prompt_id == prompt_id)
    }

    /// Mean score over all results (0.0 for an empty report).
    pub fn overall_score(&self) -> f64 {
        mean(self.results.iter().map(|r| r.score))
    }

    /// Mean score per category.
    pub fn category_scores(&self) -> BTreeMap<String, f64> {
        let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for result in &self.results {
            let entry = sums.entry(result.category.clone()).or_insert((0.0, 0));
            entry.0 += result.score;
            entry.1 += 1;
        }
        sums.into_iter()
            .map(|(category, (sum, count))| (category, sum / count as f64))
            .collect()
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    pub fn error_count(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_some()).count()
    }

    pub fn failures(&self) -> Vec<&EvalResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }

    pub fn format_summary(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "Evaluation Report: {} on suite '{}'\n",
            self.metadata.label(),
            self.metadata.suite_name
        ));
        output.push_str(&format!(
            "Evaluated {} prompts, overall score {}\n",
            self.results.len(),
            format_percent(self.overall_score())
        ));
        output.push_str(&format!(
            "  Passed: {}  Failed: {}  Errors: {}\n",
            self.passed_count(),
            self.results.len() - self.passed_count(),
            self.error_count()
        ));

        let categories = self.category_scores();
        if !categories.is_empty() {
            output.push_str("\nBy category:\n");
            for (category, score) in &categories {
                output.push_str(&format!("  {:<16} {}\n", category, format_percent(*score)));
            }
        }

        let failures = self.failures();
        if !failures.is_empty() {
            output.push_str("\nFailed prompts:\n");
            for result in failures {
                match &result.error {
                    Some(error) => {
                        output.push_str(&format!("  - {} (error: {})\n", result.prompt_id, error))
                    }
                    None => output.push_str(&format!(
                        "  - {} ({})\n",
                        result.prompt_id,
                        format_percent(result.score)
                    )),
                }
            }
        }

        output
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report as pretty JSON. The file appears complete or not at all.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

        let json = self.to_json().context("Failed to serialize report")?;
        let mut tmp = NamedTempFile::new_in(dir).context("Failed to create temp report file")?;
        tmp.write_all(json.as_bytes())
            .context("Failed to write report")?;
        tmp.persist(path)
            .with_context(|| format!("Failed to persist report to {}", path.display()))?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read report {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse report {}", path.display()))
    }
}

pub(crate) fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
