//! Per-prompt scoring
//!
//! All functions here are pure and deterministic. Scores are in `[0, 1]`.
//!
//! Rules:
//! - Expected tool names are treated as a set: listing a name twice does not make it
//!   count twice. The denominator is the number of distinct expected names.
//! - A prompt that expects no tool call scores 1.0 only if no call was made.
//! - A prompt with no expected keywords scores 1.0 on keywords, and the keyword score is
//!   left out of the combined score entirely.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Weights for combining sub-scores into one prompt score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_tool_weight")]
    pub tool_calling: f64,
    #[serde(default = "default_keyword_weight")]
    pub keywords: f64,
}

fn default_tool_weight() -> f64 {
    0.7
}

fn default_keyword_weight() -> f64 {
    0.3
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            tool_calling: default_tool_weight(),
            keywords: default_keyword_weight(),
        }
    }
}

impl ScoreWeights {
    pub fn validate(&self) -> Result<(), String> {
        if !self.tool_calling.is_finite() || !self.keywords.is_finite() {
            return Err("score weights must be finite numbers".to_string());
        }
        if self.tool_calling < 0.0 || self.keywords < 0.0 {
            return Err("score weights must be non-negative".to_string());
        }
        if self.tool_calling <= 0.0 {
            // Keyword weight alone cannot score prompts that declare no keywords.
            return Err("tool_calling weight must be positive".to_string());
        }
        Ok(())
    }
}

/// Fraction of distinct expected names that appear among the actual call names.
pub fn score_tool_calling<E, A>(expected_names: &[E], actual_names: &[A]) -> f64
where
    E: AsRef<str>,
    A: AsRef<str>,
{
    let expected: HashSet<&str> = expected_names.iter().map(|n| n.as_ref()).collect();
    let actual: HashSet<&str> = actual_names.iter().map(|n| n.as_ref()).collect();

    if expected.is_empty() {
        return if actual.is_empty() { 1.0 } else { 0.0 };
    }

    let hits = expected.iter().filter(|name| actual.contains(*name)).count();
    hits as f64 / expected.len() as f64
}

/// Fraction of expected keywords found in the response (case-insensitive substring).
pub fn score_keyword_presence<K: AsRef<str>>(expected_keywords: &[K], response_text: &str) -> f64 {
    if expected_keywords.is_empty() {
        return 1.0;
    }

    let haystack = response_text.to_lowercase();
    let hits = expected_keywords
        .iter()
        .filter(|kw| haystack.contains(&kw.as_ref().to_lowercase()))
        .count();
    hits as f64 / expected_keywords.len() as f64
}

/// Sub-scores and the combined score for one prompt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromptScore {
    pub tool_calling: f64,
    pub keywords: f64,
    pub combined: f64,
}

impl PromptScore {
    pub fn zero() -> Self {
        Self {
            tool_calling: 0.0,
            keywords: 0.0,
            combined: 0.0,
        }
    }
}

/// Combine sub-scores as a weighted mean.
///
/// `combined = (w_t * tool + w_k * kw) / (w_t + w_k)` when the prompt declares keywords,
/// otherwise `combined = tool`.
pub fn score_prompt<E, A, K>(
    expected_names: &[E],
    actual_names: &[A],
    expected_keywords: &[K],
    response_text: &str,
    weights: &ScoreWeights,
) -> PromptScore
where
    E: AsRef<str>,
    A: AsRef<str>,
    K: AsRef<str>,
{
    let tool_calling = score_tool_calling(expected_names, actual_names);
    let keywords = score_keyword_presence(expected_keywords, response_text);

    let combined = if expected_keywords.is_empty() {
        tool_calling
    } else {
        let total = weights.tool_calling + weights.keywords;
        if total <= 0.0 {
            tool_calling
        } else {
            (weights.tool_calling * tool_calling + weights.keywords * keywords) / total
        }
    };

    PromptScore {
        tool_calling,
        keywords,
        combined: combined.clamp(0.0, 1.0),
    }
}
