//! End-to-end evaluation run
//!
//! Prompts are sent one at a time in suite order. A failing prompt becomes a zero-score
//! result with error detail and the run carries on; only a server that never becomes
//! healthy aborts the run.

use chrono::Utc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{info, warn};

use crate::client::{AgentClient, AgentResponse};
use crate::config::{Config, ServerConfig};
use crate::error::EvalError;
use crate::extract::{call_names, extract_tool_calls, ParsedToolCall};
use crate::report::{EvalReport, EvalResult, RunMetadata};
use crate::scoring::{score_prompt, ScoreWeights};
use crate::server::ServerGuard;
use crate::suite::{EvalPrompt, EvalSuite};
use crate::util::format_percent;

/// Identity and limits of one run. Passed in explicitly; nothing is read from globals.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub model: String,
    pub variant: Option<String>,
    pub endpoint: String,
    /// `Some` to start and stop the server around the run, `None` to use a live endpoint
    pub server: Option<ServerConfig>,
    pub boot_timeout: Duration,
    pub request_timeout: Duration,
    pub stop_timeout: Duration,
    pub weights: ScoreWeights,
    pub pass_threshold: f64,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        let eval = &config.evaluation;
        Self {
            model: config.server.model.clone(),
            variant: config.server.adapter.clone(),
            endpoint: config.endpoint(),
            server: eval.manage_server.then(|| config.server.clone()),
            boot_timeout: eval.boot_timeout(),
            request_timeout: eval.request_timeout(),
            stop_timeout: eval.stop_timeout(),
            weights: eval.weights,
            pass_threshold: eval.pass_threshold,
        }
    }
}

pub struct Evaluator {
    settings: RunSettings,
}

impl Evaluator {
    pub fn new(settings: RunSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub async fn run(
        &self,
        suite: &EvalSuite,
        client: &dyn AgentClient,
    ) -> Result<EvalReport, EvalError> {
        self.settings.weights.validate().map_err(EvalError::Config)?;
        if !(0.0..=1.0).contains(&self.settings.pass_threshold) {
            return Err(EvalError::Config(format!(
                "pass_threshold must be within [0, 1], got {}",
                self.settings.pass_threshold
            )));
        }

        let started_at = Utc::now();
        info!(
            "Evaluating {} prompts from suite '{}' against {}",
            suite.len(),
            suite.name(),
            self.settings.endpoint
        );

        // Dropping the guard on any early exit kills the server.
        let mut guard = match &self.settings.server {
            Some(server_config) => Some(
                ServerGuard::acquire(
                    server_config.clone(),
                    self.settings.boot_timeout,
                    self.settings.stop_timeout,
                )
                .await?,
            ),
            None => None,
        };

        let mut results = Vec::with_capacity(suite.len());
        for (index, prompt) in suite.prompts().iter().enumerate() {
            info!("[{}/{}] {}", index + 1, suite.len(), prompt.id);

            let started = Instant::now();
            let outcome = timeout(self.settings.request_timeout, client.send(&prompt.prompt)).await;
            let elapsed = started.elapsed();

            let result = match outcome {
                Ok(Ok(response)) => self.score_response(prompt, response, elapsed),
                Ok(Err(e)) => {
                    let mut detail = format!("{:#}", e);
                    if let Some(guard) = guard.as_mut() {
                        if !guard.server_mut().check_alive() {
                            detail.push_str(" (server exited unexpectedly)");
                        }
                    }
                    warn!("Prompt {} failed: {}", prompt.id, detail);
                    EvalResult::failed(&prompt.id, &prompt.category, elapsed, detail)
                }
                Err(_) => {
                    let detail =
                        format!("request timed out after {:?}", self.settings.request_timeout);
                    warn!("Prompt {} failed: {}", prompt.id, detail);
                    EvalResult::failed(&prompt.id, &prompt.category, elapsed, detail)
                }
            };

            info!(
                "  {} score {} ({} calls)",
                if result.passed() { "PASS" } else { "FAIL" },
                format_percent(result.score()),
                result.calls().len()
            );
            results.push(result);
        }

        if let Some(guard) = guard {
            guard.release().await;
        }

        let metadata = RunMetadata {
            model: self.settings.model.clone(),
            variant: self.settings.variant.clone(),
            suite_name: suite.name().to_string(),
            suite_version: suite.version().map(str::to_string),
            endpoint: self.settings.endpoint.clone(),
            managed_server: self.settings.server.is_some(),
            started_at,
            finished_at: Utc::now(),
            weights: self.settings.weights,
            pass_threshold: self.settings.pass_threshold,
        };
        let report = EvalReport::new(metadata, results);
        info!(
            "Evaluated {} prompts, overall score {}",
            report.results().len(),
            format_percent(report.overall_score())
        );
        Ok(report)
    }

    fn score_response(
        &self,
        prompt: &EvalPrompt,
        response: AgentResponse,
        elapsed: Duration,
    ) -> EvalResult {
        let calls = collect_calls(&response);
        let breakdown = score_prompt(
            prompt.expected_tools.as_slice(),
            call_names(&calls).as_slice(),
            prompt.expected_keywords.as_slice(),
            &response.text,
            &self.settings.weights,
        );
        EvalResult::scored(
            &prompt.id,
            &prompt.category,
            response.text,
            calls,
            elapsed,
            breakdown,
            self.settings.pass_threshold,
        )
    }
}

/// Structured call parts win; the text extractor is only consulted when they yield
/// nothing.
pub fn collect_calls(response: &AgentResponse) -> Vec<ParsedToolCall> {
    if let Some(structured) = response.structured_calls() {
        let calls: Vec<ParsedToolCall> = structured
            .iter()
            .cloned()
            .filter_map(|call| call.into_parsed())
            .collect();
        if !calls.is_empty() {
            return calls;
        }
    }

    let (_, calls) = extract_tool_calls(&response.text);
    calls
}
