use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::fs;
use tracing::debug;

use super::openai::OpenAiCompatClient;
use super::{AgentClient, MockAgentClient};
use crate::config::Config;

/// Create the agent client for a run. `dry_run` returns a mock that never touches the
/// network.
pub fn create_client(config: &Config, dry_run: bool) -> Result<Box<dyn AgentClient>> {
    if dry_run {
        return Ok(Box::new(MockAgentClient::new()));
    }

    let tools = match &config.client.tools_file {
        Some(path) => load_tools(path)?,
        None => Vec::new(),
    };

    let endpoint = config.endpoint();
    debug!("Creating chat client for {} ({} tools)", endpoint, tools.len());

    let client = OpenAiCompatClient::new(
        config.client.api_key(),
        config.request_model(),
        endpoint,
        config.evaluation.request_timeout_secs,
    )?
    .with_sampling(config.client.temperature, config.client.max_tokens)
    .with_system_prompt(config.client.system_prompt.clone())
    .with_tools(tools);

    Ok(Box::new(client))
}

/// Read a JSON array of tool definitions.
fn load_tools(path: &str) -> Result<Vec<Value>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read tools file {}", path))?;
    match serde_json::from_str::<Value>(&content)
        .with_context(|| format!("Failed to parse tools file {}", path))?
    {
        Value::Array(tools) => Ok(tools),
        _ => bail!("Tools file {} must contain a JSON array", path),
    }
}
