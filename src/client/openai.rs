use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::{AgentClient, AgentResponse, StructuredCall};
use crate::util::SecretString;

// ============================================================================
// OpenAI-compatible chat client (mlx_lm.server, vLLM, llama.cpp, hosted APIs)
// ============================================================================

pub struct OpenAiCompatClient {
    api_key: SecretString,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
    system_prompt: Option<String>,
    tools: Vec<Value>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: Option<String>,
}

impl OpenAiCompatClient {
    pub fn new(
        api_key: SecretString,
        model: String,
        base_url: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature: 0.0,
            max_tokens: 1024,
            system_prompt: None,
            tools: Vec::new(),
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .context("failed to build HTTP client")?,
        })
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    /// OpenAI-style tool definitions advertised with every request
    pub fn with_tools(mut self, tools: Vec<Value>) -> Self {
        self.tools = tools;
        self
    }

    fn build_request(&self, prompt: &str) -> ChatRequest {
        let mut messages = Vec::new();
        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tools.clone(),
        }
    }
}

/// Decode the `arguments` string of a structured call. Unparseable arguments keep the
/// call (the name is what scoring needs) with the raw text under `_raw`.
fn decode_arguments(raw: Option<&str>) -> Map<String, Value> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Map::new();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => {
            warn!("Structured tool call has non-object arguments");
            let mut map = Map::new();
            map.insert("_raw".to_string(), Value::String(raw.to_string()));
            map
        }
    }
}

#[async_trait]
impl AgentClient for OpenAiCompatClient {
    async fn send(&self, prompt: &str) -> Result<AgentResponse> {
        let request = self.build_request(prompt);
        let url = format!("{}/chat/completions", self.base_url);

        debug!("Calling {} with model: {}", url, self.model);

        let mut req = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&request);

        // Only add authorization if API key is not empty
        if !self.api_key.is_empty() {
            req = req.header("authorization", format!("Bearer {}", self.api_key.expose()));
        }

        let response = req
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("Chat API error {}: {}", status, error_text);
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let message = api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .context("No choices in chat completion response")?;

        let tool_calls = message.tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|call| StructuredCall {
                    arguments: decode_arguments(call.function.arguments.as_deref()),
                    name: call.function.name,
                })
                .collect()
        });

        Ok(AgentResponse {
            text: message.content.unwrap_or_default(),
            tool_calls,
        })
    }
}
