//! Contract for the injected model/agent client
//!
//! The evaluator only needs the raw text of a response and, when the transport exposes
//! them, already-structured tool-call parts. Transport and model selection live behind
//! [`AgentClient`].

pub mod factory;
pub mod openai;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::extract::{CallOrigin, ParsedToolCall};

/// A tool call the client already received in structured form.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl StructuredCall {
    pub fn new(name: &str, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.to_string(),
            arguments,
        }
    }

    /// Normalize into a parsed call; `None` when the name is blank.
    pub fn into_parsed(self) -> Option<ParsedToolCall> {
        ParsedToolCall::new(self.name, self.arguments, CallOrigin::Structured)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentResponse {
    pub text: String,
    /// `None` when the transport has no notion of structured calls
    pub tool_calls: Option<Vec<StructuredCall>>,
}

impl AgentResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: None,
        }
    }

    pub fn with_tool_calls(mut self, calls: Vec<StructuredCall>) -> Self {
        self.tool_calls = Some(calls);
        self
    }

    /// Structured call parts, if this response exposes any.
    pub fn structured_calls(&self) -> Option<&[StructuredCall]> {
        self.tool_calls.as_deref().filter(|calls| !calls.is_empty())
    }
}

#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn send(&self, prompt: &str) -> Result<AgentResponse>;
}

/// Replays scripted responses in order, then falls back to a fixed prose answer.
/// Used for dry runs and tests.
pub struct MockAgentClient {
    script: Mutex<VecDeque<Result<AgentResponse, String>>>,
}

impl Default for MockAgentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAgentClient {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
        }
    }

    pub fn respond(self, response: AgentResponse) -> Self {
        self.push(Ok(response))
    }

    pub fn fail(self, error: &str) -> Self {
        self.push(Err(error.to_string()))
    }

    fn push(self, entry: Result<AgentResponse, String>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(entry);
        }
        self
    }
}

#[async_trait]
impl AgentClient for MockAgentClient {
    async fn send(&self, _prompt: &str) -> Result<AgentResponse> {
        let next = match self.script.lock() {
            Ok(mut script) => script.pop_front(),
            Err(_) => bail!("mock client script lock poisoned"),
        };
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(error)) => bail!("{}", error),
            None => Ok(AgentResponse::text("mock response")),
        }
    }
}
