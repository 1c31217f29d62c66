//! Evaluation suites: ordered, named prompt collections with declared expectations

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::SuiteError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalPrompt {
    pub id: String,
    pub category: String,
    pub prompt: String,
    #[serde(default)]
    pub expected_tools: Vec<String>,
    #[serde(default)]
    pub expected_keywords: Vec<String>,
}

impl EvalPrompt {
    pub fn new(id: &str, category: &str, prompt: &str) -> Self {
        Self {
            id: id.to_string(),
            category: category.to_string(),
            prompt: prompt.to_string(),
            expected_tools: Vec::new(),
            expected_keywords: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.expected_tools = tools.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.expected_keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }
}

#[derive(Deserialize)]
struct SuiteFile {
    name: String,
    #[serde(default)]
    version: Option<String>,
    prompts: Vec<EvalPrompt>,
}

/// Immutable, ordered prompt collection. Prompt ids are unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalSuite {
    name: String,
    version: Option<String>,
    prompts: Vec<EvalPrompt>,
}

impl EvalSuite {
    pub fn new(
        name: impl Into<String>,
        version: Option<String>,
        prompts: Vec<EvalPrompt>,
    ) -> Result<Self, SuiteError> {
        let name = name.into();
        if prompts.is_empty() {
            return Err(SuiteError::EmptySuite(name));
        }

        let mut seen = HashSet::new();
        for prompt in &prompts {
            if !seen.insert(prompt.id.as_str()) {
                return Err(SuiteError::DuplicateId(prompt.id.clone()));
            }
        }

        Ok(Self {
            name,
            version,
            prompts,
        })
    }

    /// Load a suite from a JSON file: `{"name": ..., "version": ..., "prompts": [...]}`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SuiteError> {
        let content = fs::read_to_string(path.as_ref())?;
        let file: SuiteFile = serde_json::from_str(&content)?;
        debug!(
            "Loaded suite '{}' with {} prompts from {}",
            file.name,
            file.prompts.len(),
            path.as_ref().display()
        );
        Self::new(file.name, file.version, file.prompts)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn prompts(&self) -> &[EvalPrompt] {
        &self.prompts
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&EvalPrompt> {
        self.prompts.iter().find(|p| p.id == id)
    }

    /// Distinct categories in first-appearance order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.prompts
            .iter()
            .map(|p| p.category.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// Sub-suite with only the prompts of one category, order preserved.
    /// The sub-suite keeps the parent's name so reports stay comparable.
    pub fn filter_category(&self, category: &str) -> Result<Self, SuiteError> {
        let prompts: Vec<EvalPrompt> = self
            .prompts
            .iter()
            .filter(|p| p.category == category)
            .cloned()
            .collect();
        if prompts.is_empty() {
            return Err(SuiteError::NoMatchingPrompts {
                suite: self.name.clone(),
                category: category.to_string(),
            });
        }
        Ok(Self {
            name: self.name.clone(),
            version: self.version.clone(),
            prompts,
        })
    }

    /// Default yardstick covering the coding-agent tool set.
    pub fn builtin() -> Self {
        let prompts = vec![
            EvalPrompt::new(
                "read-config",
                "file_ops",
                "Show me what is in config/settings.py.",
            )
            .with_tools(&["read_file"]),
            EvalPrompt::new(
                "write-readme",
                "file_ops",
                "Create a README.md that says 'Hello from the agent'.",
            )
            .with_tools(&["write_file"]),
            EvalPrompt::new(
                "edit-port",
                "file_ops",
                "Change the default port in server.py from 8000 to 9000.",
            )
            .with_tools(&["read_file", "edit_file"]),
            EvalPrompt::new(
                "run-tests",
                "shell",
                "Run the test suite with pytest and tell me what fails.",
            )
            .with_tools(&["run_command"])
            .with_keywords(&["pytest"]),
            EvalPrompt::new("git-status", "shell", "What files have I changed since the last commit?")
                .with_tools(&["run_command"])
                .with_keywords(&["git"]),
            EvalPrompt::new(
                "find-todos",
                "search",
                "Find every TODO comment in the src directory.",
            )
            .with_tools(&["search_files"])
            .with_keywords(&["TODO"]),
            EvalPrompt::new("list-project", "search", "What files are in this project?")
                .with_tools(&["list_directory"]),
            EvalPrompt::new(
                "explain-borrow",
                "no_tool",
                "Explain in one paragraph what the borrow checker does in Rust.",
            )
            .with_keywords(&["ownership", "reference"]),
        ];

        // The built-in prompt ids are distinct by construction.
        Self {
            name: "builtin-tools".to_string(),
            version: Some("1".to_string()),
            prompts,
        }
    }
}
