use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::scoring::ScoreWeights;
use crate::util::SecretString;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

/// How to launch the model-serving process. Created once per run, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Executable to launch (default: "mlx_lm.server")
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before the generated flags, e.g. `["-m", "vllm.entrypoints.openai.api_server"]`
    #[serde(default)]
    pub program_args: Vec<String>,

    /// Base model path or hub identifier
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Fine-tuned adapter (variant) to load on top of the base model
    #[serde(default)]
    pub adapter: Option<String>,

    /// Optional resource limits, only passed when set
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub max_concurrency: Option<u32>,
    #[serde(default)]
    pub memory_fraction: Option<f32>,

    /// Appended verbatim after the generated flags
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Readiness path probed by the health check
    #[serde(default = "default_models_path")]
    pub models_path: String,
}

impl ServerConfig {
    /// Base URL of the OpenAI-compatible API this server exposes
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/v1", self.host, self.port)
    }

    /// Full URL of the readiness endpoint
    pub fn readiness_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.models_path)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            program_args: Vec::new(),
            model: default_model(),
            host: default_host(),
            port: default_port(),
            adapter: None,
            max_tokens: None,
            max_concurrency: None,
            memory_fraction: None,
            extra_args: Vec::new(),
            models_path: default_models_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Model name sent in each request (default: server.model)
    #[serde(default)]
    pub model: Option<String>,

    /// Environment variable holding the API key; "none" or unset means no key
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Endpoint for unmanaged runs (default: derived from [server])
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_client_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub system_prompt: Option<String>,

    /// JSON file with an array of OpenAI-style tool definitions sent with every request
    #[serde(default)]
    pub tools_file: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            model: None,
            api_key_env: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_client_max_tokens(),
            system_prompt: None,
            tools_file: None,
        }
    }
}

impl ClientConfig {
    /// Resolve the API key from the configured environment variable.
    /// Local servers usually need none, so a missing variable yields an empty key.
    pub fn api_key(&self) -> SecretString {
        match &self.api_key_env {
            Some(env_var) if env_var.to_lowercase() != "none" => {
                env::var(env_var).unwrap_or_default().into()
            }
            _ => SecretString::default(),
        }
    }
}

/// Upper bound for any configured wait (one day).
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Start and stop the server for the run; false targets an already-running endpoint
    #[serde(default = "default_true")]
    pub manage_server: bool,

    #[serde(default = "default_boot_timeout")]
    pub boot_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,

    /// Minimum prompt score counted as a pass
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,

    #[serde(default)]
    pub weights: ScoreWeights,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            manage_server: true,
            boot_timeout_secs: default_boot_timeout(),
            request_timeout_secs: default_request_timeout(),
            stop_timeout_secs: default_stop_timeout(),
            pass_threshold: default_pass_threshold(),
            weights: ScoreWeights::default(),
        }
    }
}

impl EvaluationConfig {
    pub fn boot_timeout(&self) -> Duration {
        Duration::from_secs(self.boot_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// Reject values that would make scores meaningless or waits unbounded.
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.weights.validate()?;
        if !(0.0..=1.0).contains(&self.pass_threshold) {
            return Err(format!(
                "pass_threshold must be within [0, 1], got {}",
                self.pass_threshold
            ));
        }
        if self.boot_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err("boot and request timeouts must be non-zero".to_string());
        }
        for (name, secs) in [
            ("boot_timeout_secs", self.boot_timeout_secs),
            ("request_timeout_secs", self.request_timeout_secs),
            ("stop_timeout_secs", self.stop_timeout_secs),
        ] {
            if secs > MAX_TIMEOUT_SECS {
                return Err(format!(
                    "{} must be at most {} seconds, got {}",
                    name, MAX_TIMEOUT_SECS, secs
                ));
            }
        }
        Ok(())
    }
}

fn default_program() -> String {
    "mlx_lm.server".to_string()
}

fn default_model() -> String {
    "Qwen/Qwen2.5-Coder-7B-Instruct".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_models_path() -> String {
    "/v1/models".to_string()
}

fn default_temperature() -> f32 {
    0.0
}

fn default_client_max_tokens() -> u32 {
    1024
}

fn default_true() -> bool {
    true
}

fn default_boot_timeout() -> u64 {
    120
}

fn default_request_timeout() -> u64 {
    90
}

fn default_stop_timeout() -> u64 {
    10
}

fn default_pass_threshold() -> f64 {
    0.5
}

impl Config {
    /// Load configuration from a specific path, or use default search paths
    pub fn load_with_path(path: Option<String>) -> Result<Self> {
        // If explicit path provided, use it
        if let Some(config_path) = path {
            debug!("Loading config from explicit path: {}", config_path);
            return Self::load_from_path(&config_path);
        }

        // Try working directory first (per-project config)
        if let Ok(config) = Self::load_from_path("tooleval.toml") {
            debug!("Loaded config from ./tooleval.toml");
            return Ok(config);
        }

        // Try user config directory
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("tooleval").join("config.toml");
            if let Ok(config) = Self::load_from_path(&config_path) {
                debug!("Loaded config from {:?}", config_path);
                return Ok(config);
            }
        }

        debug!("Using default config");
        Ok(Self::default())
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Endpoint the client should talk to: explicit client URL, else the server's own.
    pub fn endpoint(&self) -> String {
        self.client
            .base_url
            .clone()
            .unwrap_or_else(|| self.server.base_url())
    }

    /// Model name the client sends: explicit client model, else the served model.
    pub fn request_model(&self) -> String {
        self.client
            .model
            .clone()
            .unwrap_or_else(|| self.server.model.clone())
    }
}
