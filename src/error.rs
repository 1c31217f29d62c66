//! Error taxonomy for the evaluation core
//!
//! Infrastructure failures (`ServerError`, surfaced through `EvalError::Boot`) are kept
//! apart from per-prompt failures, which never become errors: they are recorded on the
//! result as a zero score with error detail.

use std::time::Duration;
use thiserror::Error;

use crate::server::ServerState;

/// Failures of the process supervisor.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("server cannot be started from state {state}")]
    AlreadyStarted { state: ServerState },

    #[error("failed to spawn server process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("server did not become ready within {timeout:?}")]
    BootTimeout { timeout: Duration },

    #[error("server exited before becoming ready ({status})")]
    ExitedDuringBoot { status: String },

    #[error("failed to build health-check client: {0}")]
    Http(String),
}

/// Failures while building or loading a suite.
#[derive(Error, Debug)]
pub enum SuiteError {
    #[error("duplicate prompt id in suite: {0}")]
    DuplicateId(String),

    #[error("suite '{0}' contains no prompts")]
    EmptySuite(String),

    #[error("no prompts in suite '{suite}' match category '{category}'")]
    NoMatchingPrompts { suite: String, category: String },

    #[error("failed to read suite file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse suite file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Run-level failures of the orchestrator. Anything here means no report was produced.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("could not evaluate: server unhealthy: {0}")]
    Boot(#[from] ServerError),

    #[error(transparent)]
    Suite(#[from] SuiteError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EvalError {
    /// True when the run failed because the serving process never became usable.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, EvalError::Boot(_))
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum CompareError {
    #[error("comparison needs at least two reports, got {got}")]
    NotEnoughReports { got: usize },
}
