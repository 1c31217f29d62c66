use anyhow::Result;
use tracing::info;

use crate::client::factory;
use crate::config::Config;
use crate::error::EvalError;
use crate::evaluator::{Evaluator, RunSettings};
use crate::report::EvalReport;
use crate::suite::EvalSuite;

/// Options for one evaluation run; CLI flags override config values.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub suite: Option<String>,
    pub category: Option<String>,
    pub config: Option<String>,
    pub model: Option<String>,
    pub adapter: Option<String>,
    pub endpoint: Option<String>,
    pub no_manage_server: bool,
    pub output: String,
    pub dry_run: bool,
}

/// Fold CLI overrides into the loaded config.
pub fn apply_overrides(mut config: Config, options: &RunOptions) -> Config {
    if let Some(model) = &options.model {
        config.server.model = model.clone();
    }
    if let Some(adapter) = &options.adapter {
        config.server.adapter = Some(adapter.clone());
    }
    if let Some(endpoint) = &options.endpoint {
        config.client.base_url = Some(endpoint.clone());
        config.evaluation.manage_server = false;
    }
    if options.no_manage_server || options.dry_run {
        config.evaluation.manage_server = false;
    }
    config
}

/// The built-in suite unless a suite file is given, narrowed to one category if asked.
pub fn load_suite(options: &RunOptions) -> Result<EvalSuite> {
    let suite = match options.suite.as_deref() {
        None | Some("builtin") => EvalSuite::builtin(),
        Some(path) => EvalSuite::load(path)?,
    };
    Ok(match &options.category {
        Some(category) => suite.filter_category(category)?,
        None => suite,
    })
}

/// Run the evaluation, save the report, and print its summary.
///
/// A server that never became healthy comes back as an `EvalError::Boot` inside the error.
pub async fn run(options: RunOptions) -> Result<EvalReport> {
    let config = Config::load_with_path(options.config.clone())?;
    let config = apply_overrides(config, &options);
    config.evaluation.validate().map_err(EvalError::Config)?;

    let suite = load_suite(&options)?;
    let client = factory::create_client(&config, options.dry_run)?;
    let evaluator = Evaluator::new(RunSettings::from_config(&config));

    let report = evaluator.run(&suite, client.as_ref()).await?;
    report.save(&options.output)?;
    info!("Wrote report to {}", options.output);

    print!("{}", report.format_summary());
    Ok(report)
}
