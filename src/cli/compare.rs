use anyhow::{Context, Result};
use std::fs;
use tracing::info;

use crate::compare::compare_reports;
use crate::report::EvalReport;

/// Compare saved reports (first is the baseline) and print the summary.
pub fn run(paths: &[String], output: Option<String>) -> Result<()> {
    let reports = paths
        .iter()
        .map(EvalReport::load)
        .collect::<Result<Vec<_>>>()?;

    let comparison = compare_reports(&reports)?;
    print!("{}", comparison.format_summary());

    if let Some(output) = output {
        fs::write(&output, comparison.to_json()?)
            .with_context(|| format!("Failed to write comparison to {}", output))?;
        info!("Wrote comparison to {}", output);
    }

    Ok(())
}
