//! Command-line construction for the serving process

use crate::config::ServerConfig;

/// Build the argument vector (program excluded) from a server configuration.
///
/// Pure: the same config always yields the same arguments, and every flag comes from a
/// config field. Optional limits are emitted only when set.
pub fn build_server_args(config: &ServerConfig) -> Vec<String> {
    let mut args: Vec<String> = config.program_args.clone();

    args.extend([
        "--model".to_string(),
        config.model.clone(),
        "--host".to_string(),
        config.host.clone(),
        "--port".to_string(),
        config.port.to_string(),
    ]);

    if let Some(adapter) = &config.adapter {
        args.push("--adapter-path".to_string());
        args.push(adapter.clone());
    }
    if let Some(max_tokens) = config.max_tokens {
        args.push("--max-tokens".to_string());
        args.push(max_tokens.to_string());
    }
    if let Some(max_concurrency) = config.max_concurrency {
        args.push("--max-concurrency".to_string());
        args.push(max_concurrency.to_string());
    }
    if let Some(fraction) = config.memory_fraction {
        args.push("--memory-fraction".to_string());
        args.push(fraction.to_string());
    }

    args.extend(config.extra_args.iter().cloned());
    args
}
