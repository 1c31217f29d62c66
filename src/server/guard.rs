//! Scoped acquisition of a running server

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use super::{ServerProcess, StopOutcome};
use crate::config::ServerConfig;
use crate::error::ServerError;

/// A server that is `Running` for as long as the guard lives.
///
/// Call [`ServerGuard::release`] for a graceful shutdown. If the guard is dropped instead
/// (early return, panic, cancelled future) the process is killed on drop.
pub struct ServerGuard {
    server: ServerProcess,
    stop_timeout: Duration,
}

impl ServerGuard {
    /// Start a server and wait for readiness. On failure nothing is left running.
    pub async fn acquire(
        config: ServerConfig,
        boot_timeout: Duration,
        stop_timeout: Duration,
    ) -> Result<Self, ServerError> {
        let server = ServerProcess::new(config)?;
        Self::acquire_with(server, boot_timeout, stop_timeout).await
    }

    /// Like [`ServerGuard::acquire`] for a pre-built (e.g. custom poll interval) process.
    pub async fn acquire_with(
        mut server: ServerProcess,
        boot_timeout: Duration,
        stop_timeout: Duration,
    ) -> Result<Self, ServerError> {
        if let Err(e) = server.start(boot_timeout).await {
            server.stop(stop_timeout).await;
            return Err(e);
        }
        Ok(Self {
            server,
            stop_timeout,
        })
    }

    pub fn server(&self) -> &ServerProcess {
        &self.server
    }

    pub fn server_mut(&mut self) -> &mut ServerProcess {
        &mut self.server
    }

    pub fn base_url(&self) -> String {
        self.server.config().base_url()
    }

    pub async fn release(mut self) -> StopOutcome {
        debug!("Releasing server guard");
        self.server.stop(self.stop_timeout).await
    }
}

/// Run `body` against a freshly started server and stop the server afterwards,
/// whatever `body` returns. `body` receives the server's base URL.
pub async fn with_server<F, Fut, T>(
    config: ServerConfig,
    boot_timeout: Duration,
    stop_timeout: Duration,
    body: F,
) -> Result<T, ServerError>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = T>,
{
    let guard = ServerGuard::acquire(config, boot_timeout, stop_timeout).await?;
    let output = body(guard.base_url()).await;
    guard.release().await;
    Ok(output)
}
