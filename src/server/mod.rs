//! Supervisor for the model-serving process
//!
//! A `ServerProcess` owns at most one live OS process. It is only `Running` after a
//! readiness probe succeeded, and `stop` always converges to `Stopped` without failing.
//! Dropping a `ServerProcess` that still owns a process kills it. On Unix the child leads
//! its own process group and every teardown path signals the whole group, so processes
//! forked by a launcher script go down with it.

pub mod args;
pub mod guard;

pub use args::build_server_args;
pub use guard::{with_server, ServerGuard};

use reqwest::Client;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::util::{kill_process_group, terminate_process_group};

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const KILL_WAIT: Duration = Duration::from_secs(5);
// Stand-in for "no deadline" when a timeout would overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Why a server ended up in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    SpawnFailed,
    /// Still alive but never answered the readiness probe in time
    NeverReady,
    /// Exited on its own before the first successful probe
    ExitedDuringBoot,
    /// Was serving, then exited on its own
    ExitedAfterReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed(FailureKind),
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Idle => write!(f, "idle"),
            ServerState::Starting => write!(f, "starting"),
            ServerState::Running => write!(f, "running"),
            ServerState::Stopping => write!(f, "stopping"),
            ServerState::Stopped => write!(f, "stopped"),
            ServerState::Failed(kind) => write!(f, "failed ({:?})", kind),
        }
    }
}

/// What `stop` had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No process was owned
    NotRunning,
    /// The process had already exited
    AlreadyExited,
    /// Exited after the graceful termination request
    Graceful,
    /// Had to be force-killed after the grace period
    Killed,
}

pub struct ServerProcess {
    config: ServerConfig,
    state: ServerState,
    child: Option<Child>,
    /// Process group of the spawned child; outlives the child so stragglers can be killed
    group: Option<u32>,
    http: Client,
    poll_interval: Duration,
}

impl ServerProcess {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let http = Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| ServerError::Http(e.to_string()))?;
        Ok(Self {
            config,
            state: ServerState::Idle,
            child: None,
            group: None,
            http,
            poll_interval: POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// PID of the owned process, if any.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    /// Single readiness probe. Connection errors and timeouts mean "not ready".
    pub async fn health_check(&self) -> bool {
        let url = self.config.readiness_url();
        match self.http.get(&url).send().await {
            Ok(response) => {
                let ready = response.status().is_success();
                debug!("Health check {} -> {}", url, response.status());
                ready
            }
            Err(e) => {
                debug!("Health check {} failed: {}", url, e);
                false
            }
        }
    }

    /// Spawn the server and wait until it answers the readiness probe.
    ///
    /// On any failure the process is gone by the time this returns.
    pub async fn start(&mut self, boot_timeout: Duration) -> Result<(), ServerError> {
        if !matches!(self.state, ServerState::Idle | ServerState::Stopped) {
            return Err(ServerError::AlreadyStarted { state: self.state });
        }

        let args = build_server_args(&self.config);
        info!(
            "Starting server: {} {} (timeout {:?})",
            self.config.program,
            args.join(" "),
            boot_timeout
        );
        self.state = ServerState::Starting;

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        // Own process group, so teardown also reaches whatever the launcher forks.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.state = ServerState::Failed(FailureKind::SpawnFailed);
                return Err(ServerError::Spawn(e));
            }
        };
        debug!("Spawned server pid {:?}", child.id());
        self.group = child.id();
        self.child = Some(child);

        let deadline = deadline_after(boot_timeout);
        loop {
            if let Some(status) = self.reap_if_exited() {
                warn!("Server exited during boot: {}", status);
                self.state = ServerState::Failed(FailureKind::ExitedDuringBoot);
                return Err(ServerError::ExitedDuringBoot { status });
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            if let Ok(true) = timeout(remaining, self.health_check()).await {
                info!("Server ready at {}", self.config.base_url());
                self.state = ServerState::Running;
                return Ok(());
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            sleep(self.poll_interval.min(remaining)).await;
        }

        warn!("Server not ready after {:?}, killing it", boot_timeout);
        self.force_kill().await;
        self.state = ServerState::Failed(FailureKind::NeverReady);
        Err(ServerError::BootTimeout {
            timeout: boot_timeout,
        })
    }

    /// Request graceful termination, force-kill after `grace`, and end in `Stopped`.
    /// Safe to call in any state, any number of times.
    pub async fn stop(&mut self, grace: Duration) -> StopOutcome {
        let Some(mut child) = self.child.take() else {
            self.kill_group();
            self.state = ServerState::Stopped;
            return StopOutcome::NotRunning;
        };
        self.state = ServerState::Stopping;

        let outcome = if let Ok(Some(status)) = child.try_wait() {
            debug!("Server already exited: {}", status);
            StopOutcome::AlreadyExited
        } else {
            match self.group {
                Some(pgid) => {
                    terminate_process_group(pgid);
                }
                None => warn!("Server pid unknown, skipping graceful termination"),
            }
            match timeout(grace, child.wait()).await {
                Ok(_) => StopOutcome::Graceful,
                Err(_) => {
                    warn!("Server ignored termination for {:?}, killing it", grace);
                    self.kill_group();
                    let _ = child.start_kill();
                    let _ = timeout(KILL_WAIT, child.wait()).await;
                    StopOutcome::Killed
                }
            }
        };
        // Descendants that ignored SIGTERM or outlived the leader.
        self.kill_group();

        info!("Server stopped ({:?})", outcome);
        self.state = ServerState::Stopped;
        outcome
    }

    /// Detect an unexpected exit of a running server. Returns false once it is gone.
    pub fn check_alive(&mut self) -> bool {
        if self.state != ServerState::Running {
            return false;
        }
        if let Some(status) = self.reap_if_exited() {
            warn!("Server exited unexpectedly: {}", status);
            self.state = ServerState::Failed(FailureKind::ExitedAfterReady);
            return false;
        }
        true
    }

    /// Reap the child if it has exited, returning its status text.
    fn reap_if_exited(&mut self) -> Option<String> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                self.child = None;
                self.kill_group();
                Some(status.to_string())
            }
            Ok(None) => None,
            Err(e) => {
                debug!("try_wait failed: {}", e);
                None
            }
        }
    }

    async fn force_kill(&mut self) {
        self.kill_group();
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = timeout(KILL_WAIT, child.wait()).await;
        }
    }

    /// SIGKILL the whole process group once; later calls are no-ops.
    fn kill_group(&mut self) {
        if let Some(pgid) = self.group.take() {
            if kill_process_group(pgid) {
                debug!("Killed remaining processes in group {}", pgid);
            }
        }
    }
}

/// `now + timeout`, saturating far in the future instead of overflowing.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            warn!("Server dropped while still owned, killing pid {:?}", child.id());
            let _ = child.start_kill();
        }
        self.kill_group();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(ServerState::Running.to_string(), "running");
        assert_eq!(
            ServerState::Failed(FailureKind::NeverReady).to_string(),
            "failed (NeverReady)"
        );
    }

    #[tokio::test]
    async fn test_new_server_is_idle() {
        let server = ServerProcess::new(ServerConfig::default()).unwrap();
        assert_eq!(server.state(), ServerState::Idle);
        assert!(server.pid().is_none());
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let mut server = ServerProcess::new(ServerConfig::default()).unwrap();
        assert_eq!(
            server.stop(Duration::from_secs(1)).await,
            StopOutcome::NotRunning
        );
        assert_eq!(server.state(), ServerState::Stopped);
        assert_eq!(
            server.stop(Duration::from_secs(1)).await,
            StopOutcome::NotRunning
        );
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_failed_state() {
        let config = ServerConfig {
            program: "/nonexistent/tooleval-server-binary".to_string(),
            ..ServerConfig::default()
        };
        let mut server = ServerProcess::new(config).unwrap();
        let err = server.start(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ServerError::Spawn(_)));
        assert_eq!(server.state(), ServerState::Failed(FailureKind::SpawnFailed));

        // Failed is not a valid start state until stop converges it
        assert!(matches!(
            server.start(Duration::from_secs(1)).await,
            Err(ServerError::AlreadyStarted { .. })
        ));
        server.stop(Duration::from_secs(1)).await;
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[test]
    fn test_deadline_after_saturates() {
        let before = Instant::now();
        let unbounded = deadline_after(Duration::from_secs(u64::MAX));
        assert!(unbounded > before + Duration::from_secs(86_400));
        let short = deadline_after(Duration::from_millis(10));
        assert!(short >= before + Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_health_check_refused_is_false() {
        // Port 9 (discard) is essentially never served locally
        let config = ServerConfig {
            port: 9,
            ..ServerConfig::default()
        };
        let server = ServerProcess::new(config).unwrap();
        assert!(!server.health_check().await);
    }
}
