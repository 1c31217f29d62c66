//! Shared utilities for the tooleval codebase

use std::fmt;

/// A string wrapper that masks its contents in Debug/Display output.
/// Prevents accidental logging of API keys and other secrets.
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Intentionally access the raw secret value (for headers, URLs, etc.)
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<&str> for SecretString {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Check whether a process with this PID still exists.
/// A reaped child no longer exists; a zombie still does.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    // Signal 0 performs the existence/permission check without delivering anything.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
pub fn process_alive(pid: u32) -> bool {
    use std::process::{Command, Stdio};
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid), "/NH"])
        .stderr(Stdio::null())
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

/// Ask a process group to shut down gracefully. `pgid` is the PID of a child spawned as
/// its own group leader. Returns false if the signal could not be sent (typically because
/// every member is already gone).
#[cfg(unix)]
pub fn terminate_process_group(pgid: u32) -> bool {
    signal_group(pgid, libc::SIGTERM)
}

/// Forcefully kill every process in the group, including descendants that outlived the
/// group leader.
#[cfg(unix)]
pub fn kill_process_group(pgid: u32) -> bool {
    signal_group(pgid, libc::SIGKILL)
}

#[cfg(unix)]
fn signal_group(pgid: u32, signal: libc::c_int) -> bool {
    // 0 or 1 as a group id would address our own group or every process.
    if pgid <= 1 {
        return false;
    }
    unsafe { libc::kill(-(pgid as libc::pid_t), signal) == 0 }
}

/// Windows has no graceful signal for arbitrary processes; callers fall through to a
/// forced kill of the direct child after the grace period.
#[cfg(not(unix))]
pub fn terminate_process_group(_pgid: u32) -> bool {
    false
}

#[cfg(not(unix))]
pub fn kill_process_group(_pgid: u32) -> bool {
    false
}

/// Human-readable percentage with one decimal, e.g. `0.8123` -> `81.2%`.
pub fn format_percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}
