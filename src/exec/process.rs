//! Child process lifecycle: reaping, group termination, parent-death arming.

use crate::config::types::{GradeError, Result};
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How a reaped child ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildExit {
    Exited(i32),
    Signaled(String),
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildExit::Exited(code) => write!(f, "exited with status {code}"),
            ChildExit::Signaled(signal) => write!(f, "terminated by signal {signal}"),
        }
    }
}

/// Signal escalation report for timeout/forced termination paths.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillReport {
    pub term_sent: bool,
    pub kill_sent: bool,
    pub waited_ms: u64,
    pub exit: Option<ChildExit>,
    pub notes: Vec<String>,
}

fn to_process_error(prefix: &str, err: impl fmt::Display) -> GradeError {
    GradeError::Process(format!("{prefix}: {err}"))
}

fn exit_from_status(status: WaitStatus) -> Option<ChildExit> {
    match status {
        WaitStatus::Exited(_, code) => Some(ChildExit::Exited(code)),
        WaitStatus::Signaled(_, signal, _) => {
            Some(ChildExit::Signaled(signal.as_str().to_string()))
        }
        _ => None,
    }
}

/// Non-blocking reap. `Ok(None)` while the child is still running.
pub fn try_reap(pid: Pid) -> Result<Option<ChildExit>> {
    loop {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => return Ok(None),
            Ok(status) => {
                if let Some(exit) = exit_from_status(status) {
                    return Ok(Some(exit));
                }
            }
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(to_process_error("waitpid(check)", e)),
        }
    }
}

/// Poll until the child exits or `deadline` passes. `None` deadline waits forever.
pub fn reap_until(pid: Pid, deadline: Option<Instant>) -> Result<Option<ChildExit>> {
    loop {
        if let Some(exit) = try_reap(pid)? {
            return Ok(Some(exit));
        }
        if deadline.map_or(false, |d| Instant::now() >= d) {
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Blocking reap, used after SIGKILL has been delivered.
fn reap_blocking(pid: Pid) -> Result<ChildExit> {
    loop {
        match waitpid(pid, None) {
            Ok(status) => {
                if let Some(exit) = exit_from_status(status) {
                    return Ok(exit);
                }
            }
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(to_process_error("waitpid(check)", e)),
        }
    }
}

/// Signal the child's process group, falling back to the child alone when
/// the group is gone or was never formed.
fn signal_group(pid: Pid, signal: Signal, report: &mut KillReport) -> bool {
    match killpg(pid, signal) {
        Ok(()) => true,
        Err(group_err) => match kill(pid, signal) {
            Ok(()) => {
                report
                    .notes
                    .push(format!("group {signal} fallback used: {group_err}"));
                true
            }
            Err(Errno::ESRCH) => false,
            Err(e) => {
                report.notes.push(format!("{signal} failed: {e}"));
                false
            }
        },
    }
}

/// SIGTERM the group, give it `grace` to exit, then SIGKILL and reap.
pub fn terminate_group(pid: Pid, grace: Duration) -> KillReport {
    let mut report = KillReport::default();
    let start = Instant::now();

    report.term_sent = signal_group(pid, Signal::SIGTERM, &mut report);

    match reap_until(pid, Some(start + grace)) {
        Ok(Some(exit)) => {
            // Leader is gone; only the group may still hold stragglers.
            sweep_group(pid);
            report.exit = Some(exit);
        }
        Ok(None) | Err(_) => {
            report.kill_sent = signal_group(pid, Signal::SIGKILL, &mut report);
            log::info!("check process {} ignored SIGTERM; SIGKILL sent", pid);
            report.exit = match reap_blocking(pid) {
                Ok(exit) => Some(exit),
                Err(e) => {
                    report.notes.push(e.to_string());
                    None
                }
            };
        }
    }

    if report.exit.is_none() {
        log::warn!("check process {} could not be reaped", pid);
    }

    report.waited_ms = start.elapsed().as_millis() as u64;
    report
}

/// Kill anything left in the child's group, then reap the child.
/// Used once a result has been received and nothing more is needed from it.
pub fn sweep_and_reap(pid: Pid) -> Result<ChildExit> {
    match killpg(pid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => log::debug!("sweep of check group {} failed: {}", pid, e),
    }
    reap_blocking(pid)
}

/// Best-effort sweep of a group whose leader is already reaped.
pub fn sweep_group(pid: Pid) {
    match killpg(pid, Signal::SIGKILL) {
        Ok(()) => log::debug!("killed leftover processes in check group {}", pid),
        Err(Errno::ESRCH) => {}
        Err(e) => log::debug!("sweep of check group {} failed: {}", pid, e),
    }
}

/// Child receives SIGKILL if the harness dies first.
pub fn arm_parent_death_signal() -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        nix::sys::prctl::set_pdeathsig(Signal::SIGKILL)
            .map_err(|e| to_process_error("prctl(PR_SET_PDEATHSIG)", e))
    }

    #[cfg(not(target_os = "linux"))]
    {
        Ok(())
    }
}
