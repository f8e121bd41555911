use crate::config::config::HarnessConfig;
use crate::config::types::GradedResult;
use crate::core::check::{CheckSpec, Outcome};
use crate::exec::channel::{ChildMessage, Delivery, ResultChannel, ResultSender};
use crate::exec::process::{
    arm_parent_death_signal, reap_until, sweep_and_reap, sweep_group, terminate_group,
};
use crate::verdict::verdict::{ExecutionEvidence, VerdictClassifier};
use nix::unistd::{fork, setpgid, ForkResult, Pid};
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Exit status of a child that could not deliver its message.
const CHILD_SEND_FAILED: i32 = 125;

static PANIC_TRACE: Mutex<Option<String>> = Mutex::new(None);

/// Runs one check body and grades it. Implementations never fail: every
/// problem is folded into the returned result.
pub trait CheckExecutor {
    fn run(&self, spec: &CheckSpec) -> GradedResult;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// SIGTERM -> SIGKILL escalation window on timeout.
    pub kill_grace: Duration,
    pub max_message_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::from(&HarnessConfig::default())
    }
}

impl From<&HarnessConfig> for ExecutorConfig {
    fn from(config: &HarnessConfig) -> Self {
        Self {
            kill_grace: config.kill_grace(),
            max_message_bytes: config.max_message_bytes,
        }
    }
}

/// Forks one child per check. The child runs the body in its own process
/// group and reports over a one-shot pipe; the parent waits at most the
/// check's timeout and then tears the whole group down.
#[derive(Clone, Debug, Default)]
pub struct IsolatedExecutor {
    config: ExecutorConfig,
}

impl IsolatedExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run the body in a child process and collect what happened to it.
    pub fn execute(&self, spec: &CheckSpec) -> ExecutionEvidence {
        let (sender, receiver) = match ResultChannel::open() {
            Ok(ends) => ends,
            Err(e) => return ExecutionEvidence::LaunchFailed(e.to_string()),
        };
        let started = Instant::now();

        // SAFETY: the child branch only runs the check body and then `_exit`s;
        // it never returns into the caller's stack.
        let child = match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                drop(receiver);
                let code = run_child(spec, sender);
                unsafe { libc::_exit(code) }
            }
            Ok(ForkResult::Parent { child }) => child,
            Err(e) => return ExecutionEvidence::LaunchFailed(format!("fork(check): {e}")),
        };
        drop(sender);
        // Mirror the child's setpgid so the group exists before any signal is sent.
        let _ = setpgid(child, child);

        let pending = receiver.listen(self.config.max_message_bytes);
        let timeout = spec.timeout_limit();
        let deadline = timeout.map(|limit| started + limit);

        match pending.wait(timeout) {
            Delivery::Message(message) => {
                if let Err(e) = sweep_and_reap(child) {
                    log::warn!("check '{}': reaping reported child failed: {}", spec.name(), e);
                }
                ExecutionEvidence::Reported(message)
            }
            Delivery::Expired => self.stop_timed_out(spec, child, timeout.unwrap_or_default()),
            Delivery::Malformed(detail) => {
                let exit = sweep_and_reap(child).ok();
                ExecutionEvidence::Vanished {
                    exit,
                    detail: Some(detail),
                }
            }
            Delivery::Closed => match reap_until(child, deadline) {
                Ok(Some(exit)) => {
                    sweep_group(child);
                    ExecutionEvidence::Vanished { exit: Some(exit), detail: None }
                }
                Ok(None) => self.stop_timed_out(spec, child, timeout.unwrap_or_default()),
                Err(e) => {
                    let exit = sweep_and_reap(child).ok();
                    ExecutionEvidence::Vanished {
                        exit,
                        detail: Some(e.to_string()),
                    }
                }
            },
        }
    }

    fn stop_timed_out(&self, spec: &CheckSpec, child: Pid, limit: Duration) -> ExecutionEvidence {
        log::warn!(
            "check '{}' exceeded its {:?} timeout; terminating process group {}",
            spec.name(),
            limit,
            child
        );
        let kill = terminate_group(child, self.config.kill_grace);
        log::debug!("check '{}' kill report: {:?}", spec.name(), kill);
        ExecutionEvidence::TimedOut { limit, kill }
    }
}

impl CheckExecutor for IsolatedExecutor {
    fn run(&self, spec: &CheckSpec) -> GradedResult {
        let started = Instant::now();
        let evidence = self.execute(spec);
        if let ExecutionEvidence::LaunchFailed(reason) = &evidence {
            log::error!("check '{}' could not be launched: {}", spec.name(), reason);
        }
        VerdictClassifier::classify(spec.max_points(), &evidence).with_elapsed(started.elapsed())
    }
}

/// Child side. Never unwinds past this frame; the return value is the exit status.
fn run_child(spec: &CheckSpec, sender: ResultSender) -> i32 {
    let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
    // Fires when the forking thread exits, which always outlives the check.
    if let Err(e) = arm_parent_death_signal() {
        log::debug!("check '{}': {}", spec.name(), e);
    }
    install_panic_capture();

    let message = match panic::catch_unwind(AssertUnwindSafe(|| spec.invoke())) {
        Ok(Ok(outcome)) => ChildMessage::Outcome { outcome },
        Ok(Err(err)) => ChildMessage::Failure {
            trace: format!("{err:?}"),
        },
        Err(payload) => ChildMessage::Failure {
            trace: take_panic_trace().unwrap_or_else(|| panic_payload_text(payload.as_ref())),
        },
    };
    if let Some(diagnostic) = child_diagnostic(spec.name(), &message) {
        eprintln!("{diagnostic}");
    }

    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    match sender.send(&message) {
        Ok(()) => 0,
        Err(_) => CHILD_SEND_FAILED,
    }
}

/// Stderr text the child prints before reporting a non-passing body.
fn child_diagnostic(name: &str, message: &ChildMessage) -> Option<String> {
    match message {
        ChildMessage::Failure { trace } => Some(format!("Exception in {name}:\n{trace}\n")),
        ChildMessage::Outcome {
            outcome: Outcome::Fail { message },
        } => Some(format!("Test {name} failed:\n{message}\n")),
        ChildMessage::Outcome { .. } => None,
    }
}

fn install_panic_capture() {
    panic::set_hook(Box::new(|info| {
        let mut trace = info.to_string();
        let backtrace = Backtrace::capture();
        if backtrace.status() == BacktraceStatus::Captured {
            trace.push_str("\nstack backtrace:\n");
            trace.push_str(&backtrace.to_string());
        }
        if let Ok(mut slot) = PANIC_TRACE.lock() {
            *slot = Some(trace);
        }
    }));
}

fn take_panic_trace() -> Option<String> {
    PANIC_TRACE.lock().ok().and_then(|mut slot| slot.take())
}

fn panic_payload_text(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        format!("panicked: {text}")
    } else if let Some(text) = payload.downcast_ref::<String>() {
        format!("panicked: {text}")
    } else {
        "panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::Verdict;

    fn executor() -> IsolatedExecutor {
        IsolatedExecutor::new(ExecutorConfig {
            kill_grace: Duration::from_millis(100),
            max_message_bytes: 64 * 1024,
        })
    }

    #[test]
    fn passing_body_gets_full_points() {
        let spec = CheckSpec::new("a", 5, || Ok(Outcome::Pass));
        let result = executor().run(&spec);
        assert_eq!(result.verdict, Verdict::Pass);
        assert_eq!(result.points, 5);
    }

    #[test]
    fn explicit_fail_is_reported_on_stderr() {
        let failed = ChildMessage::Outcome {
            outcome: Outcome::fail("expected 7, got 8"),
        };
        assert_eq!(
            child_diagnostic("sum", &failed).unwrap(),
            "Test sum failed:\nexpected 7, got 8\n"
        );

        let crashed = ChildMessage::Failure {
            trace: "boom".to_string(),
        };
        assert_eq!(
            child_diagnostic("sum", &crashed).unwrap(),
            "Exception in sum:\nboom\n"
        );

        let passed = ChildMessage::Outcome {
            outcome: Outcome::Pass,
        };
        assert!(child_diagnostic("sum", &passed).is_none());
        let partial = ChildMessage::Outcome {
            outcome: Outcome::partial(3, "close"),
        };
        assert!(child_diagnostic("sum", &partial).is_none());
    }

    #[test]
    fn explicit_fail_keeps_message() {
        let spec = CheckSpec::new("sum", 5, || Ok(Outcome::fail("expected 7, got 8")));
        let result = executor().run(&spec);
        assert_eq!(result.verdict, Verdict::Fail);
        assert_eq!(result.render(), "FAIL (0/5): expected 7, got 8");
    }

    #[test]
    fn error_return_is_crash() {
        let spec = CheckSpec::new("err", 5, || Err(anyhow::anyhow!("container did not start")));
        let result = executor().run(&spec);
        assert_eq!(result.verdict, Verdict::Crashed);
        assert!(result.message.unwrap().contains("container did not start"));
    }

    #[test]
    fn panic_is_contained() {
        let spec = CheckSpec::new("boom", 5, || panic!("boom in check body"));
        let result = executor().run(&spec);
        assert_eq!(result.verdict, Verdict::Crashed);
        assert_eq!(result.points, 0);
        assert!(result.message.unwrap().contains("boom in check body"));
    }

    #[test]
    fn silent_exit_is_crash() {
        let spec = CheckSpec::new("exit", 5, || std::process::exit(7));
        let result = executor().run(&spec);
        assert_eq!(result.verdict, Verdict::Crashed);
        assert!(result.message.unwrap().contains("exited with status 7"));
    }

    #[test]
    fn timeout_stops_body() {
        let spec = CheckSpec::new("sleepy", 10, || {
            std::thread::sleep(Duration::from_secs(30));
            Ok(Outcome::Pass)
        })
        .timeout(Duration::from_millis(300));

        let started = Instant::now();
        let result = executor().run(&spec);
        assert_eq!(result.verdict, Verdict::Timeout);
        assert_eq!(result.points, 0);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
