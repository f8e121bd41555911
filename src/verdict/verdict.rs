/// Grading rules and verdict classification
/// Pure functions from a body outcome or termination evidence to a GradedResult.
use crate::config::types::{GradedResult, Verdict};
use crate::core::check::Outcome;
use crate::exec::channel::ChildMessage;
use crate::exec::process::{ChildExit, KillReport};
use std::time::Duration;

/// Everything the parent learned about one isolated execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionEvidence {
    /// The child delivered its message.
    Reported(ChildMessage),
    /// The child ended without a usable message.
    Vanished {
        exit: Option<ChildExit>,
        detail: Option<String>,
    },
    /// The deadline passed and the child was terminated.
    TimedOut {
        limit: Duration,
        kill: KillReport,
    },
    /// Channel creation or fork failed; the body never started.
    LaunchFailed(String),
}

/// Verdict classifier - pure function over evidence
pub struct VerdictClassifier;

impl VerdictClassifier {
    pub fn classify(max_points: u32, evidence: &ExecutionEvidence) -> GradedResult {
        match evidence {
            ExecutionEvidence::Reported(ChildMessage::Outcome { outcome }) => {
                Self::grade_outcome(max_points, outcome)
            }
            ExecutionEvidence::Reported(ChildMessage::Failure { trace }) => {
                GradedResult::zero(Verdict::Crashed, max_points, Some(trace.clone()))
            }
            ExecutionEvidence::Vanished { exit, detail } => {
                Self::classify_vanished(max_points, exit.as_ref(), detail.as_deref())
            }
            // Nothing from a terminated child is trusted, so no message beyond the verdict.
            ExecutionEvidence::TimedOut { .. } => {
                GradedResult::zero(Verdict::Timeout, max_points, None)
            }
            ExecutionEvidence::LaunchFailed(reason) => GradedResult::zero(
                Verdict::Crashed,
                max_points,
                Some(format!("failed to launch isolated check: {reason}")),
            ),
        }
    }

    /// Partial-credit rules.
    pub fn grade_outcome(max_points: u32, outcome: &Outcome) -> GradedResult {
        match outcome {
            Outcome::Pass => GradedResult {
                points: max_points,
                max_points,
                verdict: Verdict::Pass,
                message: None,
                elapsed: Duration::ZERO,
            },
            Outcome::Fail { message } => GradedResult::zero(
                Verdict::Fail,
                max_points,
                Some(message.clone()).filter(|m| !m.is_empty()),
            ),
            Outcome::Partial { points, note } => {
                if *points > max_points {
                    log::warn!(
                        "partial result of {} points exceeds maximum {}; clamping",
                        points,
                        max_points
                    );
                }
                let points = (*points).min(max_points);
                GradedResult {
                    points,
                    max_points,
                    verdict: Self::partial_verdict(points, max_points),
                    message: note.clone(),
                    elapsed: Duration::ZERO,
                }
            }
        }
    }

    /// Full marks win over zero, so a 0-point check awarding 0 is a pass.
    fn partial_verdict(points: u32, max_points: u32) -> Verdict {
        if points == max_points {
            Verdict::Pass
        } else if points == 0 {
            Verdict::Fail
        } else {
            Verdict::Partial
        }
    }

    fn classify_vanished(
        max_points: u32,
        exit: Option<&ChildExit>,
        detail: Option<&str>,
    ) -> GradedResult {
        let mut message = match exit {
            Some(exit) => format!("check process {exit} without reporting a result"),
            None => "check process ended without reporting a result".to_string(),
        };
        if let Some(detail) = detail {
            message.push_str(" (");
            message.push_str(detail);
            message.push(')');
        }
        GradedResult::zero(Verdict::Crashed, max_points, Some(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reported(outcome: Outcome) -> ExecutionEvidence {
        ExecutionEvidence::Reported(ChildMessage::Outcome { outcome })
    }

    #[test]
    fn test_classify_pass() {
        let result = VerdictClassifier::classify(5, &reported(Outcome::Pass));
        assert_eq!(result.verdict, Verdict::Pass);
        assert_eq!(result.points, 5);
        assert_eq!(result.render(), "PASS (5/5)");
    }

    #[test]
    fn test_classify_fail() {
        let result = VerdictClassifier::classify(5, &reported(Outcome::fail("bad")));
        assert_eq!(result.verdict, Verdict::Fail);
        assert_eq!(result.points, 0);
        assert_eq!(result.render(), "FAIL (0/5): bad");
    }

    #[test]
    fn test_classify_partial() {
        let result = VerdictClassifier::classify(
            10,
            &reported(Outcome::partial(6, "two edge cases failed")),
        );
        assert_eq!(result.verdict, Verdict::Partial);
        assert_eq!(result.points, 6);
        assert_eq!(result.render(), "PARTIAL (6/10): two edge cases failed");
    }

    #[test]
    fn test_partial_boundaries() {
        let full = VerdictClassifier::grade_outcome(10, &Outcome::points(10));
        assert_eq!(full.verdict, Verdict::Pass);
        assert!(full.is_full_credit());

        let none = VerdictClassifier::grade_outcome(10, &Outcome::partial(0, "nothing worked"));
        assert_eq!(none.verdict, Verdict::Fail);
        assert_eq!(none.render(), "FAIL (0/10): nothing worked");
    }

    #[test]
    fn test_partial_is_clamped() {
        let result = VerdictClassifier::grade_outcome(10, &Outcome::points(25));
        assert_eq!(result.points, 10);
        assert_eq!(result.verdict, Verdict::Pass);
    }

    #[test]
    fn test_zero_point_check() {
        let result = VerdictClassifier::grade_outcome(0, &Outcome::points(0));
        assert_eq!(result.verdict, Verdict::Pass);
    }

    #[test]
    fn test_failure_trace_is_crash() {
        let evidence = ExecutionEvidence::Reported(ChildMessage::Failure {
            trace: "panicked at 'boom'".to_string(),
        });
        let result = VerdictClassifier::classify(5, &evidence);
        assert_eq!(result.verdict, Verdict::Crashed);
        assert_eq!(result.points, 0);
        assert_eq!(result.render(), "CRASHED (0/5): panicked at 'boom'");
    }

    #[test]
    fn test_vanished_child_names_signal() {
        let evidence = ExecutionEvidence::Vanished {
            exit: Some(ChildExit::Signaled("SIGSEGV".to_string())),
            detail: None,
        };
        let result = VerdictClassifier::classify(5, &evidence);
        assert_eq!(result.verdict, Verdict::Crashed);
        assert_eq!(
            result.message.as_deref(),
            Some("check process terminated by signal SIGSEGV without reporting a result")
        );
    }

    #[test]
    fn test_vanished_child_with_detail() {
        let evidence = ExecutionEvidence::Vanished {
            exit: Some(ChildExit::Exited(3)),
            detail: Some("undecodable result message".to_string()),
        };
        let result = VerdictClassifier::classify(5, &evidence);
        assert!(result.message.unwrap().ends_with(
            "exited with status 3 without reporting a result (undecodable result message)"
        ));
    }

    #[test]
    fn test_timeout_discards_child_output() {
        let evidence = ExecutionEvidence::TimedOut {
            limit: Duration::from_secs(1),
            kill: KillReport {
                term_sent: true,
                kill_sent: true,
                waited_ms: 200,
                exit: Some(ChildExit::Signaled("SIGKILL".to_string())),
                notes: vec![],
            },
        };
        let result = VerdictClassifier::classify(10, &evidence);
        assert_eq!(result.verdict, Verdict::Timeout);
        assert_eq!(result.render(), "TIMEOUT (0/10)");
    }

    #[test]
    fn test_launch_failure_is_crash() {
        let result =
            VerdictClassifier::classify(5, &ExecutionEvidence::LaunchFailed("EAGAIN".to_string()));
        assert_eq!(result.verdict, Verdict::Crashed);
        assert_eq!(
            result.render(),
            "CRASHED (0/5): failed to launch isolated check: EAGAIN"
        );
    }
}
