/// Shared type definitions for gradebox
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Closed set of verdicts a check can end with.
///
/// `DependencyUnmet`, `MissingRequiredFile`, `Timeout`, `CheckFailure` and
/// `CheckCrashed` are expected grading outcomes and live here as values,
/// never as errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Partial,
    Fail,
    Timeout,
    SkippedDependency,
    SkippedMissingFile,
    Crashed,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Partial => "PARTIAL",
            Verdict::Fail => "FAIL",
            Verdict::Timeout => "TIMEOUT",
            Verdict::SkippedDependency => "SKIPPED_DEPENDENCY",
            Verdict::SkippedMissingFile => "SKIPPED_MISSING_FILE",
            Verdict::Crashed => "CRASHED",
        }
    }

    /// Verdicts produced without ever running the check body.
    pub fn is_skip(&self) -> bool {
        matches!(self, Verdict::SkippedDependency | Verdict::SkippedMissingFile)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of one check in one run.
///
/// Equality ignores `elapsed`: two runs that grade the same are equal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GradedResult {
    pub points: u32,
    pub max_points: u32,
    pub verdict: Verdict,
    pub message: Option<String>,
    /// Wall time spent on the check. Diagnostic only, never rendered.
    #[serde(skip)]
    pub elapsed: Duration,
}

impl GradedResult {
    /// Zero-point result for a verdict that awards nothing.
    pub fn zero(verdict: Verdict, max_points: u32, message: Option<String>) -> Self {
        Self {
            points: 0,
            max_points,
            verdict,
            message,
            elapsed: Duration::ZERO,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Full credit. Feeds the dependency passed-set.
    pub fn is_full_credit(&self) -> bool {
        self.points == self.max_points
    }

    /// Report line, e.g. `PARTIAL (6/10): two edge cases failed`.
    pub fn render(&self) -> String {
        let mut line = format!("{} ({}/{})", self.verdict, self.points, self.max_points);
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            line.push_str(": ");
            line.push_str(message);
        }
        line
    }
}

impl PartialEq for GradedResult {
    fn eq(&self, other: &Self) -> bool {
        self.points == other.points
            && self.max_points == other.max_points
            && self.verdict == other.verdict
            && self.message == other.message
    }
}

impl Eq for GradedResult {}

/// Hook phases surrounding the scored pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStage {
    Init,
    Cleanup,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookStage::Init => f.write_str("init"),
            HookStage::Cleanup => f.write_str("cleanup"),
        }
    }
}

/// Custom error types for gradebox
#[derive(Error, Debug)]
pub enum GradeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Result channel error: {0}")]
    Channel(String),

    #[error("{stage} failed: {message}")]
    Hook { stage: HookStage, message: String },

    /// Accounting is broken. Never a user-facing grading outcome.
    #[error("engine invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Report error: {path}: {message}")]
    Report { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, GradeError>;

impl From<nix::errno::Errno> for GradeError {
    fn from(err: nix::errno::Errno) -> Self {
        GradeError::Process(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_omits_separator_without_message() {
        let result = GradedResult {
            points: 5,
            max_points: 5,
            verdict: Verdict::Pass,
            message: None,
            elapsed: Duration::ZERO,
        };
        assert_eq!(result.render(), "PASS (5/5)");
    }

    #[test]
    fn render_appends_message() {
        let result = GradedResult::zero(Verdict::Fail, 5, Some("bad".to_string()));
        assert_eq!(result.render(), "FAIL (0/5): bad");
    }

    #[test]
    fn render_treats_empty_message_as_absent() {
        let result = GradedResult::zero(Verdict::Timeout, 10, Some(String::new()));
        assert_eq!(result.render(), "TIMEOUT (0/10)");
    }

    #[test]
    fn equality_ignores_elapsed() {
        let fast = GradedResult::zero(Verdict::Fail, 5, Some("bad".to_string()))
            .with_elapsed(Duration::from_millis(3));
        let slow = fast.clone().with_elapsed(Duration::from_secs(2));
        assert_eq!(fast, slow);

        let other = GradedResult::zero(Verdict::Fail, 5, Some("worse".to_string()));
        assert_ne!(fast, other);
    }

    #[test]
    fn verdict_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&Verdict::SkippedMissingFile).unwrap();
        assert_eq!(json, "\"SKIPPED_MISSING_FILE\"");
        assert!(Verdict::SkippedDependency.is_skip());
        assert!(!Verdict::Crashed.is_skip());
    }

    #[test]
    fn hook_error_names_stage() {
        let err = GradeError::Hook {
            stage: HookStage::Init,
            message: "docker missing".to_string(),
        };
        assert_eq!(err.to_string(), "init failed: docker missing");
    }
}
