use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// What a check body reports when it finishes normally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Full credit.
    Pass,
    /// No credit, with an explanation for the candidate.
    Fail { message: String },
    /// Explicit point count, clamped to the check's maximum.
    Partial { points: u32, note: Option<String> },
}

impl Outcome {
    pub fn fail(message: impl Into<String>) -> Self {
        Outcome::Fail {
            message: message.into(),
        }
    }

    pub fn partial(points: u32, note: impl Into<String>) -> Self {
        Outcome::Partial {
            points,
            note: Some(note.into()),
        }
    }

    pub fn points(points: u32) -> Self {
        Outcome::Partial { points, note: None }
    }
}

/// Check body. Returning `Err` counts as an uncaught failure, same as a panic.
pub type CheckBody = Arc<dyn Fn() -> anyhow::Result<Outcome> + Send + Sync>;

/// Immutable registration record for one check.
#[derive(Clone)]
pub struct CheckSpec {
    name: String,
    max_points: u32,
    timeout: Option<Duration>,
    description: String,
    required_files: Vec<PathBuf>,
    dependencies: Vec<String>,
    body: CheckBody,
}

impl CheckSpec {
    pub fn new<F>(name: impl Into<String>, max_points: u32, body: F) -> Self
    where
        F: Fn() -> anyhow::Result<Outcome> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            max_points,
            timeout: None,
            description: String::new(),
            required_files: Vec::new(),
            dependencies: Vec::new(),
            body: Arc::new(body),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn requires_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.required_files.push(path.into());
        self
    }

    pub fn depends_on(mut self, check: impl Into<String>) -> Self {
        self.dependencies.push(check.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_points(&self) -> u32 {
        self.max_points
    }

    pub fn timeout_limit(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn description_text(&self) -> &str {
        &self.description
    }

    pub fn required_files(&self) -> impl Iterator<Item = &Path> + '_ {
        self.required_files.iter().map(PathBuf::as_path)
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &str> + '_ {
        self.dependencies.iter().map(String::as_str)
    }

    /// Invoke the body in the current process. Only the isolated child calls this.
    pub fn invoke(&self) -> anyhow::Result<Outcome> {
        (self.body)()
    }
}

impl fmt::Debug for CheckSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckSpec")
            .field("name", &self.name)
            .field("max_points", &self.max_points)
            .field("timeout", &self.timeout)
            .field("description", &self.description)
            .field("required_files", &self.required_files)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}
