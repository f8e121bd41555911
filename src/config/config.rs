use crate::config::types::{GradeError, Result};
/// Harness configuration loading
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_KILL_GRACE_MS: u64 = 10_000;
const MIN_MESSAGE_BYTES: usize = 1024;

/// Run-level settings shared by the harness, scorer and executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Submission directory; required files resolve against it.
    pub submission_dir: PathBuf,
    /// Report location. Relative paths resolve against `submission_dir`.
    pub output_file: PathBuf,
    pub verbose: bool,
    /// Time between SIGTERM and SIGKILL when a check is stopped.
    pub kill_grace_ms: u64,
    /// Upper bound on one child result message.
    pub max_message_bytes: usize,
    /// Optional JSON-lines event log.
    pub journal_file: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            submission_dir: PathBuf::from("."),
            output_file: PathBuf::from("score.json"),
            verbose: false,
            kill_grace_ms: 200,
            max_message_bytes: 1024 * 1024,
            journal_file: None,
        }
    }
}

impl HarnessConfig {
    /// Load from a JSON file; absent keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GradeError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| GradeError::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Apply `GRADEBOX_*` overrides from the process environment.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(dir) = lookup("GRADEBOX_DIR") {
            self.submission_dir = PathBuf::from(dir);
        }
        if let Some(output) = lookup("GRADEBOX_OUTPUT") {
            self.output_file = PathBuf::from(output);
        }
        if let Some(journal) = lookup("GRADEBOX_JOURNAL") {
            self.journal_file = Some(PathBuf::from(journal));
        }
        if let Some(grace) = lookup("GRADEBOX_KILL_GRACE_MS") {
            self.kill_grace_ms = grace.trim().parse().map_err(|_| {
                GradeError::Config(format!("GRADEBOX_KILL_GRACE_MS is not a number: {grace}"))
            })?;
        }
        if let Some(verbose) = lookup("GRADEBOX_VERBOSE") {
            self.verbose = matches!(verbose.trim(), "1" | "true" | "yes");
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.kill_grace_ms > MAX_KILL_GRACE_MS {
            return Err(GradeError::Config(format!(
                "kill_grace_ms {} exceeds {} ms",
                self.kill_grace_ms, MAX_KILL_GRACE_MS
            )));
        }
        if self.max_message_bytes < MIN_MESSAGE_BYTES {
            return Err(GradeError::Config(format!(
                "max_message_bytes {} is below {} bytes",
                self.max_message_bytes, MIN_MESSAGE_BYTES
            )));
        }
        if self.output_file.as_os_str().is_empty() {
            return Err(GradeError::Config("output_file is empty".to_string()));
        }
        Ok(())
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    /// Report path with relative paths anchored at the submission directory.
    pub fn resolved_output(&self) -> PathBuf {
        if self.output_file.is_absolute() {
            self.output_file.clone()
        } else {
            self.submission_dir.join(&self.output_file)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = HarnessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.kill_grace(), Duration::from_millis(200));
        assert_eq!(config.resolved_output(), PathBuf::from("./score.json"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradebox.json");
        std::fs::write(&path, r#"{ "kill_grace_ms": 50, "verbose": true }"#).unwrap();

        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.kill_grace_ms, 50);
        assert!(config.verbose);
        assert_eq!(config.output_file, PathBuf::from("score.json"));
    }

    #[test]
    fn malformed_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradebox.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = HarnessConfig::load(&path).unwrap_err();
        assert!(matches!(err, GradeError::Config(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let config = HarnessConfig::default()
            .apply_overrides(env(&[
                ("GRADEBOX_OUTPUT", "/tmp/out.json"),
                ("GRADEBOX_KILL_GRACE_MS", "25"),
                ("GRADEBOX_VERBOSE", "true"),
            ]))
            .unwrap();
        assert_eq!(config.resolved_output(), PathBuf::from("/tmp/out.json"));
        assert_eq!(config.kill_grace_ms, 25);
        assert!(config.verbose);
    }

    #[test]
    fn env_rejects_non_numeric_grace() {
        let err = HarnessConfig::default()
            .apply_overrides(env(&[("GRADEBOX_KILL_GRACE_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("GRADEBOX_KILL_GRACE_MS"));
    }

    #[test]
    fn validate_bounds() {
        let config = HarnessConfig {
            kill_grace_ms: 60_000,
            ..HarnessConfig::default()
        };
        assert!(config.validate().is_err());

        let config = HarnessConfig {
            max_message_bytes: 16,
            ..HarnessConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
