//! Score report: accumulation, invariants, serialization.

use crate::config::types::{GradeError, GradedResult, Result};
use crate::core::check::CheckSpec;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Frozen result of one full pass over the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    score: u32,
    full_score: u32,
    results: Vec<(String, GradedResult)>,
    error: Option<String>,
}

impl Report {
    /// Zero-score report for a run that stopped before any check executed.
    pub fn aborted(error: impl Into<String>) -> Self {
        Self {
            score: 0,
            full_score: 0,
            results: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn full_score(&self) -> u32 {
        self.full_score
    }

    /// Per-check results in registration order.
    pub fn results(&self) -> impl Iterator<Item = (&str, &GradedResult)> + '_ {
        self.results.iter().map(|(name, result)| (name.as_str(), result))
    }

    pub fn result(&self, name: &str) -> Option<&GradedResult> {
        self.results
            .iter()
            .find(|(check, _)| check == name)
            .map(|(_, result)| result)
    }

    /// Why the run stopped early, if it did.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Rendered report line for one check.
    pub fn line(&self, name: &str) -> Option<String> {
        self.result(name).map(GradedResult::render)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| GradeError::Report {
            path: Default::default(),
            message: e.to_string(),
        })
    }

    /// SHA256 of the canonical JSON form. Equal reports have equal fingerprints.
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Write the pretty-printed report, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let report_error = |message: String| GradeError::Report {
            path: path.to_path_buf(),
            message,
        };
        let body = serde_json::to_string_pretty(self).map_err(|e| report_error(e.to_string()))?;
        atomic_write(path, body.as_bytes()).map_err(|e| report_error(e.to_string()))?;
        log::info!("report written to {}", path.display());
        Ok(())
    }
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let fields = if self.error.is_some() { 4 } else { 3 };
        let mut state = serializer.serialize_struct("Report", fields)?;
        state.serialize_field("score", &self.score)?;
        state.serialize_field("full_score", &self.full_score)?;
        state.serialize_field("tests", &RenderedLines(&self.results))?;
        if let Some(error) = &self.error {
            state.serialize_field("error", error)?;
        }
        state.end()
    }
}

/// `tests` map in registration order.
struct RenderedLines<'a>(&'a [(String, GradedResult)]);

impl Serialize for RenderedLines<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, result) in self.0 {
            map.serialize_entry(name, &result.render())?;
        }
        map.end()
    }
}

fn atomic_write(target: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = match target.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        target.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id()
    ));

    {
        let mut f = fs::File::create(&temp_path)?;
        f.write_all(content)?;
        f.sync_all()?;
    }

    if let Err(e) = fs::rename(&temp_path, target) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    if let Ok(dir) = fs::File::open(parent) {
        let _ = dir.sync_all();
    }
    Ok(())
}

/// Incremental accounting for one run. Owns the passed set the gate reads.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    score: u32,
    full_score: u32,
    results: Vec<(String, GradedResult)>,
    passed: BTreeSet<String>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one terminal result into the running totals.
    pub fn record(&mut self, spec: &CheckSpec, result: GradedResult) -> Result<()> {
        if result.max_points != spec.max_points() || result.points > result.max_points {
            return Err(GradeError::InvariantViolation(format!(
                "check '{}' graded {}/{} against a maximum of {}",
                spec.name(),
                result.points,
                result.max_points,
                spec.max_points()
            )));
        }

        let (Some(full_score), Some(score)) = (
            self.full_score.checked_add(spec.max_points()),
            self.score.checked_add(result.points),
        ) else {
            return Err(GradeError::InvariantViolation(format!(
                "score overflow adding check '{}' ({} points) to a full score of {}",
                spec.name(),
                spec.max_points(),
                self.full_score
            )));
        };
        self.full_score = full_score;
        self.score = score;
        if result.is_full_credit() {
            self.passed.insert(spec.name().to_string());
        }
        self.results.push((spec.name().to_string(), result));
        Ok(())
    }

    /// Names of checks that earned full credit so far.
    pub fn passed(&self) -> &BTreeSet<String> {
        &self.passed
    }

    pub fn finish(self) -> Result<Report> {
        if self.score > self.full_score {
            return Err(GradeError::InvariantViolation(format!(
                "score {} exceeds full score {}",
                self.score, self.full_score
            )));
        }
        Ok(Report {
            score: self.score,
            full_score: self.full_score,
            results: self.results,
            error: None,
        })
    }
}
