use crate::config::types::{GradedResult, Verdict};
use crate::core::check::CheckSpec;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Gate decision for one check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    DeniedDependency(String),
    DeniedMissingFile(PathBuf),
}

impl Admission {
    /// Zero-point result standing in for a body that never ran.
    /// `None` when the check was admitted.
    pub fn skipped_result(&self, spec: &CheckSpec) -> Option<GradedResult> {
        match self {
            Admission::Allowed => None,
            Admission::DeniedDependency(name) => Some(GradedResult::zero(
                Verdict::SkippedDependency,
                spec.max_points(),
                Some(format!("dependency {name} did not pass")),
            )),
            Admission::DeniedMissingFile(path) => Some(GradedResult::zero(
                Verdict::SkippedMissingFile,
                spec.max_points(),
                Some(format!("{} not found", path.display())),
            )),
        }
    }
}

/// Decides whether a check body may run. Inspects only the passed set and
/// the filesystem; dependencies are consulted before files.
#[derive(Clone, Debug)]
pub struct DependencyGate {
    base_dir: PathBuf,
}

impl Default for DependencyGate {
    fn default() -> Self {
        Self::new(".")
    }
}

impl DependencyGate {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn admit(&self, spec: &CheckSpec, passed: &BTreeSet<String>) -> Admission {
        if let Some(missing) = spec.dependencies().find(|dep| !passed.contains(*dep)) {
            return Admission::DeniedDependency(missing.to_string());
        }

        if let Some(missing) = spec.required_files().find(|path| !self.resolve(path).exists()) {
            return Admission::DeniedMissingFile(missing.to_path_buf());
        }

        Admission::Allowed
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
