use crate::core::check::CheckSpec;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Setup/teardown hook run outside per-check isolation.
pub type Hook = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// One row of the diagnostic listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckListing {
    pub name: String,
    pub points: u32,
    pub description: String,
}

impl fmt::Display for CheckListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}): {}", self.name, self.points, self.description)
    }
}

/// Insertion-ordered check table. Order of first registration is execution order.
#[derive(Clone, Default)]
pub struct Registry {
    checks: Vec<CheckSpec>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, or replace in place when the name is already registered.
    pub fn register(&mut self, spec: CheckSpec) {
        match self.index.get(spec.name()) {
            Some(&slot) => {
                log::warn!(
                    "check '{}' registered twice; keeping the later definition",
                    spec.name()
                );
                self.checks[slot] = spec;
            }
            None => {
                self.index.insert(spec.name().to_string(), self.checks.len());
                self.checks.push(spec);
            }
        }
    }

    /// Execution plan. Each call starts again from the first check.
    pub fn list_in_order(&self) -> impl Iterator<Item = &CheckSpec> + '_ {
        self.checks.iter()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn listing(&self) -> Vec<CheckListing> {
        self.checks
            .iter()
            .map(|spec| CheckListing {
                name: spec.name().to_string(),
                points: spec.max_points(),
                description: spec.description_text().to_string(),
            })
            .collect()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.checks.iter()).finish()
    }
}

/// Registration surface handed to the harness: checks plus optional hooks.
#[derive(Default)]
pub struct Suite {
    registry: Registry,
    init: Option<Hook>,
    cleanup: Option<Hook>,
    expected_files: Vec<PathBuf>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_check(&mut self, spec: CheckSpec) -> &mut Self {
        self.registry.register(spec);
        self
    }

    pub fn register_init<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.init = Some(Box::new(hook));
        self
    }

    pub fn register_cleanup<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.cleanup = Some(Box::new(hook));
        self
    }

    /// Submission files whose absence is worth a warning before grading starts.
    pub fn expect_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.expected_files.push(path.into());
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn expected_files(&self) -> &[PathBuf] {
        &self.expected_files
    }

    pub(crate) fn into_parts(self) -> (Registry, Option<Hook>, Option<Hook>) {
        (self.registry, self.init, self.cleanup)
    }
}
