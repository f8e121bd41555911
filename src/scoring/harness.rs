use crate::config::config::HarnessConfig;
use crate::config::types::{GradeError, HookStage, Result};
use crate::core::gate::DependencyGate;
use crate::core::registry::{Hook, Suite};
use crate::exec::executor::{CheckExecutor, ExecutorConfig, IsolatedExecutor};
use crate::observability::journal::RunJournal;
use crate::scoring::report::Report;
use crate::scoring::scorer::Scorer;

/// Full grading run around a [`Suite`]: preflight warnings, init hook,
/// scored pass, report file, cleanup hook.
#[derive(Debug, Clone)]
pub struct Harness {
    config: HarnessConfig,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Non-fatal problems with the submission directory. Each one is also logged.
    pub fn preflight(&self, suite: &Suite) -> Vec<String> {
        let dir = &self.config.submission_dir;
        let mut warnings = Vec::new();

        if !dir.join(".git").is_dir() {
            warnings.push(format!("{} is not a git repository", dir.display()));
        }

        let missing: Vec<String> = suite
            .expected_files()
            .iter()
            .filter(|path| !dir.join(path).exists())
            .map(|path| path.display().to_string())
            .collect();
        if !missing.is_empty() {
            warnings.push(format!(
                "the following required files are missing: {}",
                missing.join(", ")
            ));
        }

        for warning in &warnings {
            log::warn!("{}", warning);
        }
        warnings
    }

    pub fn run(&self, suite: Suite) -> Result<Report> {
        let executor = IsolatedExecutor::new(ExecutorConfig::from(&self.config));
        self.run_with(suite, executor)
    }

    /// Run with a caller-supplied executor. The report is saved before the
    /// cleanup hook runs, so a cleanup failure still leaves it on disk. A
    /// failing init hook saves a zero-score report carrying the error.
    pub fn run_with<E: CheckExecutor>(&self, suite: Suite, executor: E) -> Result<Report> {
        self.preflight(&suite);
        let (registry, init, cleanup) = suite.into_parts();

        if let Err(err) = run_hook(HookStage::Init, init) {
            let output = self.config.resolved_output();
            if let Err(save_err) = Report::aborted(err.to_string()).save(&output) {
                log::error!("cannot record init failure: {}", save_err);
            }
            return Err(err);
        }

        let gate = DependencyGate::new(&self.config.submission_dir);
        let mut scorer = Scorer::with_executor(registry, executor).gate(gate);
        if let Some(path) = &self.config.journal_file {
            let journal = RunJournal::open(path)?;
            log::info!("journaling run {} to {}", journal.run_id(), journal.path().display());
            scorer = scorer.journal(journal);
        }
        let report = scorer.run_all()?;

        if self.config.verbose {
            eprintln!("===== Final Score =====");
            eprintln!("{}", report.to_json_pretty()?);
            eprintln!("=======================");
        }
        report.save(&self.config.resolved_output())?;

        run_hook(HookStage::Cleanup, cleanup)?;
        Ok(report)
    }
}

fn run_hook(stage: HookStage, hook: Option<Hook>) -> Result<()> {
    let Some(hook) = hook else {
        return Ok(());
    };
    log::info!("running {} hook", stage);
    hook().map_err(|e| {
        log::error!("{} hook failed: {:#}", stage, e);
        GradeError::Hook {
            stage,
            message: format!("{e:#}"),
        }
    })
}
