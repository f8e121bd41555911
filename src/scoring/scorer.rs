use crate::config::types::{GradedResult, Result, Verdict};
use crate::core::check::CheckSpec;
use crate::core::gate::DependencyGate;
use crate::core::registry::Registry;
use crate::exec::executor::{CheckExecutor, IsolatedExecutor};
use crate::observability::journal::{millis, RunEvent, RunJournal};
use crate::scoring::report::{Report, ReportBuilder};

/// Sequential driver: registry order, gate, executor, report.
pub struct Scorer<E: CheckExecutor = IsolatedExecutor> {
    registry: Registry,
    executor: E,
    gate: DependencyGate,
    journal: Option<RunJournal>,
}

impl Scorer<IsolatedExecutor> {
    pub fn new(registry: Registry) -> Self {
        Self::with_executor(registry, IsolatedExecutor::default())
    }
}

impl<E: CheckExecutor> Scorer<E> {
    pub fn with_executor(registry: Registry, executor: E) -> Self {
        Self {
            registry,
            executor,
            gate: DependencyGate::default(),
            journal: None,
        }
    }

    pub fn gate(mut self, gate: DependencyGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn journal(mut self, journal: RunJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run every registered check once. Each call starts from an empty
    /// report and passed set.
    pub fn run_all(&self) -> Result<Report> {
        let mut builder = ReportBuilder::new();
        self.emit(RunEvent::RunStarted {
            checks: self.registry.len(),
        });

        for spec in self.registry.list_in_order() {
            let admission = self.gate.admit(spec, builder.passed());
            let result = match admission.skipped_result(spec) {
                Some(skipped) => {
                    log::info!("{}: {}", spec.name(), skipped.render());
                    self.emit(RunEvent::CheckSkipped {
                        name: spec.name().to_string(),
                        verdict: skipped.verdict,
                        reason: skipped.message.clone().unwrap_or_default(),
                    });
                    skipped
                }
                None => self.execute(spec),
            };
            builder.record(spec, result)?;
        }

        let report = builder.finish()?;
        self.emit(RunEvent::RunFinished {
            score: report.score(),
            full_score: report.full_score(),
        });
        log::info!("score: {}/{}", report.score(), report.full_score());
        Ok(report)
    }

    fn execute(&self, spec: &CheckSpec) -> GradedResult {
        log::info!("running {}", spec.name());
        self.emit(RunEvent::CheckStarted {
            name: spec.name().to_string(),
            timeout_ms: spec.timeout_limit().map(millis),
        });

        let result = self.executor.run(spec);

        if result.verdict == Verdict::Timeout {
            self.emit(RunEvent::CheckTimedOut {
                name: spec.name().to_string(),
                limit_ms: spec.timeout_limit().map(millis).unwrap_or_default(),
                elapsed_ms: millis(result.elapsed),
            });
        }
        self.emit(RunEvent::finished(spec.name(), &result));
        log::info!(
            "{}: {} in {:.2}s",
            spec.name(),
            result.render(),
            result.elapsed.as_secs_f64()
        );
        result
    }

    fn emit(&self, event: RunEvent) {
        if let Some(journal) = &self.journal {
            journal.record(event);
        }
    }
}
