//! gradebox: an isolated test execution engine for grading harnesses
//!
//! Runs a suite of named, point-weighted checks against a submission. Every
//! check body runs in its own forked process group under a wall-clock
//! timeout, so a check that hangs, panics or kills itself still produces
//! exactly one graded line in the final report.
//!
//! # Architecture
//!
//! ## Registration ([`core`])
//! - [`core::check`]: `CheckSpec` builder and the tagged `Outcome`
//! - [`core::registry`]: insertion-ordered `Registry` and the `Suite` surface
//! - [`core::gate`]: dependency / required-file admission
//!
//! ## Isolated Execution ([`exec`])
//! - [`exec::channel`]: one-shot child to parent result channel
//! - [`exec::process`]: reaping and SIGTERM -> SIGKILL group termination
//! - [`exec::executor`]: fork-per-check `IsolatedExecutor`
//!
//! ## Verdicts ([`verdict`])
//! - [`verdict::verdict`]: pure classification of execution evidence
//!
//! ## Scoring ([`scoring`])
//! - [`scoring::scorer`]: sequential driver over the registry
//! - [`scoring::report`]: score accounting and the JSON report
//! - [`scoring::harness`]: init/cleanup hooks, preflight warnings, persistence
//!
//! ## Observability ([`observability`])
//! - [`observability::journal`]: JSON-lines run journal
//!
//! ## Configuration ([`config`])
//! - [`config::config`]: `HarnessConfig` loading and validation
//! - [`config::types`]: verdicts, graded results, error type

// Registration
pub mod core;

// Isolated Execution
pub mod exec;

// Verdicts
pub mod verdict;

// Scoring
pub mod scoring;

// Observability
pub mod observability;

// Configuration
pub mod config;

// CLI entrypoint shared by grading binaries.
pub mod cli;

pub use config::config::HarnessConfig;
pub use config::types::*;
pub use core::check::{CheckSpec, Outcome};
pub use core::gate::{Admission, DependencyGate};
pub use core::registry::{Registry, Suite};
pub use exec::executor::{CheckExecutor, ExecutorConfig, IsolatedExecutor};
pub use scoring::harness::Harness;
pub use scoring::report::Report;
pub use scoring::scorer::Scorer;
