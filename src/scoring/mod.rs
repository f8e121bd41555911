//! Scoring
//!
//! - [`report`]: score accumulation and the persisted report
//! - [`scorer`]: sequential driver over the registry
//! - [`harness`]: hooks, preflight warnings and report persistence around a run

pub mod harness;
pub mod report;
pub mod scorer;
