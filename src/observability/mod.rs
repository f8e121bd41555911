//! Observability
//!
//! Structured run journal for post-mortem inspection of a grading run.

pub mod journal;
