//! Evidence-backed verdict classification
//!
//! Derives graded results as pure functions over what the executor observed.

pub mod verdict;
