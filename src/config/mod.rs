//! Configuration and shared types
//!
//! Harness settings plus the closed enums and error type used across the crate.

pub mod config;
pub mod types;
