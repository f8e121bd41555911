//! Check model and registration.
//!
//! Core owns what a check is, the ordered registry of checks, and the
//! admission gate consulted before a body may run. Execution lives in
//! [`crate::exec`].

pub mod check;
pub mod gate;
pub mod registry;
