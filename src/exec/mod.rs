//! Isolated execution of check bodies
//!
//! - [`channel`]: one-shot child to parent result channel
//! - [`process`]: reaping and process-group termination
//! - [`executor`]: fork-per-check executor

pub mod channel;
pub mod executor;
pub mod process;
