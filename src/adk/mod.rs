//! Agent development kit - the collaborators the workflow engine talks to
//!
//! - [model] - the LLM trait, message types and provider adapters
//! - [tool] - the tool trait and closure-backed tools
//! - [error] - the crate-wide error type

pub mod error;
pub mod model;
pub mod tool;
