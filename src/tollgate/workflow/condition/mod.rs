// SPDX-License-Identifier: MIT

//! Condition language for conditional edges
//!
//! Routes declared in a workflow definition carry `when` expressions that are
//! evaluated against the thread's current state:
//! - `decision == 'joke'`
//! - `confidence > 0.8`
//! - `intent == 'bug' and not (assigned or priority < 3)`
//! - `approved` (bare path, tested for truthiness)

mod ast;
mod evaluator;
mod parser;

pub use ast::{CompareOp, Expression, Literal};
pub use evaluator::evaluate;
pub use parser::parse;
