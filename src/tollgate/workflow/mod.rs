// SPDX-License-Identifier: MIT

//! Interruptible workflow engine
//!
//! A [`Workflow`](graph::Workflow) is a compiled graph of nodes. The
//! [`WorkflowRunner`](runner::WorkflowRunner) drives threads through it one
//! step at a time, persisting every step through a
//! [`ThreadStore`](store::ThreadStore) so a paused thread can be resumed by
//! a later call or a later process.

pub mod builder;
pub mod condition;
pub mod executor;
pub mod graph;
pub mod interrupt;
pub mod loader;
pub mod node_factory;
pub mod nodes;
pub mod registry;
pub mod runner;
pub mod state;
pub mod store;
pub mod types;
