// SPDX-License-Identifier: MIT

//! Workflow graphs
//!
//! This module provides:
//! - `Node` / `NodeKind` / `NodeOutcome` - units of work and what they return
//! - `Edge` and the routers behind conditional edges
//! - `WorkflowGraph` - builder that validates into an immutable `Workflow`

mod edge;
mod node;
mod workflow;

pub use edge::{identity_routes, ConditionRouter, Edge, FnRouter, Router, ToolsCondition, END};
pub use node::{FnNode, Node, NodeContext, NodeKind, NodeOutcome};
pub use workflow::{Workflow, WorkflowGraph};
