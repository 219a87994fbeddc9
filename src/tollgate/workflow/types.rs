// SPDX-License-Identifier: MIT

//! YAML schema types for workflow definitions
//!
//! This module contains the data structures a workflow file deserializes
//! into. [`WorkflowBuilder`](super::builder::WorkflowBuilder) turns them into
//! a compiled [`Workflow`](super::graph::Workflow).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::adk::model::GenerationConfig;
use crate::tollgate::config::RunnerConfig;
use crate::tollgate::workflow::nodes::ApprovalPolicy;
use crate::tollgate::workflow::state::StateSchema;

/// Top-level workflow definition
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// State schema; fields not listed here overwrite. Defaults to an
    /// appending `messages` field.
    #[serde(default = "StateSchema::messages")]
    pub state: StateSchema,
    /// Node the first invocation of a thread runs
    pub start: String,
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
    /// Nodes that end the thread when they have no outgoing edge
    #[serde(default)]
    pub terminal: Vec<String>,
    /// Runner settings; environment variables override them
    #[serde(default)]
    pub runtime: RunnerConfig,
}

/// A node in the workflow
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NodeDefinition {
    /// Unique node identifier
    pub id: String,
    #[serde(flatten)]
    pub spec: NodeSpec,
}

/// Built-in node kinds
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeSpec {
    /// Calls the model with the conversation
    Chat {
        #[serde(default)]
        instructions: String,
        /// Tools the model may propose calls to
        #[serde(default)]
        tools: Vec<String>,
        /// Only send the last N messages
        #[serde(default)]
        keep_last: Option<usize>,
        #[serde(default)]
        generation: Option<GenerationConfig>,
        /// State field that also receives the reply text
        #[serde(default)]
        output_field: Option<String>,
    },
    /// Executes proposed tool calls, pausing on gated tools
    Tools {
        #[serde(default)]
        approval: HashMap<String, ApprovalPolicy>,
    },
    /// Asks a human to confirm or correct state fields
    Review {
        question: String,
        fields: Vec<String>,
        #[serde(default)]
        response_field: Option<String>,
    },
    /// Folds older messages into a running summary
    Summarize {
        max_messages: usize,
        #[serde(default = "default_keep_last")]
        keep_last: usize,
        #[serde(default)]
        instructions: Option<String>,
    },
}

fn default_keep_last() -> usize {
    2
}

impl NodeSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeSpec::Chat { .. } => "chat",
            NodeSpec::Tools { .. } => "tools",
            NodeSpec::Review { .. } => "review",
            NodeSpec::Summarize { .. } => "summarize",
        }
    }
}

/// Outgoing edge of a node
///
/// Three shapes are accepted:
/// - `{from, to}` always continues to `to`
/// - `{from, route: tools_condition, tools?}` goes to the tool node when the
///   last message proposes tool calls, otherwise ends the thread
/// - `{from, routes: [{when, to}], default}` picks the first branch whose
///   condition holds
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum EdgeDefinition {
    Routed {
        from: String,
        routes: Vec<RouteDefinition>,
        default: String,
    },
    Builtin {
        from: String,
        route: BuiltinRoute,
        #[serde(default)]
        tools: Option<String>,
    },
    Direct {
        from: String,
        to: String,
    },
}

impl EdgeDefinition {
    pub fn from(&self) -> &str {
        match self {
            EdgeDefinition::Routed { from, .. }
            | EdgeDefinition::Builtin { from, .. }
            | EdgeDefinition::Direct { from, .. } => from,
        }
    }
}

/// One `when` branch of a routed edge
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RouteDefinition {
    pub when: String,
    pub to: String,
}

/// Routers provided by the engine
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinRoute {
    ToolsCondition,
}
