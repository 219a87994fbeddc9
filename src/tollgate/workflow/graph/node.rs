use async_trait::async_trait;
use std::sync::Arc;

use crate::adk::error::{Result, TollgateError};
use crate::adk::model::Model;
use crate::tollgate::workflow::interrupt::{InterruptRequest, ResolvedInterrupt, ResumeDecision};
use crate::tollgate::workflow::registry::ToolRegistry;
use crate::tollgate::workflow::state::{StateDelta, StateSnapshot};

/// The two shapes of node the engine knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// state -> delta
    Pure,
    /// state -> delta, or a pause request
    Interruptible,
}

/// What one node execution produced
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    /// Merge the delta and follow the node's outgoing edge
    Update(StateDelta),
    /// Merge the delta and end the thread
    Halt(StateDelta),
    /// Pause for one decision per request, in order
    Interrupt(Vec<InterruptRequest>),
}

/// Collaborators and resume decisions available to a running node
pub struct NodeContext {
    pub thread_id: String,
    pub node: String,
    model: Option<Arc<dyn Model>>,
    tools: ToolRegistry,
    resolved: Vec<ResolvedInterrupt>,
}

impl NodeContext {
    pub fn new(
        thread_id: impl Into<String>,
        node: impl Into<String>,
        model: Option<Arc<dyn Model>>,
        tools: ToolRegistry,
        resolved: Vec<ResolvedInterrupt>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            node: node.into(),
            model,
            tools,
            resolved,
        }
    }

    /// The injected model; nodes that need one fail without it
    pub fn model(&self) -> Result<&Arc<dyn Model>> {
        self.model
            .as_ref()
            .ok_or_else(|| TollgateError::node(&self.node, "no model configured"))
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Decision for the request this node raised under `key`
    pub fn decision(&self, key: &str) -> Option<&ResumeDecision> {
        self.resolved
            .iter()
            .find(|r| r.record.key == key)
            .map(|r| &r.decision)
    }

    /// Whether this execution re-enters the node after a pause
    pub fn is_resuming(&self) -> bool {
        !self.resolved.is_empty()
    }
}

/// A named unit of work. Nodes are immutable once added to a workflow.
#[async_trait]
pub trait Node: Send + Sync {
    fn kind(&self) -> NodeKind {
        NodeKind::Pure
    }

    async fn run(&self, state: &StateSnapshot, ctx: &NodeContext) -> Result<NodeOutcome>;
}

type NodeFn = dyn Fn(&StateSnapshot) -> Result<StateDelta> + Send + Sync;

/// A pure node backed by a closure
pub struct FnNode {
    func: Box<NodeFn>,
}

impl FnNode {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&StateSnapshot) -> Result<StateDelta> + Send + Sync + 'static,
    {
        Self {
            func: Box::new(func),
        }
    }
}

#[async_trait]
impl Node for FnNode {
    async fn run(&self, state: &StateSnapshot, _ctx: &NodeContext) -> Result<NodeOutcome> {
        (self.func)(state).map(NodeOutcome::Update)
    }
}
