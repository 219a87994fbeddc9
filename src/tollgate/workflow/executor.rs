use std::sync::Arc;

use crate::adk::error::{Result, TollgateError};
use crate::adk::model::Model;
use crate::tollgate::workflow::graph::{Node, NodeContext, NodeKind, NodeOutcome};
use crate::tollgate::workflow::interrupt::ResolvedInterrupt;
use crate::tollgate::workflow::registry::ToolRegistry;
use crate::tollgate::workflow::state::StateSnapshot;

/// Runs one node against the current snapshot.
///
/// The model and tool registry are injected here and handed to every node
/// through its [`NodeContext`].
#[derive(Clone)]
pub struct StepExecutor {
    model: Option<Arc<dyn Model>>,
    tools: ToolRegistry,
}

impl StepExecutor {
    pub fn new(model: Arc<dyn Model>, tools: ToolRegistry) -> Self {
        Self {
            model: Some(model),
            tools,
        }
    }

    /// Executor for workflows whose nodes never call a model
    pub fn without_model(tools: ToolRegistry) -> Self {
        Self { model: None, tools }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run `node` once. Node errors propagate unchanged; nothing here touches
    /// stored state.
    pub async fn execute(
        &self,
        thread_id: &str,
        name: &str,
        node: &dyn Node,
        state: &StateSnapshot,
        resolved: Vec<ResolvedInterrupt>,
    ) -> Result<NodeOutcome> {
        log::info!("Executing node: {}", name);
        let ctx = NodeContext::new(
            thread_id,
            name,
            self.model.clone(),
            self.tools.clone(),
            resolved,
        );
        let outcome = node.run(state, &ctx).await?;

        match &outcome {
            NodeOutcome::Interrupt(_) if node.kind() == NodeKind::Pure => Err(
                TollgateError::malformed(format!("pure node '{}' requested a pause", name)),
            ),
            NodeOutcome::Interrupt(requests) if requests.is_empty() => Err(TollgateError::node(
                name,
                "interrupt raised without any request",
            )),
            _ => Ok(outcome),
        }
    }
}
