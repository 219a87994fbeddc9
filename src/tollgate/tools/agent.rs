//! Sub-workflows exposed as tools
//!
//! A supervisor is an ordinary chat node whose tools happen to be whole
//! workflows. Each call runs the wrapped workflow on a fresh thread with the
//! `query` argument as the user message and returns its final reply text.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error;
use uuid::Uuid;

use crate::adk::tool::Tool;
use crate::tollgate::workflow::runner::{RunInput, RunOutcome, WorkflowRunner};

static QUERY_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let mut schema = serde_json::to_value(schemars::schema_for!(Query))
        .unwrap_or_else(|_| json!({"type": "object", "properties": {}}));
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    schema
});

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct Query {
    /// Request handed to the sub-workflow
    pub query: String,
}

/// Runs a workflow to completion as a single tool call
pub struct WorkflowTool {
    name: String,
    description: String,
    runner: WorkflowRunner,
}

impl WorkflowTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        runner: WorkflowRunner,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            runner,
        }
    }
}

#[async_trait]
impl Tool for WorkflowTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> &Value {
        &QUERY_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let Query { query } = serde_json::from_value(input)?;
        let thread_id = format!("{}-{}", self.name, Uuid::new_v4());
        log::info!("Tool {} starting sub-thread {}", self.name, thread_id);

        match self.runner.invoke(&thread_id, RunInput::message(query)?).await? {
            RunOutcome::Completed { state } => {
                let reply = state
                    .messages()?
                    .last()
                    .map(|m| m.text())
                    .unwrap_or_default();
                self.runner.evict(&thread_id).await?;
                Ok(Value::String(reply))
            }
            // The paused sub-thread stays stored so it can be answered directly
            RunOutcome::Interrupted { interrupt } => Err(format!(
                "sub-workflow {} paused at {} on thread {}",
                self.runner.workflow().name(),
                interrupt.id,
                thread_id
            )
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::Result;
    use crate::adk::model::Content;
    use crate::tollgate::config::RunnerConfig;
    use crate::tollgate::workflow::executor::StepExecutor;
    use crate::tollgate::workflow::graph::{
        FnNode, Node, NodeContext, NodeKind, NodeOutcome, WorkflowGraph,
    };
    use crate::tollgate::workflow::interrupt::InterruptRequest;
    use crate::tollgate::workflow::registry::ToolRegistry;
    use crate::tollgate::workflow::state::{StateDelta, StateSchema, StateSnapshot};
    use crate::tollgate::workflow::store::MemoryStore;
    use std::sync::Arc;

    /// Always asks before doing anything
    struct AskFirst;

    #[async_trait]
    impl Node for AskFirst {
        fn kind(&self) -> NodeKind {
            NodeKind::Interruptible
        }

        async fn run(&self, _state: &StateSnapshot, ctx: &NodeContext) -> Result<NodeOutcome> {
            match ctx.decision("confirm") {
                None => Ok(NodeOutcome::Interrupt(vec![InterruptRequest::new(
                    "confirm",
                    json!({}),
                )])),
                Some(_) => Ok(NodeOutcome::Update(StateDelta::new())),
            }
        }
    }

    fn runner(graph: WorkflowGraph) -> WorkflowRunner {
        WorkflowRunner::new(
            graph.compile().unwrap(),
            StepExecutor::without_model(ToolRegistry::new()),
            Arc::new(MemoryStore::new()),
            RunnerConfig::default(),
        )
    }

    fn planner() -> WorkflowRunner {
        runner(
            WorkflowGraph::new("planner")
                .with_schema(StateSchema::messages())
                .add_node(
                    "plan",
                    FnNode::new(|state| {
                        let asked = state
                            .last_message()?
                            .map(|m| m.text())
                            .unwrap_or_default();
                        StateDelta::new().message(&Content::model(format!("Plan for {}", asked)))
                    }),
                )
                .set_start("plan")
                .set_terminal("plan"),
        )
    }

    #[tokio::test]
    async fn test_returns_final_reply_and_drops_thread() {
        let sub = planner();
        let tool = WorkflowTool::new("plan_meal", "Plan a meal.", sub.clone());
        assert_eq!(tool.schema()["required"], json!(["query"]));

        let out = tool.execute(json!({"query": "pasta"})).await.unwrap();
        assert_eq!(out, json!("Plan for pasta"));

        let again = tool.execute(json!({"query": "tofu"})).await.unwrap();
        assert_eq!(again, json!("Plan for tofu"));
        assert!(sub.list_threads().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_paused_sub_workflow_is_an_error() {
        let sub = runner(
            WorkflowGraph::new("careful")
                .with_schema(StateSchema::messages())
                .add_node("ask", AskFirst)
                .set_start("ask")
                .set_terminal("ask"),
        );
        let tool = WorkflowTool::new("careful", "Needs a human.", sub.clone());

        let err = tool.execute(json!({"query": "go"})).await.unwrap_err();
        assert!(err.to_string().contains("paused at ask:"));
        assert_eq!(sub.list_threads().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_query_is_an_error() {
        let tool = WorkflowTool::new("plan_meal", "Plan a meal.", planner());
        assert!(tool.execute(json!({"q": "pasta"})).await.is_err());
    }
}
