// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::adk::error::Result;
use crate::adk::model::{Content, Part, ToolCall};
use crate::adk::tool::Tool;
use crate::tollgate::workflow::graph::{Node, NodeContext, NodeKind, NodeOutcome};
use crate::tollgate::workflow::interrupt::{InterruptRequest, ResumeDecision};
use crate::tollgate::workflow::state::{StateDelta, StateSnapshot};

/// Approval gate declared for one tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    #[serde(default)]
    pub require_approval: bool,
    /// Shown to the reviewer; defaults to the tool's own description
    #[serde(default)]
    pub description: Option<String>,
}

impl ApprovalPolicy {
    pub fn required() -> Self {
        Self {
            require_approval: true,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Executes the tool calls proposed by the last assistant message.
///
/// Calls to gated tools pause the thread before any call runs, so an
/// approved call executes exactly once, after the decision arrives.
#[derive(Debug, Clone, Default)]
pub struct ToolNode {
    policies: HashMap<String, ApprovalPolicy>,
}

impl ToolNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, tool: impl Into<String>, policy: ApprovalPolicy) -> Self {
        self.policies.insert(tool.into(), policy);
        self
    }

    fn gated(&self, tool: &str) -> bool {
        self.policies
            .get(tool)
            .map(|p| p.require_approval)
            .unwrap_or(false)
    }
}

/// One call after its decision has been applied
enum Planned {
    Run {
        tool: Arc<dyn Tool>,
        name: String,
        args: Value,
    },
    Answer {
        name: String,
        response: Value,
    },
}

/// Stable key for the `index`th call of a message
fn call_key(call: &ToolCall, index: usize) -> String {
    call.id
        .clone()
        .unwrap_or_else(|| format!("{}#{}", call.name, index))
}

/// Tool name and arguments after an edit.
///
/// Accepts `{"action": .., "args": ..}`, `{"args": ..}` or a bare arguments
/// object.
fn edited_call(call: &ToolCall, payload: &Value) -> (String, Value) {
    match payload.get("args") {
        Some(args) => {
            let name = payload
                .get("action")
                .and_then(Value::as_str)
                .unwrap_or(&call.name);
            (name.to_string(), args.clone())
        }
        None => (call.name.clone(), payload.clone()),
    }
}

#[async_trait]
impl Node for ToolNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Interruptible
    }

    async fn run(&self, state: &StateSnapshot, ctx: &NodeContext) -> Result<NodeOutcome> {
        let calls = state
            .last_message()?
            .map(|m| m.tool_calls())
            .unwrap_or_default();
        if calls.is_empty() {
            log::warn!("Node {} found no tool calls to run", ctx.node);
            return Ok(NodeOutcome::Update(StateDelta::new()));
        }

        let mut tools = HashMap::new();
        for call in &calls {
            tools.insert(call.name.clone(), ctx.tools().require(&call.name).await?);
        }

        let mut requests = Vec::new();
        for (i, call) in calls.iter().enumerate() {
            let key = call_key(call, i);
            if self.gated(&call.name) && ctx.decision(&key).is_none() {
                let description = self
                    .policies
                    .get(&call.name)
                    .and_then(|p| p.description.clone())
                    .unwrap_or_else(|| tools[&call.name].description().to_string());
                requests.push(InterruptRequest::new(
                    key,
                    json!({
                        "action": call.name,
                        "args": call.args,
                        "description": description,
                    }),
                ));
            }
        }
        if !requests.is_empty() {
            return Ok(NodeOutcome::Interrupt(requests));
        }

        // Every decision is applied and every tool resolved before any call runs
        let mut plan = Vec::with_capacity(calls.len());
        let mut terminate = false;
        for (i, call) in calls.iter().enumerate() {
            let decision = if self.gated(&call.name) {
                ctx.decision(&call_key(call, i)).cloned()
            } else {
                None
            };

            let planned = match decision {
                None | Some(ResumeDecision::Accept) => Planned::Run {
                    tool: tools[&call.name].clone(),
                    name: call.name.clone(),
                    args: call.args.clone(),
                },
                Some(ResumeDecision::Edit { payload }) => {
                    let (name, args) = edited_call(call, &payload);
                    let tool = match tools.get(&name) {
                        Some(tool) => tool.clone(),
                        None => ctx.tools().require(&name).await?,
                    };
                    Planned::Run { tool, name, args }
                }
                Some(ResumeDecision::Respond { value }) => Planned::Answer {
                    name: call.name.clone(),
                    response: value,
                },
                Some(ResumeDecision::Reject { terminate: stop }) => {
                    log::info!("Tool call {} rejected", call.name);
                    terminate |= stop;
                    Planned::Answer {
                        name: call.name.clone(),
                        response: json!({
                            "error": format!("Tool call '{}' was rejected by the reviewer", call.name)
                        }),
                    }
                }
            };
            plan.push((call.id.clone(), planned));
        }

        let mut parts = Vec::with_capacity(plan.len());
        for (id, planned) in plan {
            let (name, response) = match planned {
                Planned::Run { tool, name, args } => {
                    log::info!("Tool call: {} {}", name, args);
                    let response = match tool.execute(args).await {
                        Ok(result) => result,
                        Err(e) => {
                            log::error!("Tool {} failed: {}", name, e);
                            json!({ "error": e.to_string() })
                        }
                    };
                    (name, response)
                }
                Planned::Answer { name, response } => (name, response),
            };
            parts.push(Part::FunctionResponse { id, name, response });
        }

        let delta = StateDelta::new().message(&Content::new("tool", parts))?;
        Ok(if terminate {
            NodeOutcome::Halt(delta)
        } else {
            NodeOutcome::Update(delta)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::TollgateError;
    use crate::tollgate::workflow::interrupt::{InterruptRecord, ResolvedInterrupt};
    use crate::tollgate::workflow::registry::ToolRegistry;
    use crate::tollgate::workflow::state::StateSchema;
    use chrono::Utc;
    use once_cell::sync::Lazy;
    use std::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    static ADD_SCHEMA: Lazy<Value> = Lazy::new(|| {
        json!({
            "type": "object",
            "properties": {"a": {"type": "number"}, "b": {"type": "number"}}
        })
    });

    /// Adds `a` and `b`, counting its executions
    struct MockTool {
        name: &'static str,
        calls: AtomicUsize,
    }

    impl MockTool {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "Adds two numbers"
        }

        fn schema(&self) -> &Value {
            &ADD_SCHEMA
        }

        async fn execute(
            &self,
            input: Value,
        ) -> std::result::Result<Value, Box<dyn Error + Send + Sync>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match (input["a"].as_f64(), input["b"].as_f64()) {
                (Some(a), Some(b)) => Ok(json!(a + b)),
                _ => Err("a and b must be numbers".into()),
            }
        }
    }

    fn proposal(calls: &[(&str, &str, Value)]) -> StateSnapshot {
        let parts = calls
            .iter()
            .map(|(id, name, args)| Part::FunctionCall {
                id: Some(id.to_string()),
                name: name.to_string(),
                args: args.clone(),
            })
            .collect();
        let schema = StateSchema::messages();
        let mut state = StateSnapshot::new(&schema);
        let delta = StateDelta::new()
            .message(&Content::user("add 2 and 3"))
            .unwrap()
            .message(&Content::new("model", parts))
            .unwrap();
        state.apply(&delta, &schema).unwrap();
        state
    }

    fn decided(key: &str, decision: ResumeDecision) -> ResolvedInterrupt {
        ResolvedInterrupt {
            record: InterruptRecord {
                id: format!("tools:1:{}", key),
                node: "tools".into(),
                key: key.into(),
                payload: json!({}),
                created_at: Utc::now(),
            },
            decision,
        }
    }

    async fn registry(tools: &[Arc<MockTool>]) -> ToolRegistry {
        let registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool.clone()).await;
        }
        registry
    }

    fn results(outcome: &NodeOutcome) -> Vec<Value> {
        let delta = match outcome {
            NodeOutcome::Update(d) | NodeOutcome::Halt(d) => d,
            NodeOutcome::Interrupt(_) => panic!("Expected a delta"),
        };
        let schema = StateSchema::messages();
        let mut state = StateSnapshot::new(&schema);
        state.apply(delta, &schema).unwrap();
        state
            .last_message()
            .unwrap()
            .unwrap()
            .parts
            .into_iter()
            .filter_map(|p| match p {
                Part::FunctionResponse { response, .. } => Some(response),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_ungated_calls_run_immediately() {
        let add = MockTool::new("add");
        let ctx = NodeContext::new("t1", "tools", None, registry(&[add.clone()]).await, vec![]);
        let state = proposal(&[("c1", "add", json!({"a": 2, "b": 3}))]);

        let outcome = ToolNode::new().run(&state, &ctx).await.unwrap();
        assert_eq!(results(&outcome), vec![json!(5.0)]);
        assert_eq!(add.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gated_calls_pause_before_any_execution() {
        let add = MockTool::new("add");
        let free = MockTool::new("free");
        let ctx = NodeContext::new(
            "t1",
            "tools",
            None,
            registry(&[add.clone(), free.clone()]).await,
            vec![],
        );
        let state = proposal(&[
            ("c1", "free", json!({"a": 1, "b": 1})),
            ("c2", "add", json!({"a": 2, "b": 3})),
        ]);
        let node = ToolNode::new()
            .with_policy("add", ApprovalPolicy::required().with_description("Check the sum"));

        match node.run(&state, &ctx).await.unwrap() {
            NodeOutcome::Interrupt(requests) => {
                assert_eq!(requests.len(), 1);
                assert_eq!(requests[0].key, "c2");
                assert_eq!(
                    requests[0].payload,
                    json!({"action": "add", "args": {"a": 2, "b": 3}, "description": "Check the sum"})
                );
            }
            other => panic!("Expected Interrupt, got {:?}", other),
        }
        assert_eq!(add.calls.load(Ordering::SeqCst), 0);
        assert_eq!(free.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_decisions_shape_execution() {
        let add = MockTool::new("add");
        let node = ToolNode::new().with_policy("add", ApprovalPolicy::required());
        let state = proposal(&[
            ("accept", "add", json!({"a": 2, "b": 3})),
            ("edit", "add", json!({"a": 2, "b": 3})),
            ("respond", "add", json!({"a": 2, "b": 3})),
            ("reject", "add", json!({"a": 2, "b": 3})),
        ]);
        let ctx = NodeContext::new(
            "t1",
            "tools",
            None,
            registry(&[add.clone()]).await,
            vec![
                decided("accept", ResumeDecision::Accept),
                decided("edit", ResumeDecision::edit(json!({"args": {"a": 10, "b": 3}}))),
                decided("respond", ResumeDecision::respond(json!("skip it"))),
                decided("reject", ResumeDecision::reject(false)),
            ],
        );

        let outcome = node.run(&state, &ctx).await.unwrap();
        assert!(matches!(outcome, NodeOutcome::Update(_)));
        let results = results(&outcome);
        assert_eq!(results[0], json!(5.0));
        assert_eq!(results[1], json!(13.0));
        assert_eq!(results[2], json!("skip it"));
        assert!(results[3]["error"].as_str().unwrap().contains("rejected"));
        assert_eq!(add.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reject_with_terminate_halts() {
        let add = MockTool::new("add");
        let node = ToolNode::new().with_policy("add", ApprovalPolicy::required());
        let state = proposal(&[("c1", "add", json!({"a": 2, "b": 3}))]);
        let ctx = NodeContext::new(
            "t1",
            "tools",
            None,
            registry(&[add.clone()]).await,
            vec![decided("c1", ResumeDecision::reject(true))],
        );

        let outcome = node.run(&state, &ctx).await.unwrap();
        assert!(matches!(outcome, NodeOutcome::Halt(_)));
        assert_eq!(add.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_edit_to_unknown_tool_runs_nothing() {
        let add = MockTool::new("add");
        let node = ToolNode::new().with_policy("add", ApprovalPolicy::required());
        let state = proposal(&[
            ("c1", "add", json!({"a": 1, "b": 1})),
            ("c2", "add", json!({"a": 1, "b": 1})),
        ]);
        let ctx = NodeContext::new(
            "t1",
            "tools",
            None,
            registry(&[add.clone()]).await,
            vec![
                decided("c1", ResumeDecision::Accept),
                decided("c2", ResumeDecision::edit(json!({"action": "nope", "args": {}}))),
            ],
        );

        let err = node.run(&state, &ctx).await.unwrap_err();
        assert!(matches!(err, TollgateError::UnknownTool { ref name } if name == "nope"));
        // the accepted call before it never ran either
        assert_eq!(add.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_before_running_anything() {
        let add = MockTool::new("add");
        let ctx = NodeContext::new("t1", "tools", None, registry(&[add.clone()]).await, vec![]);
        let state = proposal(&[
            ("c1", "add", json!({"a": 2, "b": 3})),
            ("c2", "rm_rf", json!({})),
        ]);

        let err = ToolNode::new().run(&state, &ctx).await.unwrap_err();
        assert!(matches!(err, TollgateError::UnknownTool { ref name } if name == "rm_rf"));
        assert_eq!(add.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_tool_errors_become_results() {
        let add = MockTool::new("add");
        let ctx = NodeContext::new("t1", "tools", None, registry(&[add.clone()]).await, vec![]);
        let state = proposal(&[("c1", "add", json!({"a": "two"}))]);

        let outcome = ToolNode::new().run(&state, &ctx).await.unwrap();
        assert_eq!(
            results(&outcome),
            vec![json!({"error": "a and b must be numbers"})]
        );
    }

    #[test]
    fn test_edit_payload_shapes() {
        let call = ToolCall {
            id: None,
            name: "add".into(),
            args: json!({"a": 1, "b": 1}),
        };
        assert_eq!(
            edited_call(&call, &json!({"args": {"a": 5}})),
            ("add".to_string(), json!({"a": 5}))
        );
        assert_eq!(
            edited_call(&call, &json!({"action": "multiply", "args": {"a": 5}})),
            ("multiply".to_string(), json!({"a": 5}))
        );
        assert_eq!(
            edited_call(&call, &json!({"a": 7, "b": 0})),
            ("add".to_string(), json!({"a": 7, "b": 0}))
        );
    }
}
