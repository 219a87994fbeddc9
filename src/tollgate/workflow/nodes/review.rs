// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::adk::error::Result;
use crate::tollgate::workflow::graph::{Node, NodeContext, NodeKind, NodeOutcome};
use crate::tollgate::workflow::interrupt::{InterruptRequest, ResumeDecision};
use crate::tollgate::workflow::state::{StateDelta, StateSnapshot};

const REVIEW_KEY: &str = "review";

/// Pauses so a human can confirm or correct selected state fields.
///
/// - `Accept` keeps the current values
/// - `Edit` overwrites the listed fields present in the edited object
/// - `Respond` stores the answer in the response field
/// - `Reject` ends the thread when asked to, otherwise moves on unchanged
#[derive(Debug, Clone)]
pub struct ReviewNode {
    question: String,
    fields: Vec<String>,
    response_field: String,
}

impl ReviewNode {
    pub fn new(question: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            question: question.into(),
            fields,
            response_field: "response".to_string(),
        }
    }

    pub fn with_response_field(mut self, field: impl Into<String>) -> Self {
        self.response_field = field.into();
        self
    }
}

#[async_trait]
impl Node for ReviewNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Interruptible
    }

    async fn run(&self, state: &StateSnapshot, ctx: &NodeContext) -> Result<NodeOutcome> {
        let Some(decision) = ctx.decision(REVIEW_KEY) else {
            let current: Map<String, Value> = self
                .fields
                .iter()
                .map(|f| (f.clone(), state.get(f).cloned().unwrap_or(Value::Null)))
                .collect();
            return Ok(NodeOutcome::Interrupt(vec![InterruptRequest::new(
                REVIEW_KEY,
                json!({"question": self.question, "fields": current}),
            )]));
        };

        let outcome = match decision {
            ResumeDecision::Accept => NodeOutcome::Update(StateDelta::new()),
            ResumeDecision::Edit { payload } => {
                let mut delta = StateDelta::new();
                for field in &self.fields {
                    if let Some(value) = payload.get(field) {
                        delta.push(field.clone(), value.clone());
                    }
                }
                if delta.is_empty() {
                    log::warn!(
                        "Node {} received an edit that touches none of {:?}",
                        ctx.node,
                        self.fields
                    );
                }
                NodeOutcome::Update(delta)
            }
            ResumeDecision::Respond { value } => NodeOutcome::Update(
                StateDelta::new().set(self.response_field.clone(), value.clone()),
            ),
            ResumeDecision::Reject { terminate: true } => NodeOutcome::Halt(StateDelta::new()),
            ResumeDecision::Reject { terminate: false } => NodeOutcome::Update(StateDelta::new()),
        };
        Ok(outcome)
    }
}
