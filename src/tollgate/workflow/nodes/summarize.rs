// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::json;

use super::chat::conversation_window;
use crate::adk::error::{ModelError, Result, TollgateError};
use crate::adk::model::Content;
use crate::tollgate::workflow::graph::{Node, NodeContext, NodeOutcome};
use crate::tollgate::workflow::state::{StateDelta, StateSnapshot};

/// Running summary of the messages before `summarized_through`
pub const SUMMARY: &str = "summary";
/// Number of leading messages already folded into `summary`
pub const SUMMARIZED_THROUGH: &str = "summarized_through";

/// Folds older messages into `summary` once the unsummarized tail grows past
/// `max_messages`, keeping the last `keep_last` messages verbatim
#[derive(Debug, Clone)]
pub struct SummarizeNode {
    max_messages: usize,
    keep_last: usize,
    instructions: Option<String>,
}

impl SummarizeNode {
    pub fn new(max_messages: usize, keep_last: usize) -> Self {
        Self {
            max_messages,
            keep_last: keep_last.min(max_messages),
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

#[async_trait]
impl Node for SummarizeNode {
    async fn run(&self, state: &StateSnapshot, ctx: &NodeContext) -> Result<NodeOutcome> {
        let total = state.message_count();
        let through = state
            .get(SUMMARIZED_THROUGH)
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;
        if total.saturating_sub(through) <= self.max_messages {
            return Ok(NodeOutcome::Update(StateDelta::new()));
        }

        let cut = total - self.keep_last;
        let older: Vec<Content> = state
            .messages()?
            .into_iter()
            .take(cut)
            .collect();
        let older = conversation_window(older, through, None);

        let existing = state.get(SUMMARY).and_then(|v| v.as_str()).unwrap_or("");
        let ask = if existing.is_empty() {
            "Create a summary of the conversation above.".to_string()
        } else {
            format!(
                "This is the summary of the conversation so far: {}\n\nExtend the summary by taking into account the new messages above.",
                existing
            )
        };

        let mut prompt = Vec::new();
        if let Some(instructions) = &self.instructions {
            prompt.push(Content::system(instructions.clone()));
        }
        prompt.extend(older);
        prompt.push(Content::user(ask));

        log::info!(
            "Node {} summarizing messages {}..{}",
            ctx.node,
            through,
            cut
        );
        let response = ctx
            .model()?
            .generate_content(&prompt, None, None)
            .await
            .map_err(|e| TollgateError::Model(ModelError::from(e)))?;

        Ok(NodeOutcome::Update(
            StateDelta::new()
                .set(SUMMARY, json!(response.text()))
                .set(SUMMARIZED_THROUGH, json!(cut)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::{GenerationConfig, Model};
    use crate::adk::tool::Tool;
    use crate::tollgate::workflow::registry::ToolRegistry;
    use crate::tollgate::workflow::state::StateSchema;
    use std::error::Error;
    use std::sync::{Arc, Mutex};

    struct MockModel {
        prompts: Mutex<Vec<Vec<Content>>>,
    }

    #[async_trait]
    impl Model for MockModel {
        async fn generate_content(
            &self,
            history: &[Content],
            _config: Option<&GenerationConfig>,
            _tools: Option<&[Arc<dyn Tool>]>,
        ) -> std::result::Result<Content, Box<dyn Error + Send + Sync>> {
            self.prompts.lock().unwrap().push(history.to_vec());
            Ok(Content::model("they said hi a lot"))
        }
    }

    fn conversation(n: usize) -> StateSnapshot {
        let schema = StateSchema::messages();
        let mut state = StateSnapshot::new(&schema);
        let mut delta = StateDelta::new();
        for i in 0..n {
            delta = delta.message(&Content::user(format!("hi {}", i))).unwrap();
        }
        state.apply(&delta, &schema).unwrap();
        state
    }

    fn ctx(model: Arc<MockModel>) -> NodeContext {
        NodeContext::new("t1", "summarize", Some(model), ToolRegistry::new(), vec![])
    }

    #[tokio::test]
    async fn test_short_history_is_left_alone() {
        let model = Arc::new(MockModel {
            prompts: Mutex::new(Vec::new()),
        });
        let node = SummarizeNode::new(6, 2);

        let outcome = node.run(&conversation(6), &ctx(model.clone())).await.unwrap();
        assert_eq!(outcome, NodeOutcome::Update(StateDelta::new()));
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_long_history_is_summarized() {
        let model = Arc::new(MockModel {
            prompts: Mutex::new(Vec::new()),
        });
        let node = SummarizeNode::new(6, 2);

        let outcome = node.run(&conversation(8), &ctx(model.clone())).await.unwrap();
        let NodeOutcome::Update(delta) = outcome else {
            panic!("Expected Update");
        };
        assert_eq!(
            delta.to_json(),
            json!({"summary": "they said hi a lot", "summarized_through": 6})
        );

        let prompts = model.prompts.lock().unwrap();
        // six older messages plus the request
        assert_eq!(prompts[0].len(), 7);
        assert!(prompts[0][6].text().starts_with("Create a summary"));
    }
}
