// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;

use super::summarize::{SUMMARIZED_THROUGH, SUMMARY};
use crate::adk::error::{ModelError, Result, TollgateError};
use crate::adk::model::{Content, GenerationConfig};
use crate::tollgate::workflow::graph::{Node, NodeContext, NodeOutcome};
use crate::tollgate::workflow::state::{StateDelta, StateSnapshot};

/// Calls the model with the conversation so far and appends its reply
#[derive(Debug, Clone, Default)]
pub struct ChatNode {
    instructions: Option<String>,
    tools: Vec<String>,
    keep_last: Option<usize>,
    generation: Option<GenerationConfig>,
    output_field: Option<String>,
}

impl ChatNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Tools offered to the model, by registry name
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    /// Only send the last `n` unsummarized messages
    pub fn keep_last(mut self, n: usize) -> Self {
        self.keep_last = Some(n);
        self
    }

    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation = Some(config);
        self
    }

    /// Also write the reply text to `field`, for routing on the answer
    pub fn with_output_field(mut self, field: impl Into<String>) -> Self {
        self.output_field = Some(field.into());
        self
    }

    pub fn tool_names(&self) -> &[String] {
        &self.tools
    }

    fn system_prompt(&self, state: &StateSnapshot) -> Option<String> {
        let summary = state
            .get(SUMMARY)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| format!("Summary of the earlier conversation: {}", s));
        match (&self.instructions, summary) {
            (Some(i), Some(s)) => Some(format!("{}\n\n{}", i, s)),
            (Some(i), None) => Some(i.clone()),
            (None, s) => s,
        }
    }
}

/// Messages still in play: everything after the summarized prefix, optionally
/// cut to the last `keep_last`, never starting on an orphaned tool result
pub(super) fn conversation_window(
    messages: Vec<Content>,
    summarized_through: usize,
    keep_last: Option<usize>,
) -> Vec<Content> {
    let mut start = summarized_through.min(messages.len());
    if let Some(n) = keep_last {
        start = start.max(messages.len().saturating_sub(n));
    }
    let mut window: Vec<Content> = messages.into_iter().skip(start).collect();
    let orphans = window.iter().take_while(|m| m.role == "tool").count();
    window.drain(..orphans);
    window
}

#[async_trait]
impl Node for ChatNode {
    async fn run(&self, state: &StateSnapshot, ctx: &NodeContext) -> Result<NodeOutcome> {
        let model = ctx.model()?;
        let tools = ctx.tools().resolve(&self.tools).await?;

        let through = state
            .get(SUMMARIZED_THROUGH)
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;
        let mut prompt = Vec::new();
        if let Some(system) = self.system_prompt(state) {
            prompt.push(Content::system(system));
        }
        prompt.extend(conversation_window(
            state.messages()?,
            through,
            self.keep_last,
        ));

        log::info!(
            "Node {} sending {} messages with {} tools",
            ctx.node,
            prompt.len(),
            tools.len()
        );
        let response = model
            .generate_content(
                &prompt,
                self.generation.as_ref(),
                if tools.is_empty() {
                    None
                } else {
                    Some(tools.as_slice())
                },
            )
            .await
            .map_err(|e| TollgateError::Model(ModelError::from(e)))?;

        log::info!(
            "Node {} received response with {} parts",
            ctx.node,
            response.parts.len()
        );
        let mut delta = StateDelta::new().message(&response)?;
        if let Some(field) = &self.output_field {
            delta = delta.set(field.clone(), Value::String(response.text()));
        }
        Ok(NodeOutcome::Update(delta))
    }
}
