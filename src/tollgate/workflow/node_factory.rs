//! Node factory - constructs nodes from definitions
//!
//! Tool names are checked against the registry here, so a definition that
//! mentions an unregistered tool fails when the workflow is built rather
//! than halfway through a thread.

use crate::adk::error::Result;
use crate::tollgate::workflow::graph::Node;
use crate::tollgate::workflow::nodes::{ChatNode, ReviewNode, SummarizeNode, ToolNode};
use crate::tollgate::workflow::registry::ToolRegistry;
use crate::tollgate::workflow::types::{NodeDefinition, NodeSpec};

use std::sync::Arc;

/// Factory for creating Node instances from definitions
pub struct NodeFactory<'a> {
    registry: &'a ToolRegistry,
}

impl<'a> NodeFactory<'a> {
    pub fn new(registry: &'a ToolRegistry) -> Self {
        Self { registry }
    }

    /// Build a node from a NodeDefinition
    pub async fn build(&self, def: &NodeDefinition) -> Result<Arc<dyn Node>> {
        log::info!("Building node '{}' of kind '{}'", def.id, def.spec.kind());

        let node: Arc<dyn Node> = match &def.spec {
            NodeSpec::Chat {
                instructions,
                tools,
                keep_last,
                generation,
                output_field,
            } => {
                self.registry.resolve(tools).await?;
                let mut node = ChatNode::new().with_tools(tools.clone());
                if !instructions.is_empty() {
                    node = node.with_instructions(instructions.clone());
                }
                if let Some(n) = keep_last {
                    node = node.keep_last(*n);
                }
                if let Some(config) = generation {
                    node = node.with_generation_config(config.clone());
                }
                if let Some(field) = output_field {
                    node = node.with_output_field(field.clone());
                }
                Arc::new(node)
            }
            NodeSpec::Tools { approval } => {
                let mut node = ToolNode::new();
                for (tool, policy) in approval {
                    self.registry.require(tool).await?;
                    node = node.with_policy(tool.clone(), policy.clone());
                }
                Arc::new(node)
            }
            NodeSpec::Review {
                question,
                fields,
                response_field,
            } => {
                let mut node = ReviewNode::new(question.clone(), fields.clone());
                if let Some(field) = response_field {
                    node = node.with_response_field(field.clone());
                }
                Arc::new(node)
            }
            NodeSpec::Summarize {
                max_messages,
                keep_last,
                instructions,
            } => {
                let mut node = SummarizeNode::new(*max_messages, *keep_last);
                if let Some(instructions) = instructions {
                    node = node.with_instructions(instructions.clone());
                }
                Arc::new(node)
            }
        };
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::TollgateError;
    use crate::adk::tool::FnTool;
    use crate::tollgate::workflow::graph::NodeKind;
    use futures::FutureExt;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::error::Error;

    async fn registry() -> ToolRegistry {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(FnTool::new(
                "add",
                "Adds a and b.",
                json!({"type": "object"}),
                |_| async move { Ok::<Value, Box<dyn Error + Send + Sync>>(json!(0)) }.boxed(),
            )))
            .await;
        registry
    }

    fn def(spec: NodeSpec) -> NodeDefinition {
        NodeDefinition {
            id: "n".to_string(),
            spec,
        }
    }

    #[tokio::test]
    async fn test_builds_each_kind() {
        let registry = registry().await;
        let factory = NodeFactory::new(&registry);

        let chat = factory
            .build(&def(NodeSpec::Chat {
                instructions: "Be brief.".into(),
                tools: vec!["add".into()],
                keep_last: Some(4),
                generation: None,
                output_field: Some("reply".into()),
            }))
            .await
            .unwrap();
        assert_eq!(chat.kind(), NodeKind::Pure);

        let tools = factory
            .build(&def(NodeSpec::Tools {
                approval: HashMap::new(),
            }))
            .await
            .unwrap();
        assert_eq!(tools.kind(), NodeKind::Interruptible);

        let review = factory
            .build(&def(NodeSpec::Review {
                question: "Correct?".into(),
                fields: vec!["name".into()],
                response_field: None,
            }))
            .await
            .unwrap();
        assert_eq!(review.kind(), NodeKind::Interruptible);
    }

    #[tokio::test]
    async fn test_unknown_tools_rejected_eagerly() {
        let registry = registry().await;
        let factory = NodeFactory::new(&registry);

        let err = factory
            .build(&def(NodeSpec::Chat {
                instructions: String::new(),
                tools: vec!["add".into(), "rm_rf".into()],
                keep_last: None,
                generation: None,
                output_field: None,
            }))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TollgateError::UnknownTool { ref name } if name == "rm_rf"));

        let mut approval = HashMap::new();
        approval.insert(
            "divide".to_string(),
            crate::tollgate::workflow::nodes::ApprovalPolicy::required(),
        );
        let err = factory
            .build(&def(NodeSpec::Tools { approval }))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TollgateError::UnknownTool { .. }));
    }
}
