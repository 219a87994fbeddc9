// SPDX-License-Identifier: MIT

//! Workflow builder - orchestrates workflow construction
//!
//! This module provides the high-level builder that loads workflow
//! definitions and compiles them into executable graphs.

use crate::adk::error::Result;
use crate::tollgate::config::RunnerConfig;
use crate::tollgate::workflow::graph::{
    ConditionRouter, ToolsCondition, Workflow, WorkflowGraph, END,
};
use crate::tollgate::workflow::loader::WorkflowLoader;
use crate::tollgate::workflow::node_factory::NodeFactory;
use crate::tollgate::workflow::registry::ToolRegistry;
use crate::tollgate::workflow::types::{BuiltinRoute, EdgeDefinition, WorkflowDefinition};

use std::path::Path;

/// High-level builder for constructing workflows from YAML definitions
pub struct WorkflowBuilder {
    loader: WorkflowLoader,
    registry: ToolRegistry,
}

impl WorkflowBuilder {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            loader: WorkflowLoader::new(),
            registry,
        }
    }

    /// Build a workflow from a YAML file path.
    ///
    /// Returns the compiled workflow with its runtime settings, after
    /// environment overrides.
    pub async fn build_file<P: AsRef<Path>>(&self, path: P) -> Result<(Workflow, RunnerConfig)> {
        let def = self.loader.load_workflow(path)?;
        let workflow = self.build(&def).await?;
        let config = def.runtime.clone().with_env_overrides()?;
        Ok((workflow, config))
    }

    /// Compile a parsed definition
    pub async fn build(&self, def: &WorkflowDefinition) -> Result<Workflow> {
        let factory = NodeFactory::new(&self.registry);
        let mut graph = WorkflowGraph::new(def.name.clone())
            .with_schema(def.state.clone())
            .set_start(def.start.clone());

        for node_def in &def.nodes {
            let node = factory.build(node_def).await?;
            graph = graph.add_shared_node(node_def.id.clone(), node);
        }
        for terminal in &def.terminal {
            graph = graph.set_terminal(terminal.clone());
        }
        for edge_def in &def.edges {
            graph = add_edge(graph, edge_def)?;
        }

        log::info!(
            "Built workflow '{}' with {} nodes and {} edges",
            def.name,
            def.nodes.len(),
            def.edges.len()
        );
        graph.compile()
    }
}

fn add_edge(graph: WorkflowGraph, def: &EdgeDefinition) -> Result<WorkflowGraph> {
    Ok(match def {
        EdgeDefinition::Direct { from, to } => graph.add_edge(from.clone(), to.clone()),
        EdgeDefinition::Builtin {
            from,
            route: BuiltinRoute::ToolsCondition,
            tools,
        } => {
            let tools = tools.clone().unwrap_or_else(|| "tools".to_string());
            graph.add_conditional_edges(
                from.clone(),
                ToolsCondition::new(tools.clone()),
                [tools, END.to_string()],
            )
        }
        EdgeDefinition::Routed {
            from,
            routes,
            default,
        } => {
            let router = ConditionRouter::new(
                routes
                    .iter()
                    .map(|r| (r.when.clone(), r.to.clone()))
                    .collect(),
                default.clone(),
            )?;
            let targets = router.targets();
            graph.add_conditional_edges(from.clone(), router, targets)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::TollgateError;
    use crate::tollgate::workflow::state::StateSnapshot;

    const REVIEW: &str = r#"
name: birthday
start: review
nodes:
  - id: review
    kind: review
    question: "Is this correct?"
    fields: [name, birthday]
  - id: chat
    kind: chat
edges:
  - from: review
    routes:
      - when: "response == 'redo'"
        to: review
    default: chat
  - from: chat
    route: tools_condition
    tools: review
"#;

    #[tokio::test]
    async fn test_build_routes_and_start() {
        let def = WorkflowLoader::parse_yaml(REVIEW).unwrap();
        let workflow = WorkflowBuilder::new(ToolRegistry::new())
            .build(&def)
            .await
            .unwrap();
        assert_eq!(workflow.name(), "birthday");
        assert_eq!(workflow.start(), "review");
        assert_eq!(
            workflow.next("review", &StateSnapshot::empty()).unwrap(),
            Some("chat".to_string())
        );
        // no messages, so the tools condition ends the thread
        assert_eq!(workflow.next("chat", &StateSnapshot::empty()).unwrap(), None);
    }

    #[tokio::test]
    async fn test_dangling_edge_is_malformed() {
        let yaml = REVIEW.replace("default: chat", "default: nowhere");
        let def = WorkflowLoader::parse_yaml(&yaml).unwrap();
        let err = WorkflowBuilder::new(ToolRegistry::new())
            .build(&def)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TollgateError::MalformedWorkflow(ref m) if m.contains("nowhere")));
    }

    #[tokio::test]
    async fn test_bad_condition_is_malformed() {
        let yaml = REVIEW.replace("response == 'redo'", "response ==");
        let def = WorkflowLoader::parse_yaml(&yaml).unwrap();
        let err = WorkflowBuilder::new(ToolRegistry::new())
            .build(&def)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TollgateError::MalformedWorkflow(_)));
    }
}
